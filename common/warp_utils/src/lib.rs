//! This crate contains functions that are common across multiple `warp` HTTP servers in the
//! validator client and the remote signer.

pub mod reject;
pub mod task;
