use crate::{Hash256, SignedRoot};

use serde::{Deserialize, Serialize};
use tree_hash_derive::TreeHash;

/// The container hashed into the upper 28 bytes of a signing domain.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, TreeHash)]
pub struct ForkData {
    #[serde(with = "serde_utils::bytes_4_hex")]
    pub current_version: [u8; 4],
    pub genesis_validators_root: Hash256,
}

impl SignedRoot for ForkData {}
