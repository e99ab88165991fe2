//! Tests that drive a `ValidatorStore` against the in-process `remote_signer` server.
//!
//! Every duty is signed twice, once with a local key and once through the remote signer, and the
//! results must be byte-identical.
