use crate::{AggregateAndProof, Signature};
use serde::{Deserialize, Serialize};
use tree_hash_derive::TreeHash;

/// A Validators signed aggregate proof to publish on the `beacon_aggregate_and_proof`
/// gossipsub topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TreeHash)]
pub struct SignedAggregateAndProof {
    /// The `AggregateAndProof` that was signed.
    pub message: AggregateAndProof,
    /// The aggregate attestation.
    pub signature: Signature,
}
