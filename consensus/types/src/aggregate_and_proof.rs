use crate::{Attestation, SignedRoot, Signature};
use serde::{Deserialize, Serialize};
use tree_hash_derive::TreeHash;

/// A Validators aggregate attestation and selection proof.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TreeHash)]
pub struct AggregateAndProof {
    /// The index of the validator that created the attestation.
    #[serde(with = "serde_utils::quoted_u64")]
    pub aggregator_index: u64,
    /// The aggregate attestation.
    pub aggregate: Attestation,
    /// A proof provided by the validator that permits them to publish on the
    /// `beacon_aggregate_and_proof` gossipsub topic.
    pub selection_proof: Signature,
}

impl SignedRoot for AggregateAndProof {}
