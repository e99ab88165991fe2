use crate::{SignedRoot, Signature, SyncCommitteeContribution};
use serde::{Deserialize, Serialize};
use tree_hash_derive::TreeHash;

/// A Validators aggregate sync committee contribution and selection proof.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TreeHash)]
pub struct ContributionAndProof {
    /// The index of the validator that created the sync contribution.
    #[serde(with = "serde_utils::quoted_u64")]
    pub aggregator_index: u64,
    /// The aggregate contribution.
    pub contribution: SyncCommitteeContribution,
    /// A proof provided by the validator that permits them to publish on the
    /// `sync_committee_contribution_and_proof` gossipsub topic.
    pub selection_proof: Signature,
}

impl SignedRoot for ContributionAndProof {}
