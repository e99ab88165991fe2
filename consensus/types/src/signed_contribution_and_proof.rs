use crate::{ContributionAndProof, Signature};
use serde::{Deserialize, Serialize};
use tree_hash_derive::TreeHash;

/// A Validators signed contribution proof to publish on the `sync_committee_contribution_and_proof`
/// gossipsub topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TreeHash)]
pub struct SignedContributionAndProof {
    /// The `ContributionAndProof` that was signed.
    pub message: ContributionAndProof,
    /// The validator's signature of `message`.
    pub signature: Signature,
}
