use crate::{AggregateSignature, BitVector, Hash256, Slot, SyncSubcommitteeSize};
use serde::{Deserialize, Serialize};
use tree_hash_derive::TreeHash;

#[derive(Debug, PartialEq)]
pub enum Error {
    SszTypesError(ssz_types::Error),
}

/// An aggregation of `SyncCommitteeMessage`s, used in creating a `SignedContributionAndProof`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TreeHash)]
pub struct SyncCommitteeContribution {
    pub slot: Slot,
    pub beacon_block_root: Hash256,
    #[serde(with = "serde_utils::quoted_u64")]
    pub subcommittee_index: u64,
    pub aggregation_bits: BitVector<SyncSubcommitteeSize>,
    pub signature: AggregateSignature,
}

impl SyncCommitteeContribution {
    /// An empty contribution for the given slot, block and subcommittee.
    pub fn empty(slot: Slot, beacon_block_root: Hash256, subcommittee_index: u64) -> Self {
        Self {
            slot,
            beacon_block_root,
            subcommittee_index,
            aggregation_bits: BitVector::new(),
            signature: AggregateSignature::infinity(),
        }
    }
}
