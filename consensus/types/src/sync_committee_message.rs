use crate::{Hash256, Signature, Slot};
use serde::{Deserialize, Serialize};
use tree_hash_derive::TreeHash;

/// The data upon which a `SyncCommitteeContribution` is based.
///
/// The signature is over the `beacon_block_root` alone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TreeHash)]
pub struct SyncCommitteeMessage {
    pub slot: Slot,
    pub beacon_block_root: Hash256,
    #[serde(with = "serde_utils::quoted_u64")]
    pub validator_index: u64,
    // Signature by the validator over `beacon_block_root`.
    pub signature: Signature,
}
