use crate::{Checkpoint, Hash256, SignedRoot, Slot};
use serde::{Deserialize, Serialize};
use tree_hash_derive::TreeHash;

/// The data upon which an attestation is based.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Hash, TreeHash, Default)]
pub struct AttestationData {
    pub slot: Slot,
    #[serde(with = "serde_utils::quoted_u64")]
    pub index: u64,

    // LMD GHOST vote
    pub beacon_block_root: Hash256,

    // FFG Vote
    pub source: Checkpoint,
    pub target: Checkpoint,
}

impl SignedRoot for AttestationData {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Epoch;
    use tree_hash::TreeHash;

    #[test]
    fn default_tree_hash_root() {
        assert_eq!(
            format!("{:?}", AttestationData::default().tree_hash_root()),
            "0x01f278ee83d4e438cf8f563ce108974d64c029a20280ab8eca07741df7ee5290"
        );
    }

    #[test]
    fn json_field_names() {
        let data = AttestationData {
            slot: Slot::new(1),
            index: 2,
            beacon_block_root: Hash256::zero(),
            source: Checkpoint {
                epoch: Epoch::new(0),
                root: Hash256::zero(),
            },
            target: Checkpoint {
                epoch: Epoch::new(1),
                root: Hash256::zero(),
            },
        };
        let json = serde_json::to_value(&data).unwrap();
        assert_eq!(json["slot"], "1");
        assert_eq!(json["index"], "2");
        assert_eq!(json["target"]["epoch"], "1");
    }
}
