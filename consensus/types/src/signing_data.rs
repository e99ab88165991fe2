use crate::{Epoch, Hash256, Slot};
use serde::{Deserialize, Serialize};
use tree_hash::TreeHash;
use tree_hash_derive::TreeHash;

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize, TreeHash)]
pub struct SigningData {
    pub object_root: Hash256,
    pub domain: Hash256,
}

/// Implemented by every object a validator signs.
///
/// The signing root is the tree hash root of `SigningData`, which binds the object to a domain.
pub trait SignedRoot: TreeHash {
    fn signing_root(&self, domain: Hash256) -> Hash256 {
        SigningData {
            object_root: self.tree_hash_root(),
            domain,
        }
        .tree_hash_root()
    }
}

impl SignedRoot for Slot {}
impl SignedRoot for Epoch {}
impl SignedRoot for Hash256 {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BeaconBlockHeader, ChainSpec, Domain, Fork};

    fn genesis_domain(domain: Domain) -> Hash256 {
        let spec = ChainSpec::mainnet();
        spec.get_domain(
            Epoch::new(0),
            domain,
            &Fork::default(),
            Hash256::zero(),
        )
    }

    #[test]
    fn block_header_signing_root() {
        let header = BeaconBlockHeader {
            slot: Slot::new(1),
            proposer_index: 2,
            parent_root: Hash256::repeat_byte(0x11),
            state_root: Hash256::repeat_byte(0x22),
            body_root: Hash256::repeat_byte(0x33),
        };
        assert_eq!(
            format!("{:?}", header.tree_hash_root()),
            "0xca97916da2119fd20a6e873e4c8d77d4f92297cf3b82d017d277a9a46d10de61"
        );
        assert_eq!(
            format!("{:?}", header.signing_root(genesis_domain(Domain::BeaconProposer))),
            "0x4860e93de802ad6aace0551c2a96bce0256e979d7a23adaed05588b8e9688bcf"
        );
    }

    #[test]
    fn epoch_signing_root() {
        assert_eq!(
            format!("{:?}", Epoch::new(5).signing_root(genesis_domain(Domain::Randao))),
            "0x99489744e3d41ee149ab44dbb9af6e03ef03492fb8e57cf1398c980a9e860696"
        );
    }

    #[test]
    fn domain_separates_roots() {
        let epoch = Epoch::new(5);
        assert_ne!(
            epoch.signing_root(genesis_domain(Domain::Randao)),
            epoch.signing_root(genesis_domain(Domain::SelectionProof))
        );
    }
}
