use crate::application_domain::ApplicationDomain;
use crate::{Epoch, Fork, ForkData, ForkName, Hash256};
use serde::{Deserialize, Serialize};
use tree_hash::TreeHash;

/// Each of the BLS signature domains.
///
/// The set is closed: every domain a validator may sign across is named here.
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum Domain {
    BeaconProposer,
    BeaconAttester,
    Randao,
    VoluntaryExit,
    SelectionProof,
    AggregateAndProof,
    SyncCommittee,
    ContributionAndProof,
    SyncCommitteeSelectionProof,
    ApplicationMask(ApplicationDomain),
}

/// The subset of the consensus chain specification required to compute signing domains.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct ChainSpec {
    /*
     * Time parameters
     */
    #[serde(with = "serde_utils::quoted_u64")]
    pub slots_per_epoch: u64,

    /*
     * Fork choice
     */
    #[serde(with = "serde_utils::bytes_4_hex")]
    pub genesis_fork_version: [u8; 4],
    #[serde(with = "serde_utils::bytes_4_hex")]
    pub altair_fork_version: [u8; 4],
    pub altair_fork_epoch: Option<Epoch>,
    #[serde(with = "serde_utils::bytes_4_hex")]
    pub bellatrix_fork_version: [u8; 4],
    pub bellatrix_fork_epoch: Option<Epoch>,
    #[serde(with = "serde_utils::bytes_4_hex")]
    pub capella_fork_version: [u8; 4],
    pub capella_fork_epoch: Option<Epoch>,
    #[serde(with = "serde_utils::bytes_4_hex")]
    pub deneb_fork_version: [u8; 4],
    pub deneb_fork_epoch: Option<Epoch>,

    /*
     * Signature domains
     */
    #[serde(skip, default = "default_domain_beacon_proposer")]
    pub(crate) domain_beacon_proposer: u32,
    #[serde(skip, default = "default_domain_beacon_attester")]
    pub(crate) domain_beacon_attester: u32,
    #[serde(skip, default = "default_domain_randao")]
    pub(crate) domain_randao: u32,
    #[serde(skip, default = "default_domain_voluntary_exit")]
    pub(crate) domain_voluntary_exit: u32,
    #[serde(skip, default = "default_domain_selection_proof")]
    pub(crate) domain_selection_proof: u32,
    #[serde(skip, default = "default_domain_aggregate_and_proof")]
    pub(crate) domain_aggregate_and_proof: u32,
    #[serde(skip, default = "default_domain_sync_committee")]
    pub(crate) domain_sync_committee: u32,
    #[serde(skip, default = "default_domain_sync_committee_selection_proof")]
    pub(crate) domain_sync_committee_selection_proof: u32,
    #[serde(skip, default = "default_domain_contribution_and_proof")]
    pub(crate) domain_contribution_and_proof: u32,
}

impl ChainSpec {
    /// Returns the name of the fork which is active at `epoch`.
    pub fn fork_name_at_epoch(&self, epoch: Epoch) -> ForkName {
        let active = |fork_epoch: Option<Epoch>| fork_epoch.map_or(false, |e| epoch >= e);

        if active(self.deneb_fork_epoch) {
            ForkName::Deneb
        } else if active(self.capella_fork_epoch) {
            ForkName::Capella
        } else if active(self.bellatrix_fork_epoch) {
            ForkName::Bellatrix
        } else if active(self.altair_fork_epoch) {
            ForkName::Altair
        } else {
            ForkName::Base
        }
    }

    /// Returns the fork version for a named fork.
    pub fn fork_version_for_name(&self, fork_name: ForkName) -> [u8; 4] {
        match fork_name {
            ForkName::Base => self.genesis_fork_version,
            ForkName::Altair => self.altair_fork_version,
            ForkName::Bellatrix => self.bellatrix_fork_version,
            ForkName::Capella => self.capella_fork_version,
            ForkName::Deneb => self.deneb_fork_version,
        }
    }

    /// For a given fork name, return the epoch at which it activates.
    pub fn fork_epoch(&self, fork_name: ForkName) -> Option<Epoch> {
        match fork_name {
            ForkName::Base => Some(Epoch::new(0)),
            ForkName::Altair => self.altair_fork_epoch,
            ForkName::Bellatrix => self.bellatrix_fork_epoch,
            ForkName::Capella => self.capella_fork_epoch,
            ForkName::Deneb => self.deneb_fork_epoch,
        }
    }

    /// Returns a full `Fork` struct for a given epoch.
    pub fn fork_at_epoch(&self, epoch: Epoch) -> Fork {
        let current_fork_name = self.fork_name_at_epoch(epoch);
        let previous_fork_name = current_fork_name.previous_fork().unwrap_or(ForkName::Base);
        let epoch = self
            .fork_epoch(current_fork_name)
            .unwrap_or_else(|| Epoch::new(0));

        Fork {
            previous_version: self.fork_version_for_name(previous_fork_name),
            current_version: self.fork_version_for_name(current_fork_name),
            epoch,
        }
    }

    /// Get the domain number, unmodified by the fork.
    pub fn get_domain_constant(&self, domain: Domain) -> u32 {
        match domain {
            Domain::BeaconProposer => self.domain_beacon_proposer,
            Domain::BeaconAttester => self.domain_beacon_attester,
            Domain::Randao => self.domain_randao,
            Domain::VoluntaryExit => self.domain_voluntary_exit,
            Domain::SelectionProof => self.domain_selection_proof,
            Domain::AggregateAndProof => self.domain_aggregate_and_proof,
            Domain::SyncCommittee => self.domain_sync_committee,
            Domain::ContributionAndProof => self.domain_contribution_and_proof,
            Domain::SyncCommitteeSelectionProof => self.domain_sync_committee_selection_proof,
            Domain::ApplicationMask(application_domain) => application_domain.get_domain_constant(),
        }
    }

    /// Get the domain that represents the fork meta and signature domain.
    pub fn get_domain(
        &self,
        epoch: Epoch,
        domain: Domain,
        fork: &Fork,
        genesis_validators_root: Hash256,
    ) -> Hash256 {
        let fork_version = fork.get_fork_version(epoch);
        self.compute_domain(domain, fork_version, genesis_validators_root)
    }

    /// Get the domain for a builder API message (e.g. a validator registration).
    ///
    /// Builder messages are signed across the genesis fork version and a zero genesis validators
    /// root, so that they are valid on every fork.
    pub fn get_builder_domain(&self) -> Hash256 {
        self.compute_domain(
            Domain::ApplicationMask(ApplicationDomain::Builder),
            self.genesis_fork_version,
            Hash256::zero(),
        )
    }

    /// Return the 32-byte fork data root for the `current_version` and `genesis_validators_root`.
    pub fn compute_fork_data_root(
        current_version: [u8; 4],
        genesis_validators_root: Hash256,
    ) -> Hash256 {
        ForkData {
            current_version,
            genesis_validators_root,
        }
        .tree_hash_root()
    }

    /// Compute a domain by applying the given `fork_version`.
    pub fn compute_domain(
        &self,
        domain: Domain,
        fork_version: [u8; 4],
        genesis_validators_root: Hash256,
    ) -> Hash256 {
        let domain_constant = self.get_domain_constant(domain);

        let mut domain = [0; 32];
        domain[0..4].copy_from_slice(&domain_constant.to_le_bytes());
        domain[4..].copy_from_slice(
            &Self::compute_fork_data_root(fork_version, genesis_validators_root).as_bytes()[..28],
        );

        Hash256::from(domain)
    }

    /// Returns a `ChainSpec` compatible with the Ethereum Foundation mainnet.
    pub fn mainnet() -> Self {
        Self {
            slots_per_epoch: 32,
            genesis_fork_version: [0; 4],
            altair_fork_version: [0x01, 0x00, 0x00, 0x00],
            altair_fork_epoch: Some(Epoch::new(74240)),
            bellatrix_fork_version: [0x02, 0x00, 0x00, 0x00],
            bellatrix_fork_epoch: Some(Epoch::new(144896)),
            capella_fork_version: [0x03, 0x00, 0x00, 0x00],
            capella_fork_epoch: Some(Epoch::new(194048)),
            deneb_fork_version: [0x04, 0x00, 0x00, 0x00],
            deneb_fork_epoch: Some(Epoch::new(269568)),
            domain_beacon_proposer: default_domain_beacon_proposer(),
            domain_beacon_attester: default_domain_beacon_attester(),
            domain_randao: default_domain_randao(),
            domain_voluntary_exit: default_domain_voluntary_exit(),
            domain_selection_proof: default_domain_selection_proof(),
            domain_aggregate_and_proof: default_domain_aggregate_and_proof(),
            domain_sync_committee: default_domain_sync_committee(),
            domain_sync_committee_selection_proof: default_domain_sync_committee_selection_proof(),
            domain_contribution_and_proof: default_domain_contribution_and_proof(),
        }
    }

    /// Ethereum Foundation minimal spec, as defined in the consensus-specs repo.
    ///
    /// No forks are scheduled; tests schedule the forks they need.
    pub fn minimal() -> Self {
        Self {
            slots_per_epoch: 8,
            genesis_fork_version: [0x00, 0x00, 0x00, 0x01],
            altair_fork_version: [0x01, 0x00, 0x00, 0x01],
            altair_fork_epoch: None,
            bellatrix_fork_version: [0x02, 0x00, 0x00, 0x01],
            bellatrix_fork_epoch: None,
            capella_fork_version: [0x03, 0x00, 0x00, 0x01],
            capella_fork_epoch: None,
            deneb_fork_version: [0x04, 0x00, 0x00, 0x01],
            deneb_fork_epoch: None,
            ..ChainSpec::mainnet()
        }
    }
}

impl Default for ChainSpec {
    fn default() -> Self {
        Self::mainnet()
    }
}

fn default_domain_beacon_proposer() -> u32 {
    0
}

fn default_domain_beacon_attester() -> u32 {
    1
}

fn default_domain_randao() -> u32 {
    2
}

fn default_domain_voluntary_exit() -> u32 {
    4
}

fn default_domain_selection_proof() -> u32 {
    5
}

fn default_domain_aggregate_and_proof() -> u32 {
    6
}

fn default_domain_sync_committee() -> u32 {
    7
}

fn default_domain_sync_committee_selection_proof() -> u32 {
    8
}

fn default_domain_contribution_and_proof() -> u32 {
    9
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application_domain::APPLICATION_DOMAIN_BUILDER;
    use std::str::FromStr;

    const MAINNET_GVR: &str = "0x4b363db94e286120d76eb905340fdd4e54bfe9f06bf33ff6cf5ad27f511bfe95";

    fn test_domain(domain_type: Domain, raw_domain: u32, spec: &ChainSpec) {
        let genesis_validators_root = Hash256::from_low_u64_le(77);
        let fork_epoch = Epoch::new(1024);
        let fork = Fork {
            previous_version: spec.genesis_fork_version,
            current_version: spec.altair_fork_version,
            epoch: fork_epoch,
        };

        for (epoch, version) in vec![
            (fork_epoch - 1, fork.previous_version),
            (fork_epoch, fork.current_version),
            (fork_epoch + 1, fork.current_version),
        ] {
            let domain = spec.get_domain(epoch, domain_type, &fork, genesis_validators_root);

            let mut expected = raw_domain.to_le_bytes().to_vec();
            expected.append(
                &mut ChainSpec::compute_fork_data_root(version, genesis_validators_root).as_bytes()
                    [..28]
                    .to_vec(),
            );

            assert_eq!(domain.as_bytes(), &expected[..]);
        }
    }

    #[test]
    fn get_domain() {
        let spec = ChainSpec::mainnet();

        test_domain(Domain::BeaconProposer, 0, &spec);
        test_domain(Domain::BeaconAttester, 1, &spec);
        test_domain(Domain::Randao, 2, &spec);
        test_domain(Domain::VoluntaryExit, 4, &spec);
        test_domain(Domain::SelectionProof, 5, &spec);
        test_domain(Domain::AggregateAndProof, 6, &spec);
        test_domain(Domain::SyncCommittee, 7, &spec);
        test_domain(Domain::SyncCommitteeSelectionProof, 8, &spec);
        test_domain(Domain::ContributionAndProof, 9, &spec);
        test_domain(
            Domain::ApplicationMask(ApplicationDomain::Builder),
            APPLICATION_DOMAIN_BUILDER,
            &spec,
        );
    }

    #[test]
    fn mainnet_builder_domain() {
        let domain = ChainSpec::mainnet().get_builder_domain();
        assert_eq!(
            format!("{:?}", domain),
            "0x00000001f5a5fd42d16a20302798ef6ed309979b43003d2320d9f0e8ea9831a9"
        );
    }

    #[test]
    fn mainnet_attester_domain() {
        let spec = ChainSpec::mainnet();
        let gvr = Hash256::from_str(MAINNET_GVR).unwrap();
        let epoch = Epoch::new(100_000);
        let domain = spec.get_domain(
            epoch,
            Domain::BeaconAttester,
            &spec.fork_at_epoch(epoch),
            gvr,
        );
        assert_eq!(
            format!("{:?}", domain),
            "0x01000000afcaaba0efab1ca832a15152469bb09bb84641c405171dfa2d3fb45f"
        );
    }

    #[test]
    fn fork_schedule() {
        let spec = ChainSpec::mainnet();

        assert_eq!(spec.fork_name_at_epoch(Epoch::new(0)), ForkName::Base);
        assert_eq!(spec.fork_name_at_epoch(Epoch::new(74239)), ForkName::Base);
        assert_eq!(spec.fork_name_at_epoch(Epoch::new(74240)), ForkName::Altair);
        assert_eq!(
            spec.fork_name_at_epoch(Epoch::new(194048)),
            ForkName::Capella
        );
        assert_eq!(spec.fork_name_at_epoch(Epoch::max_value()), ForkName::Deneb);

        let fork = spec.fork_at_epoch(Epoch::new(200_000));
        assert_eq!(fork.previous_version, spec.bellatrix_fork_version);
        assert_eq!(fork.current_version, spec.capella_fork_version);
        assert_eq!(fork.epoch, Epoch::new(194048));

        let genesis = spec.fork_at_epoch(Epoch::new(0));
        assert_eq!(genesis.previous_version, spec.genesis_fork_version);
        assert_eq!(genesis.current_version, spec.genesis_fork_version);
        assert_eq!(genesis.epoch, Epoch::new(0));
    }

    #[test]
    fn minimal_has_no_forks_scheduled() {
        let spec = ChainSpec::minimal();
        assert_eq!(spec.fork_name_at_epoch(Epoch::max_value()), ForkName::Base);
        assert_eq!(spec.slots_per_epoch, 8);
    }
}
