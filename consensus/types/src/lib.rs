//! Ethereum consensus types required to derive signing roots for validator duties.

#[macro_use]
mod slot_epoch_macros;

pub mod aggregate_and_proof;
pub mod application_domain;
pub mod attestation;
pub mod attestation_data;
pub mod beacon_block_header;
pub mod chain_spec;
pub mod checkpoint;
pub mod contribution_and_proof;
pub mod fork;
pub mod fork_data;
pub mod fork_name;
pub mod signed_aggregate_and_proof;
pub mod signed_beacon_block_header;
pub mod signed_contribution_and_proof;
pub mod signed_voluntary_exit;
pub mod signing_data;
pub mod slot_epoch;
pub mod sync_aggregator_selection_data;
pub mod sync_committee_contribution;
pub mod sync_committee_message;
pub mod test_utils;
pub mod validator_registration_data;
pub mod voluntary_exit;

pub use crate::aggregate_and_proof::AggregateAndProof;
pub use crate::application_domain::{ApplicationDomain, APPLICATION_DOMAIN_BUILDER};
pub use crate::attestation::{Attestation, Error as AttestationError};
pub use crate::attestation_data::AttestationData;
pub use crate::beacon_block_header::BeaconBlockHeader;
pub use crate::chain_spec::{ChainSpec, Domain};
pub use crate::checkpoint::Checkpoint;
pub use crate::contribution_and_proof::ContributionAndProof;
pub use crate::fork::Fork;
pub use crate::fork_data::ForkData;
pub use crate::fork_name::ForkName;
pub use crate::signed_aggregate_and_proof::SignedAggregateAndProof;
pub use crate::signed_beacon_block_header::SignedBeaconBlockHeader;
pub use crate::signed_contribution_and_proof::SignedContributionAndProof;
pub use crate::signed_voluntary_exit::SignedVoluntaryExit;
pub use crate::signing_data::{SignedRoot, SigningData};
pub use crate::slot_epoch::{Epoch, Slot};
pub use crate::sync_aggregator_selection_data::SyncAggregatorSelectionData;
pub use crate::sync_committee_contribution::{
    Error as SyncCommitteeContributionError, SyncCommitteeContribution,
};
pub use crate::sync_committee_message::SyncCommitteeMessage;
pub use crate::validator_registration_data::{
    SignedValidatorRegistrationData, ValidatorRegistrationData,
};
pub use crate::voluntary_exit::VoluntaryExit;

pub use bls::{
    AggregateSignature, Keypair, PublicKey, PublicKeyBytes, SecretKey, Signature,
};
pub use ssz_types::{typenum, BitList, BitVector};

pub type Hash256 = ethereum_types::H256;
pub type Address = ethereum_types::H160;

/// Maximum number of validators in a single attestation committee.
pub type MaxValidatorsPerCommittee = typenum::U2048;
/// Number of validators in each sync subcommittee (`SYNC_COMMITTEE_SIZE / SYNC_COMMITTEE_SUBNET_COUNT`).
pub type SyncSubcommitteeSize = typenum::U128;
