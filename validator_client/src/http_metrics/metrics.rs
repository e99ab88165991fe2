use crate::ValidatorStore;
use slot_clock::SlotClock;

pub const SUCCESS: &str = "success";
pub const SLASHABLE: &str = "slashable";
pub const SAME_DATA: &str = "same_data";
pub const UNREGISTERED: &str = "unregistered";
pub const DISABLED: &str = "disabled";
pub const REMOTE_SIGNER_ERROR: &str = "remote_signer_error";
pub const LOCAL_KEYSTORE: &str = "local_keystore";
pub const WEB3SIGNER: &str = "web3signer";

pub use ::metrics::*;

lazy_static::lazy_static! {
    pub static ref ENABLED_VALIDATORS_COUNT: Result<IntGauge> = try_create_int_gauge(
        "vc_validators_enabled_count",
        "Number of enabled validators"
    );

    pub static ref SIGNED_BLOCKS_TOTAL: Result<IntCounterVec> = try_create_int_counter_vec(
        "vc_signed_beacon_blocks_total",
        "Total count of attempted block signings",
        &["status"]
    );
    pub static ref SIGNED_ATTESTATIONS_TOTAL: Result<IntCounterVec> = try_create_int_counter_vec(
        "vc_signed_attestations_total",
        "Total count of attempted Attestation signings",
        &["status"]
    );
    pub static ref SIGNED_AGGREGATES_TOTAL: Result<IntCounterVec> = try_create_int_counter_vec(
        "vc_signed_aggregates_total",
        "Total count of attempted SignedAggregateAndProof signings",
        &["status"]
    );
    pub static ref SIGNED_SELECTION_PROOFS_TOTAL: Result<IntCounterVec> = try_create_int_counter_vec(
        "vc_signed_selection_proofs_total",
        "Total count of attempted SelectionProof signings",
        &["status"]
    );
    pub static ref SIGNED_SYNC_COMMITTEE_MESSAGES_TOTAL: Result<IntCounterVec> = try_create_int_counter_vec(
        "vc_signed_sync_committee_messages_total",
        "Total count of attempted SyncCommitteeMessage signings",
        &["status"]
    );
    pub static ref SIGNED_SYNC_COMMITTEE_CONTRIBUTIONS_TOTAL: Result<IntCounterVec> = try_create_int_counter_vec(
        "vc_signed_sync_committee_contributions_total",
        "Total count of attempted ContributionAndProof signings",
        &["status"]
    );
    pub static ref SIGNED_SYNC_SELECTION_PROOFS_TOTAL: Result<IntCounterVec> = try_create_int_counter_vec(
        "vc_signed_sync_selection_proofs_total",
        "Total count of attempted SyncSelectionProof signings",
        &["status"]
    );
    pub static ref SIGNED_VOLUNTARY_EXITS_TOTAL: Result<IntCounterVec> = try_create_int_counter_vec(
        "vc_signed_voluntary_exits_total",
        "Total count of VoluntaryExit signings",
        &["status"]
    );
    pub static ref SIGNED_VALIDATOR_REGISTRATIONS_TOTAL: Result<IntCounterVec> = try_create_int_counter_vec(
        "builder_validator_registrations_total",
        "Total count of ValidatorRegistrationData signings",
        &["status"]
    );
    pub static ref SIGNED_RANDAO_REVEALS_TOTAL: Result<IntCounterVec> = try_create_int_counter_vec(
        "vc_signed_randao_reveals_total",
        "Total count of RANDAO reveal signings",
        &["status"]
    );
    pub static ref SLASHING_PROTECTION_PRUNE_TIMES: Result<Histogram> = try_create_histogram(
        "vc_slashing_protection_prune_times_seconds",
        "Time required to prune the slashing protection DB",
    );
    pub static ref SIGNING_TIMES: Result<HistogramVec> = try_create_histogram_vec(
        "vc_signing_times_seconds",
        "Duration to obtain a signature",
        &["type"]
    );
}

/// Update the gauges owned by the validator client and encode every registered metric.
pub fn gather_prometheus_metrics<T: SlotClock + 'static>(
    validator_store: &ValidatorStore<T>,
) -> std::result::Result<String, String> {
    set_gauge(
        &ENABLED_VALIDATORS_COUNT,
        validator_store.num_voting_validators() as i64,
    );

    slot_clock::scrape_for_metrics(
        validator_store.slot_clock(),
        validator_store.spec().slots_per_epoch,
    );

    encode_text()
}
