//! Signing metrics live in the global Prometheus registry, so they are checked in their own test
//! binary where no other test signs concurrently.

use logging::test_logger;
use reqwest::Client;
use slashing_protection::SlashingDatabase;
use slot_clock::{SlotClock, TestingSlotClock};
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;
use types::test_utils::generate_deterministic_keypair;
use types::{BeaconBlockHeader, ChainSpec, Hash256, Slot};
use url::Url;
use validator_client::http_metrics::metrics;
use validator_client::{ValidatorStore, ValidatorStoreError};

fn blocks_signed(status: &str) -> u64 {
    metrics::get_int_counter(&metrics::SIGNED_BLOCKS_TOTAL, &[status])
        .map(|counter| counter.get())
        .unwrap_or(0)
}

fn header(slot: u64) -> BeaconBlockHeader {
    BeaconBlockHeader {
        slot: Slot::new(slot),
        proposer_index: 0,
        parent_root: Hash256::zero(),
        state_root: Hash256::zero(),
        body_root: Hash256::repeat_byte(slot as u8),
    }
}

#[tokio::test]
async fn block_outcomes_are_counted_once() {
    let dir = tempdir().unwrap();
    let db = SlashingDatabase::create(&dir.path().join("slashing.sqlite")).unwrap();
    let http_client = Client::builder()
        .timeout(Duration::from_secs(2))
        .build()
        .unwrap();
    let store = ValidatorStore::new(
        db,
        Hash256::repeat_byte(0x42),
        Arc::new(ChainSpec::minimal()),
        None,
        TestingSlotClock::new(Slot::new(0), Duration::from_secs(0), Duration::from_secs(1)),
        http_client,
        test_logger(),
    );

    // Nothing listens on port 1.
    let remote = generate_deterministic_keypair(0).pk.compress();
    store
        .import_remote_key(remote, Url::parse("http://127.0.0.1:1").unwrap())
        .unwrap();
    let local = generate_deterministic_keypair(1);
    let local_pubkey = local.pk.compress();
    store.import_local_key(local).unwrap();

    let result = store.sign_block(remote, header(1), Slot::new(1)).await;
    assert!(matches!(result, Err(ValidatorStoreError::UnableToSign(_))));
    assert_eq!(blocks_signed(metrics::SUCCESS), 0);
    assert_eq!(blocks_signed(metrics::REMOTE_SIGNER_ERROR), 1);

    store
        .sign_block(local_pubkey, header(1), Slot::new(1))
        .await
        .unwrap();
    assert_eq!(blocks_signed(metrics::SUCCESS), 1);
    assert_eq!(blocks_signed(metrics::REMOTE_SIGNER_ERROR), 1);
}
