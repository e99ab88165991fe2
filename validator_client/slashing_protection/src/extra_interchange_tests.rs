#![cfg(test)]

use crate::test_utils::pubkey;
use crate::*;
use tempfile::tempdir;

#[test]
fn export_non_existent_key() {
    let dir = tempdir().unwrap();
    let slashing_db_file = dir.path().join("slashing_protection.sqlite");
    let slashing_db = SlashingDatabase::create(&slashing_db_file).unwrap();

    let key1 = pubkey(1);
    let key2 = pubkey(2);

    // Exporting two non-existent keys should fail on the first one.
    let err = slashing_db
        .export_interchange_info(Hash256::zero(), Some(&[key1, key2]))
        .unwrap_err();
    assert!(matches!(
        err,
        InterchangeError::NotSafe(NotSafe::UnregisteredValidator(k)) if k == key1
    ));

    slashing_db.register_validator(key1).unwrap();

    // Exporting one key that exists and one that doesn't should fail on the one that doesn't.
    let err = slashing_db
        .export_interchange_info(Hash256::zero(), Some(&[key1, key2]))
        .unwrap_err();
    assert!(matches!(
        err,
        InterchangeError::NotSafe(NotSafe::UnregisteredValidator(k)) if k == key2
    ));

    // Exporting only keys that exist should work.
    let interchange = slashing_db
        .export_interchange_info(Hash256::zero(), Some(&[key1]))
        .unwrap();
    assert_eq!(interchange.data.len(), 1);
    assert_eq!(interchange.data[0].pubkey, key1);
}

#[test]
fn export_same_key_twice() {
    let dir = tempdir().unwrap();
    let slashing_db_file = dir.path().join("slashing_protection.sqlite");
    let slashing_db = SlashingDatabase::create(&slashing_db_file).unwrap();

    let key1 = pubkey(1);

    slashing_db.register_validator(key1).unwrap();

    let export_single = slashing_db
        .export_interchange_info(Hash256::zero(), Some(&[key1]))
        .unwrap();
    let export_double = slashing_db
        .export_interchange_info(Hash256::zero(), Some(&[key1, key1]))
        .unwrap();

    assert_eq!(export_single.data.len(), 1);

    // Allow the same data to be exported twice, this is harmless, albeit slightly inefficient.
    assert_eq!(export_double.data.len(), 2);
    assert_eq!(export_double.data[0], export_double.data[1]);

    // The data should be identical to the single export.
    assert_eq!(export_double.data[0], export_single.data[0]);

    // The minified versions should be equal too.
    assert_eq!(
        export_single.minify().unwrap(),
        export_double.minify().unwrap()
    );
}

#[test]
fn import_rejects_mismatched_genesis_validators_root() {
    let dir = tempdir().unwrap();
    let slashing_db_file = dir.path().join("slashing_protection.sqlite");
    let slashing_db = SlashingDatabase::create(&slashing_db_file).unwrap();

    let interchange = crate::interchange_test::interchange([(0, 1)], []);
    let client_gvr = Hash256::repeat_byte(7);
    let err = slashing_db
        .import_interchange_info(interchange, client_gvr)
        .unwrap_err();
    assert!(matches!(
        err,
        InterchangeError::GenesisValidatorsMismatch { client, interchange_file }
            if client == client_gvr && interchange_file == Hash256::zero()
    ));

    // Nothing was registered.
    assert_eq!(slashing_db.num_validator_rows().unwrap(), 0);
}

#[test]
fn import_keeps_disabled_validator_disabled() {
    let dir = tempdir().unwrap();
    let slashing_db_file = dir.path().join("slashing_protection.sqlite");
    let slashing_db = SlashingDatabase::create(&slashing_db_file).unwrap();

    let key = pubkey(0);
    slashing_db.register_validator(key).unwrap();
    slashing_db.disable_validator(key).unwrap();

    let outcomes = slashing_db
        .import_interchange_info(
            crate::interchange_test::interchange([(0, 4)], [(0, 1, 2)]),
            Hash256::zero(),
        )
        .unwrap();
    assert_eq!(outcomes.len(), 1);
    assert!(!outcomes[0].failed());

    assert_eq!(
        slashing_db.get_validator_id(&key),
        Err(NotSafe::DisabledValidator(key))
    );

    // Disabled validators are still exported.
    let exported = slashing_db.export_all_interchange_info(Hash256::zero()).unwrap();
    assert_eq!(exported.len(), 1);
    assert_eq!(exported.data[0].signed_blocks[0].slot, types::Slot::new(4));
}

#[test]
fn import_summary_reports_bounds() {
    let dir = tempdir().unwrap();
    let slashing_db_file = dir.path().join("slashing_protection.sqlite");
    let slashing_db = SlashingDatabase::create(&slashing_db_file).unwrap();

    let outcomes = slashing_db
        .import_interchange_info(
            crate::interchange_test::interchange([(0, 4), (0, 8)], [(0, 1, 2), (0, 3, 5)]),
            Hash256::zero(),
        )
        .unwrap();

    match &outcomes[..] {
        [InterchangeImportOutcome::Success { pubkey: key, summary }] => {
            assert_eq!(*key, pubkey(0));
            assert_eq!(summary.max_block_slot, Some(types::Slot::new(8)));
            assert_eq!(summary.max_attestation_source, Some(types::Epoch::new(3)));
            assert_eq!(summary.max_attestation_target, Some(types::Epoch::new(5)));
        }
        other => panic!("unexpected outcomes: {:?}", other),
    }
}
