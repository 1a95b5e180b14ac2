//! End-to-end backup scenarios against in-memory keyrings: build a
//! container on one "machine", restore it on another, and check the
//! failure paths a damaged file or wrong password produces.

use std::collections::HashSet;

use secrecy::SecretString;
use slk_backup::{build_backup, restore_backup, BackupContainer, BackupError, FORMAT_VERSION};
use slk_core::{SeedRecord, SyncStatus};
use slk_crypto::{decrypt_phrase, encrypt_phrase, generate_key};
use slk_keystore::{KeyCustodian, KeystoreError, MemoryKeyring};

const PHRASES: [&str; 2] = [
    "legal winner thank year wave sausage worth useful legal winner thank yellow",
    "zoo zoo zoo zoo zoo zoo zoo zoo zoo zoo zoo wrong",
];

fn password() -> SecretString {
    SecretString::from("correct-horse-battery".to_string())
}

/// A custodian holding keys for records sealed from [`PHRASES`].
fn seeded_custodian() -> (KeyCustodian<MemoryKeyring>, Vec<SeedRecord>) {
    let custodian = KeyCustodian::new(MemoryKeyring::new());
    let mut records = Vec::new();
    for (i, phrase) in PHRASES.iter().enumerate() {
        let key = generate_key();
        let sealed = encrypt_phrase(&key, phrase).unwrap();
        let mut record = SeedRecord::new(format!("wallet {i}"), sealed, 12);
        record.tags = vec!["test".to_string()];
        record.starred = i == 0;
        custodian.save(&record.id, &key, false).unwrap();
        records.push(record);
    }
    (custodian, records)
}

#[test]
fn roundtrip_restores_phrases_on_fresh_machine() {
    let (source, records) = seeded_custodian();
    let outcome = build_backup(&records, &password(), &source, "laptop").unwrap();
    assert!(outcome.skipped.is_empty());
    assert_eq!(outcome.container.version, FORMAT_VERSION);
    assert_eq!(outcome.container.device_name, "laptop");

    // Through the on-disk form, onto a machine with an empty keyring
    let json = outcome.container.to_json().unwrap();
    let container = BackupContainer::from_json(&json).unwrap();

    let target = KeyCustodian::new(MemoryKeyring::new());
    let restored = restore_backup(&container, &password(), &HashSet::new(), &target, false);
    assert!(restored.failed.is_empty());
    assert!(restored.skipped_existing.is_empty());
    assert_eq!(restored.restored.len(), records.len());

    for (i, (record, original)) in restored.restored.iter().zip(&records).enumerate() {
        assert_eq!(record.id, original.id);
        assert_eq!(record.name, original.name);
        assert_eq!(record.tags, original.tags);
        assert_eq!(record.starred, original.starred);
        assert_eq!(record.encrypted_phrase, original.encrypted_phrase);
        // Sync life starts over
        assert_eq!(record.sync_status, SyncStatus::Pending);
        assert!(record.last_synced_at.is_none());

        // The restored key is byte-for-byte the original and opens the ciphertext
        let key = target.retrieve(&record.id).unwrap();
        assert_eq!(
            key.as_bytes(),
            source.retrieve(&record.id).unwrap().as_bytes()
        );
        let phrase = decrypt_phrase(&key, &record.encrypted_phrase).unwrap();
        assert_eq!(phrase, PHRASES[i]);
    }
}

#[test]
fn wrong_password_restores_nothing() {
    let (source, records) = seeded_custodian();
    let outcome = build_backup(&records, &password(), &source, "laptop").unwrap();

    let target = KeyCustodian::new(MemoryKeyring::new());
    let wrong = SecretString::from("not-the-password".to_string());
    let restored = restore_backup(&outcome.container, &wrong, &HashSet::new(), &target, false);

    assert!(restored.restored.is_empty());
    assert_eq!(restored.failed.len(), records.len());
    for failure in &restored.failed {
        assert!(failure.reason.contains("decryption failed"));
    }
    // Nothing leaked into the target keyring either
    for record in &records {
        assert!(matches!(
            target.retrieve(&record.id),
            Err(KeystoreError::KeyNotFound(_))
        ));
    }
}

#[test]
fn restore_skips_records_the_vault_already_has() {
    let (source, records) = seeded_custodian();
    let outcome = build_backup(&records, &password(), &source, "laptop").unwrap();

    let target = KeyCustodian::new(MemoryKeyring::new());
    let first = restore_backup(&outcome.container, &password(), &HashSet::new(), &target, false);
    assert_eq!(first.restored.len(), records.len());

    // Second pass with the first pass's ids in the vault
    let existing: HashSet<String> = first.restored.iter().map(|r| r.id.clone()).collect();
    let second = restore_backup(&outcome.container, &password(), &existing, &target, false);

    assert!(second.restored.is_empty());
    assert!(second.failed.is_empty());
    assert_eq!(second.skipped_existing.len(), records.len());
}

#[test]
fn damaged_entry_fails_alone() {
    let (source, records) = seeded_custodian();
    let outcome = build_backup(&records, &password(), &source, "laptop").unwrap();

    // Flip one byte inside the first entry's wrapped key
    let mut container = outcome.container;
    let mut wrapped = {
        use base64::engine::general_purpose::STANDARD;
        use base64::Engine;
        STANDARD.decode(&container.entries[0].wrapped_key).unwrap()
    };
    wrapped[0] ^= 0xFF;
    container.entries[0].wrapped_key = {
        use base64::engine::general_purpose::STANDARD;
        use base64::Engine;
        STANDARD.encode(&wrapped)
    };

    let target = KeyCustodian::new(MemoryKeyring::new());
    let restored = restore_backup(&container, &password(), &HashSet::new(), &target, false);

    assert_eq!(restored.failed.len(), 1);
    assert_eq!(restored.failed[0].id, records[0].id);
    assert_eq!(restored.restored.len(), 1);
    assert_eq!(restored.restored[0].id, records[1].id);
}

#[test]
fn record_without_key_is_skipped_from_backup() {
    let (source, records) = seeded_custodian();
    source.delete(&records[0].id).unwrap();

    let outcome = build_backup(&records, &password(), &source, "laptop").unwrap();
    assert_eq!(outcome.container.entries.len(), 1);
    assert_eq!(outcome.container.entries[0].id, records[1].id);
    assert_eq!(outcome.skipped.len(), 1);
    assert_eq!(outcome.skipped[0].id, records[0].id);
    assert!(outcome.skipped[0].reason.contains("no key found"));
}

#[test]
fn all_records_failing_is_an_error() {
    let (source, records) = seeded_custodian();
    for record in &records {
        source.delete(&record.id).unwrap();
    }

    assert!(matches!(
        build_backup(&records, &password(), &source, "laptop"),
        Err(BackupError::NoDataToBackup)
    ));
}

#[test]
fn empty_vault_backs_up_to_empty_container() {
    let custodian = KeyCustodian::new(MemoryKeyring::new());
    let outcome = build_backup(&[], &password(), &custodian, "laptop").unwrap();

    assert!(outcome.container.entries.is_empty());
    assert!(outcome.skipped.is_empty());

    // And such a container restores to nothing without complaint
    let restored = restore_backup(
        &outcome.container,
        &password(),
        &HashSet::new(),
        &custodian,
        false,
    );
    assert!(restored.restored.is_empty());
    assert!(restored.failed.is_empty());
}

#[test]
fn container_from_newer_build_still_restores() {
    let (source, records) = seeded_custodian();
    let outcome = build_backup(&records, &password(), &source, "laptop").unwrap();

    // Simulate a newer build: bump the version and sprinkle unknown fields
    let mut value: serde_json::Value =
        serde_json::from_str(&outcome.container.to_json().unwrap()).unwrap();
    value["version"] = serde_json::json!("9.9");
    value["compression"] = serde_json::json!("none");
    value["entries"][0]["pinned"] = serde_json::json!(true);
    let json = value.to_string();

    let container = BackupContainer::from_json(&json).unwrap();
    let target = KeyCustodian::new(MemoryKeyring::new());
    let restored = restore_backup(&container, &password(), &HashSet::new(), &target, false);

    assert_eq!(restored.restored.len(), records.len());
    assert!(restored.failed.is_empty());
}
