//! Building and restoring backup containers.
//!
//! Both directions are per-item fault tolerant: a record that cannot be
//! wrapped or unwrapped is reported and skipped, never aborting the rest
//! of the pass.

use std::collections::HashSet;

use secrecy::SecretString;
use slk_core::{SeedRecord, SyncStatus};
use slk_crypto::{decrypt, derive_password_key, encrypt, PhraseKey};
use slk_keystore::{KeyCustodian, KeyringBackend};
use zeroize::Zeroize;

use crate::container::{base64_decode, base64_encode, BackupContainer, BackupEntry, BackupError};

/// A record that could not be carried across, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemFailure {
    pub id: String,
    pub name: String,
    pub reason: String,
}

/// Result of building a container.
#[derive(Debug)]
pub struct BuildOutcome {
    pub container: BackupContainer,
    /// Records left out, with reasons
    pub skipped: Vec<ItemFailure>,
}

/// Result of applying a container.
#[derive(Debug)]
pub struct RestoreOutcome {
    /// Records ready for the vault, their keys already in custody
    pub restored: Vec<SeedRecord>,
    /// Ids skipped because the vault already has them
    pub skipped_existing: Vec<String>,
    pub failed: Vec<ItemFailure>,
}

/// Wrap every record's content key under the password key and assemble a
/// container.
///
/// Records whose key cannot be fetched or wrapped are skipped with a
/// reason. An empty input produces an empty container; a non-empty input
/// where every record fails is an error.
pub fn build_backup<B: KeyringBackend>(
    records: &[SeedRecord],
    password: &SecretString,
    custodian: &KeyCustodian<B>,
    device_name: &str,
) -> Result<BuildOutcome, BackupError> {
    let password_key = derive_password_key(password);

    let mut entries = Vec::with_capacity(records.len());
    let mut skipped = Vec::new();
    for record in records {
        match wrap_record(record, &password_key, custodian) {
            Ok(entry) => entries.push(entry),
            Err(reason) => {
                tracing::warn!(id = %record.id, reason = %reason, "record left out of backup");
                skipped.push(ItemFailure {
                    id: record.id.clone(),
                    name: record.name.clone(),
                    reason,
                });
            }
        }
    }

    if entries.is_empty() && !records.is_empty() {
        return Err(BackupError::NoDataToBackup);
    }

    tracing::info!(
        entries = entries.len(),
        skipped = skipped.len(),
        "backup container assembled"
    );
    Ok(BuildOutcome {
        container: BackupContainer::new(device_name, entries),
        skipped,
    })
}

/// Apply a container: unwrap each entry's key, hand it to the custodian
/// under the given sync policy, and emit vault-ready records.
///
/// Entries whose id the vault already has are skipped before any crypto
/// runs. A wrong password surfaces as every fresh entry failing to
/// unwrap. Restored records restart sync bookkeeping from pending.
pub fn restore_backup<B: KeyringBackend>(
    container: &BackupContainer,
    password: &SecretString,
    existing_ids: &HashSet<String>,
    custodian: &KeyCustodian<B>,
    sync: bool,
) -> RestoreOutcome {
    let password_key = derive_password_key(password);

    let mut outcome = RestoreOutcome {
        restored: Vec::new(),
        skipped_existing: Vec::new(),
        failed: Vec::new(),
    };

    for entry in &container.entries {
        if existing_ids.contains(&entry.id) {
            outcome.skipped_existing.push(entry.id.clone());
            continue;
        }
        match unwrap_entry(entry, &password_key, custodian, sync) {
            Ok(record) => outcome.restored.push(record),
            Err(reason) => {
                tracing::warn!(id = %entry.id, reason = %reason, "backup entry not restored");
                outcome.failed.push(ItemFailure {
                    id: entry.id.clone(),
                    name: entry.name.clone(),
                    reason,
                });
            }
        }
    }

    tracing::info!(
        restored = outcome.restored.len(),
        skipped = outcome.skipped_existing.len(),
        failed = outcome.failed.len(),
        "backup applied"
    );
    outcome
}

fn wrap_record<B: KeyringBackend>(
    record: &SeedRecord,
    password_key: &PhraseKey,
    custodian: &KeyCustodian<B>,
) -> Result<BackupEntry, String> {
    let content_key = custodian.retrieve(&record.id).map_err(|e| e.to_string())?;
    let wrapped = encrypt(password_key, content_key.as_bytes()).map_err(|e| e.to_string())?;

    Ok(BackupEntry {
        id: record.id.clone(),
        name: record.name.clone(),
        tags: record.tags.clone(),
        encrypted_phrase: base64_encode(&record.encrypted_phrase),
        wrapped_key: base64_encode(&wrapped),
        word_count: record.word_count,
        created_at: record.created_at,
        updated_at: record.updated_at,
        last_accessed_at: record.last_accessed_at,
        starred: record.starred,
        archived: record.archived,
        note: record.note.clone(),
    })
}

fn unwrap_entry<B: KeyringBackend>(
    entry: &BackupEntry,
    password_key: &PhraseKey,
    custodian: &KeyCustodian<B>,
    sync: bool,
) -> Result<SeedRecord, String> {
    let wrapped = base64_decode(&entry.wrapped_key).map_err(|e| format!("wrapped key: {e}"))?;
    let mut key_bytes = decrypt(password_key, &wrapped).map_err(|e| e.to_string())?;
    let content_key = PhraseKey::from_slice(&key_bytes).map_err(|e| e.to_string());
    key_bytes.zeroize();
    let content_key = content_key?;

    let encrypted_phrase =
        base64_decode(&entry.encrypted_phrase).map_err(|e| format!("sealed phrase: {e}"))?;

    custodian
        .save(&entry.id, &content_key, sync)
        .map_err(|e| e.to_string())?;

    Ok(SeedRecord {
        id: entry.id.clone(),
        name: entry.name.clone(),
        tags: entry.tags.clone(),
        encrypted_phrase,
        word_count: entry.word_count,
        created_at: entry.created_at,
        updated_at: entry.updated_at,
        last_accessed_at: entry.last_accessed_at,
        starred: entry.starred,
        archived: entry.archived,
        note: entry.note.clone(),
        sync_status: SyncStatus::Pending,
        last_synced_at: None,
    })
}
