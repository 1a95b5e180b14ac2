//! Local vault, the on-disk index of protected seed records.
//!
//! Loads entirely into memory, flushed atomically via temp+rename. Records
//! are keyed by id in a BTreeMap so the JSON file stays diff-stable.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use crate::types::SeedRecord;

/// On-disk shape of the vault file.
#[derive(Debug, Default, Serialize, Deserialize)]
struct VaultData {
    #[serde(default)]
    records: BTreeMap<String, SeedRecord>,
    /// Unix timestamp of the last completed backup, if any
    #[serde(default)]
    last_backup_at: Option<u64>,
}

/// In-memory vault, persisted to a JSON file.
pub struct Vault {
    /// Path to the JSON vault file on disk
    path: PathBuf,
    data: VaultData,
    /// Whether there are unsaved changes
    dirty: bool,
}

impl Vault {
    /// Load or create a vault at the given path.
    /// If the file doesn't exist, starts empty.
    pub fn open(path: &Path) -> Result<Self> {
        let data = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("reading vault: {}", path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("parsing vault: {}", path.display()))?
        } else {
            VaultData::default()
        };

        Ok(Vault {
            path: path.to_path_buf(),
            data,
            dirty: false,
        })
    }

    /// Look up a record by id.
    pub fn get(&self, id: &str) -> Option<&SeedRecord> {
        self.data.records.get(id)
    }

    /// Resolve a user-supplied key to a record: exact id, then exact name,
    /// then unambiguous id prefix.
    pub fn find(&self, key: &str) -> Option<&SeedRecord> {
        if let Some(record) = self.data.records.get(key) {
            return Some(record);
        }
        let mut candidates = self
            .data
            .records
            .values()
            .filter(|r| r.name == key || r.id.starts_with(key));
        match (candidates.next(), candidates.next()) {
            (Some(record), None) => Some(record),
            _ => None,
        }
    }

    /// Insert or replace a record.
    pub fn insert(&mut self, record: SeedRecord) {
        self.data.records.insert(record.id.clone(), record);
        self.dirty = true;
    }

    /// Remove a record by id, returning it if present.
    pub fn remove(&mut self, id: &str) -> Option<SeedRecord> {
        let removed = self.data.records.remove(id);
        if removed.is_some() {
            self.dirty = true;
        }
        removed
    }

    /// All records, in id order.
    pub fn records(&self) -> impl Iterator<Item = &SeedRecord> {
        self.data.records.values()
    }

    /// Ids of all stored records.
    pub fn ids(&self) -> HashSet<String> {
        self.data.records.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.data.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.records.is_empty()
    }

    pub fn last_backup_at(&self) -> Option<u64> {
        self.data.last_backup_at
    }

    pub fn set_last_backup_at(&mut self, at: u64) {
        self.data.last_backup_at = Some(at);
        self.dirty = true;
    }

    /// Flush dirty changes to disk using an atomic write (write then rename).
    pub fn flush(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating vault dir: {}", parent.display()))?;
        }

        let json = serde_json::to_string_pretty(&self.data).context("serializing vault")?;

        let tmp_path = self.path.with_extension("tmp");
        std::fs::write(&tmp_path, &json)
            .with_context(|| format!("writing vault temp: {}", tmp_path.display()))?;
        std::fs::rename(&tmp_path, &self.path)
            .with_context(|| format!("renaming vault: {}", self.path.display()))?;

        self.dirty = false;
        Ok(())
    }
}

impl Drop for Vault {
    fn drop(&mut self) {
        if self.dirty {
            if let Err(e) = self.flush() {
                tracing::warn!("failed to flush vault on drop: {e}");
            }
        }
    }
}
