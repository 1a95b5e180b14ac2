//! Backup container format: versioned JSON with base64 payload fields.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Container format version written by this build.
pub const FORMAT_VERSION: &str = "1.0";

/// File extension for backup files.
pub const BACKUP_EXTENSION: &str = "seedlock";

#[derive(Debug, Error)]
pub enum BackupError {
    #[error("no records could be included in the backup")]
    NoDataToBackup,
    #[error("encoding backup: {0}")]
    Serialize(#[source] serde_json::Error),
    #[error("parsing backup: {0}")]
    Parse(#[source] serde_json::Error),
}

/// One protected record in a backup container.
///
/// Payload fields ride as base64 strings. Sync bookkeeping is absent on
/// purpose: a restored record starts its sync life over on the new
/// machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupEntry {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Sealed phrase blob, base64
    pub encrypted_phrase: String,
    /// Content key sealed under the password key, base64
    pub wrapped_key: String,
    pub word_count: usize,
    pub created_at: u64,
    pub updated_at: u64,
    #[serde(default)]
    pub last_accessed_at: Option<u64>,
    #[serde(default)]
    pub starred: bool,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupContainer {
    pub version: String,
    pub created_at: u64,
    pub device_name: String,
    pub entries: Vec<BackupEntry>,
}

impl BackupContainer {
    pub fn new(device_name: impl Into<String>, entries: Vec<BackupEntry>) -> Self {
        Self {
            version: FORMAT_VERSION.to_string(),
            created_at: slk_core::now_epoch(),
            device_name: device_name.into(),
            entries,
        }
    }

    /// Pretty-printed JSON, the on-disk form.
    pub fn to_json(&self) -> Result<String, BackupError> {
        serde_json::to_string_pretty(self).map_err(BackupError::Serialize)
    }

    /// Parse a container. Unknown fields are ignored and missing optional
    /// fields default, so files written by newer builds still load.
    pub fn from_json(data: &str) -> Result<Self, BackupError> {
        serde_json::from_str(data).map_err(BackupError::Parse)
    }
}

/// This machine's name for the container header.
pub fn default_device_name() -> String {
    hostname::get()
        .ok()
        .and_then(|name| name.into_string().ok())
        .unwrap_or_else(|| "unknown-device".to_string())
}

/// Conventional file name for a backup created at `created_at`.
pub fn backup_file_name(created_at: u64) -> String {
    format!("seedlock-backup-{created_at}.{BACKUP_EXTENSION}")
}

pub(crate) fn base64_encode(bytes: &[u8]) -> String {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    STANDARD.encode(bytes)
}

pub(crate) fn base64_decode(data: &str) -> Result<Vec<u8>, base64::DecodeError> {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    STANDARD.decode(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry() -> BackupEntry {
        BackupEntry {
            id: "11111111-2222-3333-4444-555555555555".to_string(),
            name: "cold wallet".to_string(),
            tags: vec!["hardware".to_string()],
            encrypted_phrase: base64_encode(&[1, 2, 3]),
            wrapped_key: base64_encode(&[4, 5, 6]),
            word_count: 24,
            created_at: 1_700_000_000,
            updated_at: 1_700_000_100,
            last_accessed_at: None,
            starred: true,
            archived: false,
            note: Some("drawer".to_string()),
        }
    }

    #[test]
    fn test_container_json_roundtrip() {
        let container = BackupContainer::new("laptop", vec![entry()]);
        let json = container.to_json().unwrap();

        let parsed = BackupContainer::from_json(&json).unwrap();
        assert_eq!(parsed.version, FORMAT_VERSION);
        assert_eq!(parsed.device_name, "laptop");
        assert_eq!(parsed.entries, vec![entry()]);
    }

    #[test]
    fn test_no_sync_fields_on_the_wire() {
        let container = BackupContainer::new("laptop", vec![entry()]);
        let json = container.to_json().unwrap();
        assert!(!json.contains("sync_status"));
        assert!(!json.contains("last_synced_at"));
    }

    #[test]
    fn test_unknown_and_missing_fields_tolerated() {
        // A file from some future build: extra fields present, optional
        // ones absent.
        let json = r#"{
            "version": "3.5",
            "created_at": 1700000000,
            "device_name": "phone",
            "checksum": "deadbeef",
            "entries": [{
                "id": "abc",
                "name": "w",
                "encrypted_phrase": "AQID",
                "wrapped_key": "BAUG",
                "word_count": 12,
                "created_at": 1,
                "updated_at": 2,
                "color": "teal"
            }]
        }"#;

        let parsed = BackupContainer::from_json(json).unwrap();
        assert_eq!(parsed.version, "3.5");
        assert_eq!(parsed.entries.len(), 1);
        assert!(parsed.entries[0].tags.is_empty());
        assert!(!parsed.entries[0].starred);
        assert!(parsed.entries[0].note.is_none());
    }

    #[test]
    fn test_non_ascii_foreign_id_shortens_safely() {
        // Foreign tools can put any string in the id field. Listings show
        // a shortened form of it, and byte eight of this one falls inside
        // a character.
        let json = r#"{
            "version": "1.0",
            "created_at": 1700000000,
            "device_name": "phone",
            "entries": [{
                "id": "ひらがなデータ",
                "name": "imported",
                "encrypted_phrase": "AQID",
                "wrapped_key": "BAUG",
                "word_count": 12,
                "created_at": 1,
                "updated_at": 2
            }]
        }"#;

        let parsed = BackupContainer::from_json(json).unwrap();
        assert_eq!(slk_core::short_id(&parsed.entries[0].id), "ひらがなデータ");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            BackupContainer::from_json("not json at all"),
            Err(BackupError::Parse(_))
        ));
    }

    #[test]
    fn test_backup_file_name() {
        assert_eq!(
            backup_file_name(1_700_000_000),
            "seedlock-backup-1700000000.seedlock"
        );
    }

    #[test]
    fn test_default_device_name_nonempty() {
        assert!(!default_device_name().is_empty());
    }
}
