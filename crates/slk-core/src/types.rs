use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Sync state label carried on a seed record.
///
/// The crypto layers treat this as opaque pass-through metadata; only the
/// surrounding sync machinery ever branches on it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    #[default]
    Pending,
    Synced,
    Failed,
    LocalOnly,
}

/// A protected seed phrase entry: ciphertext plus display metadata.
///
/// The plaintext phrase never appears here, and neither does its key;
/// the per-item key lives in the keystore under `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedRecord {
    /// UUID v4 identifier (string form, also the keystore lookup key)
    pub id: String,
    /// Display name
    pub name: String,
    /// Free-form tags
    #[serde(default)]
    pub tags: Vec<String>,
    /// Sealed phrase bytes: `[nonce][ciphertext][tag]` (base64 on disk)
    #[serde(with = "b64")]
    pub encrypted_phrase: Vec<u8>,
    /// Declared word count of the plaintext phrase
    pub word_count: usize,
    /// Unix timestamp of creation
    pub created_at: u64,
    /// Unix timestamp of the last metadata update
    pub updated_at: u64,
    /// Unix timestamp of the last reveal, if any
    #[serde(default)]
    pub last_accessed_at: Option<u64>,
    #[serde(default)]
    pub starred: bool,
    #[serde(default)]
    pub archived: bool,
    /// Free-text note
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub sync_status: SyncStatus,
    #[serde(default)]
    pub last_synced_at: Option<u64>,
}

impl SeedRecord {
    /// Record for a freshly sealed phrase: new UUID, creation timestamps,
    /// sync state starting out pending.
    pub fn new(name: impl Into<String>, encrypted_phrase: Vec<u8>, word_count: usize) -> Self {
        let now = now_epoch();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            tags: Vec::new(),
            encrypted_phrase,
            word_count,
            created_at: now,
            updated_at: now,
            last_accessed_at: None,
            starred: false,
            archived: false,
            note: None,
            sync_status: SyncStatus::Pending,
            last_synced_at: None,
        }
    }

    /// Stamp a reveal access, which also counts as an update.
    pub fn touch_accessed(&mut self) {
        let now = now_epoch();
        self.last_accessed_at = Some(now);
        self.updated_at = now;
    }

    /// Flip the star flag, returning the new state.
    pub fn toggle_starred(&mut self) -> bool {
        self.starred = !self.starred;
        self.updated_at = now_epoch();
        self.starred
    }

    /// Flip the archive flag, returning the new state.
    pub fn toggle_archived(&mut self) -> bool {
        self.archived = !self.archived;
        self.updated_at = now_epoch();
        self.archived
    }
}

/// Current time as Unix seconds.
pub fn now_epoch() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// First eight characters of an id, for compact listings.
///
/// Ids minted here are ASCII UUIDs, but restored ones can hold any string
/// a foreign backup carried, so the cut must land on a character boundary
/// rather than at byte eight.
pub fn short_id(id: &str) -> &str {
    match id.char_indices().nth(8) {
        Some((offset, _)) => &id[..offset],
        None => id,
    }
}

/// Serde adapter: binary fields as base64 strings in JSON.
pub mod b64 {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}
