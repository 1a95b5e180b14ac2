//! Keyring storage backends.
//!
//! `PlatformKeyring` talks to the OS credential store via the `keyring`
//! crate (Keychain Services on macOS, Secret Service on Linux, Credential
//! Manager on Windows). `MemoryKeyring` backs tests.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::KeystoreError;

/// Byte blobs addressed by (id, sync-policy) pairs.
///
/// The two policies are fully separate namespaces; an id may appear under
/// both as far as this layer is concerned. The custodian above enforces
/// the one-copy rule.
pub trait KeyringBackend {
    fn put(&self, id: &str, sync: bool, bytes: &[u8]) -> Result<(), KeystoreError>;
    fn get(&self, id: &str, sync: bool) -> Result<Option<Vec<u8>>, KeystoreError>;
    /// Remove an entry, reporting whether anything was stored.
    fn remove(&self, id: &str, sync: bool) -> Result<bool, KeystoreError>;
    /// All ids stored under the given policy.
    fn ids(&self, sync: bool) -> Result<Vec<String>, KeystoreError>;
}

// ── in-memory backend ────────────────────────────────────────────────────────

type Entries = HashMap<(String, bool), Vec<u8>>;

/// HashMap-backed keyring for tests.
#[derive(Default)]
pub struct MemoryKeyring {
    entries: Mutex<Entries>,
}

impl MemoryKeyring {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Entries>, KeystoreError> {
        self.entries
            .lock()
            .map_err(|_| KeystoreError::Backend("keyring mutex poisoned".to_string()))
    }
}

impl KeyringBackend for MemoryKeyring {
    fn put(&self, id: &str, sync: bool, bytes: &[u8]) -> Result<(), KeystoreError> {
        self.lock()?.insert((id.to_string(), sync), bytes.to_vec());
        Ok(())
    }

    fn get(&self, id: &str, sync: bool) -> Result<Option<Vec<u8>>, KeystoreError> {
        Ok(self.lock()?.get(&(id.to_string(), sync)).cloned())
    }

    fn remove(&self, id: &str, sync: bool) -> Result<bool, KeystoreError> {
        Ok(self.lock()?.remove(&(id.to_string(), sync)).is_some())
    }

    fn ids(&self, sync: bool) -> Result<Vec<String>, KeystoreError> {
        Ok(self
            .lock()?
            .keys()
            .filter(|(_, policy)| *policy == sync)
            .map(|(id, _)| id.clone())
            .collect())
    }
}

// ── platform backend ─────────────────────────────────────────────────────────

/// Reserved account per service holding the JSON id index. The platform
/// credential stores have no portable enumeration call, so `ids()` reads
/// this index, maintained on every put/remove.
const INDEX_ACCOUNT: &str = "__slk_index__";

/// OS credential store backend. The local policy uses the configured
/// service name as-is; the synchronized policy uses "<service>.sync".
pub struct PlatformKeyring {
    service: String,
}

impl PlatformKeyring {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn service_for(&self, sync: bool) -> String {
        if sync {
            format!("{}.sync", self.service)
        } else {
            self.service.clone()
        }
    }

    fn entry(&self, account: &str, sync: bool) -> Result<keyring::Entry, KeystoreError> {
        keyring::Entry::new(&self.service_for(sync), account)
            .map_err(|e| KeystoreError::Backend(format!("keyring entry creation: {e}")))
    }

    fn read_index(&self, sync: bool) -> Result<Vec<String>, KeystoreError> {
        match self.entry(INDEX_ACCOUNT, sync)?.get_secret() {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| KeystoreError::Backend(format!("parsing keyring index: {e}"))),
            Err(keyring::Error::NoEntry) => Ok(Vec::new()),
            Err(e) => Err(KeystoreError::Backend(format!("keyring index read: {e}"))),
        }
    }

    fn write_index(&self, sync: bool, ids: &[String]) -> Result<(), KeystoreError> {
        let bytes = serde_json::to_vec(ids)
            .map_err(|e| KeystoreError::Backend(format!("encoding keyring index: {e}")))?;
        self.entry(INDEX_ACCOUNT, sync)?
            .set_secret(&bytes)
            .map_err(|e| KeystoreError::Backend(format!("keyring index write: {e}")))
    }
}

impl KeyringBackend for PlatformKeyring {
    fn put(&self, id: &str, sync: bool, bytes: &[u8]) -> Result<(), KeystoreError> {
        self.entry(id, sync)?
            .set_secret(bytes)
            .map_err(|e| KeystoreError::Backend(format!("keyring store for '{id}': {e}")))?;

        let mut index = self.read_index(sync)?;
        if !index.iter().any(|existing| existing == id) {
            index.push(id.to_string());
            self.write_index(sync, &index)?;
        }
        tracing::debug!(id, sync, "stored key in platform keyring");
        Ok(())
    }

    fn get(&self, id: &str, sync: bool) -> Result<Option<Vec<u8>>, KeystoreError> {
        match self.entry(id, sync)?.get_secret() {
            Ok(bytes) => Ok(Some(bytes)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(KeystoreError::Backend(format!(
                "keyring get for '{id}': {e}"
            ))),
        }
    }

    fn remove(&self, id: &str, sync: bool) -> Result<bool, KeystoreError> {
        let removed = match self.entry(id, sync)?.delete_credential() {
            Ok(()) => true,
            Err(keyring::Error::NoEntry) => false,
            Err(e) => {
                return Err(KeystoreError::Backend(format!(
                    "keyring delete for '{id}': {e}"
                )))
            }
        };

        if removed {
            let mut index = self.read_index(sync)?;
            index.retain(|existing| existing != id);
            self.write_index(sync, &index)?;
            tracing::debug!(id, sync, "deleted key from platform keyring");
        }
        Ok(removed)
    }

    fn ids(&self, sync: bool) -> Result<Vec<String>, KeystoreError> {
        self.read_index(sync)
    }
}
