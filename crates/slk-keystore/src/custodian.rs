//! The key custodian: one content key per record id, stored under exactly
//! one sync policy at a time.

use secrecy::{ExposeSecret, SecretString};
use slk_crypto::PhraseKey;
use zeroize::Zeroize;

use crate::backend::KeyringBackend;
use crate::KeystoreError;

/// Reserved account holding the backup password. It is stored like any
/// other record, so it shows up in [`KeyCustodian::list_ids`] and rides
/// along in migration.
pub const BACKUP_PASSWORD_ID: &str = "backup_password";

/// Outcome of a completed migration pass.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct MigrationReport {
    /// Keys moved to the target policy
    pub migrated: usize,
    /// Keys already stored under the target policy
    pub skipped: usize,
}

pub struct KeyCustodian<B: KeyringBackend> {
    backend: B,
}

impl<B: KeyringBackend> KeyCustodian<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    /// Store the key for `id` under the given policy. Stale copies under
    /// either policy are cleared first so a record never has two keys.
    pub fn save(&self, id: &str, key: &PhraseKey, sync: bool) -> Result<(), KeystoreError> {
        self.save_bytes(id, key.as_bytes(), sync)
    }

    /// Fetch the key for `id`, whichever policy it lives under.
    pub fn retrieve(&self, id: &str) -> Result<PhraseKey, KeystoreError> {
        for sync in [false, true] {
            if let Some(mut bytes) = self.backend.get(id, sync)? {
                let key = PhraseKey::from_slice(&bytes);
                let len = bytes.len();
                bytes.zeroize();
                return key.map_err(|_| KeystoreError::InvalidKeyBytes {
                    id: id.to_string(),
                    len,
                });
            }
        }
        Err(KeystoreError::KeyNotFound(id.to_string()))
    }

    /// Drop any stored key for `id` under either policy. Safe to call
    /// when nothing is stored.
    pub fn delete(&self, id: &str) -> Result<(), KeystoreError> {
        for sync in [false, true] {
            self.backend.remove(id, sync)?;
        }
        Ok(())
    }

    /// Ids of every stored key under both policies, sorted, deduplicated.
    pub fn list_ids(&self) -> Result<Vec<String>, KeystoreError> {
        let mut ids = self.backend.ids(false)?;
        ids.extend(self.backend.ids(true)?);
        ids.sort();
        ids.dedup();
        Ok(ids)
    }

    /// Move every stored key to the `target` sync policy.
    ///
    /// Both id lists are snapshotted up front, so keys rewritten during
    /// the pass are not revisited. Keys already under the target policy
    /// stay put and count as skipped. A per-key failure does not stop the
    /// pass; if any key fails, the call reports a partial failure. There
    /// is no rollback, and a write that fails after the clears loses that
    /// key. Nothing here serializes concurrent custody calls; run one
    /// migration at a time and keep save/delete off the affected ids.
    pub fn migrate(&self, target: bool) -> Result<MigrationReport, KeystoreError> {
        let source_ids = self.backend.ids(!target)?;
        let target_ids = self.backend.ids(target)?;
        let total = source_ids.len() + target_ids.len();

        let mut report = MigrationReport {
            migrated: 0,
            skipped: target_ids.len(),
        };

        let mut failed = 0usize;
        for id in &source_ids {
            match self.migrate_one(id, target) {
                Ok(()) => report.migrated += 1,
                Err(e) => {
                    failed += 1;
                    tracing::warn!(id = %id, "key migration failed: {e}");
                }
            }
        }

        if failed > 0 {
            return Err(KeystoreError::PartialMigrationFailure { failed, total });
        }
        tracing::info!(
            migrated = report.migrated,
            skipped = report.skipped,
            target_sync = target,
            "key migration complete"
        );
        Ok(report)
    }

    // ── backup password ──────────────────────────────────────────────────

    /// Store the backup password as a keyring record of its own, under the
    /// currently configured policy.
    pub fn save_backup_password(
        &self,
        password: &SecretString,
        sync: bool,
    ) -> Result<(), KeystoreError> {
        self.save_bytes(BACKUP_PASSWORD_ID, password.expose_secret().as_bytes(), sync)
    }

    pub fn load_backup_password(&self) -> Result<Option<SecretString>, KeystoreError> {
        for sync in [false, true] {
            if let Some(bytes) = self.backend.get(BACKUP_PASSWORD_ID, sync)? {
                return match String::from_utf8(bytes) {
                    Ok(mut password) => {
                        let secret = SecretString::from(password.clone());
                        password.zeroize();
                        Ok(Some(secret))
                    }
                    Err(e) => {
                        let mut raw = e.into_bytes();
                        raw.zeroize();
                        Err(KeystoreError::Backend(
                            "stored backup password is not valid UTF-8".to_string(),
                        ))
                    }
                };
            }
        }
        Ok(None)
    }

    pub fn has_backup_password(&self) -> Result<bool, KeystoreError> {
        for sync in [false, true] {
            if self.backend.get(BACKUP_PASSWORD_ID, sync)?.is_some() {
                return Ok(true);
            }
        }
        Ok(false)
    }

    pub fn delete_backup_password(&self) -> Result<(), KeystoreError> {
        self.delete(BACKUP_PASSWORD_ID)
    }

    // ── internals ────────────────────────────────────────────────────────

    fn save_bytes(&self, id: &str, bytes: &[u8], sync: bool) -> Result<(), KeystoreError> {
        // Clear-then-write keeps the one-copy invariant; cleanup failures
        // are not fatal because the write below overwrites anyway.
        for policy in [false, true] {
            if let Err(e) = self.backend.remove(id, policy) {
                tracing::debug!(id, policy, "pre-save cleanup failed: {e}");
            }
        }
        self.backend.put(id, sync, bytes)
    }

    fn migrate_one(&self, id: &str, target: bool) -> Result<(), KeystoreError> {
        let mut bytes = self
            .backend
            .get(id, !target)?
            .ok_or_else(|| KeystoreError::KeyNotFound(id.to_string()))?;

        for policy in [false, true] {
            if let Err(e) = self.backend.remove(id, policy) {
                tracing::debug!(id, policy, "pre-write cleanup failed: {e}");
            }
        }
        let result = self.backend.put(id, target, &bytes);
        bytes.zeroize();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryKeyring;

    fn key(fill: u8) -> PhraseKey {
        PhraseKey::from_bytes([fill; slk_crypto::KEY_SIZE])
    }

    #[test]
    fn test_save_retrieve_roundtrip() {
        let custodian = KeyCustodian::new(MemoryKeyring::new());
        custodian.save("a", &key(7), false).unwrap();

        let fetched = custodian.retrieve("a").unwrap();
        assert_eq!(fetched.as_bytes(), key(7).as_bytes());
    }

    #[test]
    fn test_retrieve_finds_either_policy() {
        let custodian = KeyCustodian::new(MemoryKeyring::new());
        custodian.save("local", &key(1), false).unwrap();
        custodian.save("synced", &key(2), true).unwrap();

        assert_eq!(custodian.retrieve("local").unwrap().as_bytes(), &[1; 32]);
        assert_eq!(custodian.retrieve("synced").unwrap().as_bytes(), &[2; 32]);
    }

    #[test]
    fn test_retrieve_missing_is_not_found() {
        let custodian = KeyCustodian::new(MemoryKeyring::new());
        assert!(matches!(
            custodian.retrieve("ghost"),
            Err(KeystoreError::KeyNotFound(id)) if id == "ghost"
        ));
    }

    #[test]
    fn test_resave_under_new_policy_leaves_one_copy() {
        let backend = MemoryKeyring::new();
        let custodian = KeyCustodian::new(backend);
        custodian.save("a", &key(1), false).unwrap();
        custodian.save("a", &key(2), true).unwrap();

        // Only the second copy remains, and only under the new policy
        assert_eq!(custodian.retrieve("a").unwrap().as_bytes(), &[2; 32]);
        assert_eq!(custodian.list_ids().unwrap(), vec!["a"]);
    }

    #[test]
    fn test_delete_is_noop_safe() {
        let custodian = KeyCustodian::new(MemoryKeyring::new());
        custodian.delete("never-stored").unwrap();

        custodian.save("a", &key(1), true).unwrap();
        custodian.delete("a").unwrap();
        assert!(matches!(
            custodian.retrieve("a"),
            Err(KeystoreError::KeyNotFound(_))
        ));
        custodian.delete("a").unwrap();
    }

    #[test]
    fn test_list_ids_spans_policies() {
        let custodian = KeyCustodian::new(MemoryKeyring::new());
        custodian.save("b", &key(1), false).unwrap();
        custodian.save("a", &key(2), true).unwrap();

        assert_eq!(custodian.list_ids().unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn test_invalid_stored_bytes_reported_with_length() {
        let backend = MemoryKeyring::new();
        backend.put("stunted", false, &[1, 2, 3, 4, 5]).unwrap();
        let custodian = KeyCustodian::new(backend);

        assert!(matches!(
            custodian.retrieve("stunted"),
            Err(KeystoreError::InvalidKeyBytes { len: 5, .. })
        ));
    }

    #[test]
    fn test_migrate_moves_all_keys() {
        let custodian = KeyCustodian::new(MemoryKeyring::new());
        custodian.save("a", &key(1), false).unwrap();
        custodian.save("b", &key(2), false).unwrap();
        custodian.save("c", &key(3), false).unwrap();

        let report = custodian.migrate(true).unwrap();
        assert_eq!(
            report,
            MigrationReport {
                migrated: 3,
                skipped: 0
            }
        );

        // Keys still resolve afterwards
        assert_eq!(custodian.retrieve("b").unwrap().as_bytes(), &[2; 32]);
        assert_eq!(custodian.list_ids().unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_migrate_skips_already_correct() {
        let custodian = KeyCustodian::new(MemoryKeyring::new());
        custodian.save("a", &key(1), true).unwrap();
        custodian.save("b", &key(2), false).unwrap();

        let report = custodian.migrate(true).unwrap();
        assert_eq!(
            report,
            MigrationReport {
                migrated: 1,
                skipped: 1
            }
        );
    }

    #[test]
    fn test_migrate_converges() {
        let custodian = KeyCustodian::new(MemoryKeyring::new());
        custodian.save("a", &key(1), false).unwrap();
        custodian.save("b", &key(2), false).unwrap();

        custodian.migrate(true).unwrap();
        let second = custodian.migrate(true).unwrap();
        assert_eq!(
            second,
            MigrationReport {
                migrated: 0,
                skipped: 2
            }
        );
    }

    #[test]
    fn test_backup_password_roundtrip() {
        let custodian = KeyCustodian::new(MemoryKeyring::new());
        assert!(!custodian.has_backup_password().unwrap());
        assert!(custodian.load_backup_password().unwrap().is_none());

        let password = SecretString::from("correct horse".to_string());
        custodian.save_backup_password(&password, false).unwrap();

        assert!(custodian.has_backup_password().unwrap());
        let loaded = custodian.load_backup_password().unwrap().unwrap();
        assert_eq!(loaded.expose_secret(), "correct horse");

        custodian.delete_backup_password().unwrap();
        assert!(!custodian.has_backup_password().unwrap());
    }

    #[test]
    fn test_backup_password_rides_along_in_migration() {
        let custodian = KeyCustodian::new(MemoryKeyring::new());
        custodian.save("a", &key(1), false).unwrap();
        custodian
            .save_backup_password(&SecretString::from("pw".to_string()), false)
            .unwrap();

        assert!(custodian
            .list_ids()
            .unwrap()
            .contains(&BACKUP_PASSWORD_ID.to_string()));

        let report = custodian.migrate(true).unwrap();
        assert_eq!(report.migrated, 2);

        let loaded = custodian.load_backup_password().unwrap().unwrap();
        assert_eq!(loaded.expose_secret(), "pw");
    }

    // Backend whose writes fail for one id, to exercise the partial-failure
    // path.
    struct FlakyKeyring {
        inner: MemoryKeyring,
        fail_put_for: String,
    }

    impl KeyringBackend for FlakyKeyring {
        fn put(&self, id: &str, sync: bool, bytes: &[u8]) -> Result<(), KeystoreError> {
            if id == self.fail_put_for {
                return Err(KeystoreError::Backend("simulated put failure".to_string()));
            }
            self.inner.put(id, sync, bytes)
        }
        fn get(&self, id: &str, sync: bool) -> Result<Option<Vec<u8>>, KeystoreError> {
            self.inner.get(id, sync)
        }
        fn remove(&self, id: &str, sync: bool) -> Result<bool, KeystoreError> {
            self.inner.remove(id, sync)
        }
        fn ids(&self, sync: bool) -> Result<Vec<String>, KeystoreError> {
            self.inner.ids(sync)
        }
    }

    #[test]
    fn test_migrate_reports_partial_failure() {
        let inner = MemoryKeyring::new();
        inner.put("a", false, &[1; 32]).unwrap();
        inner.put("b", false, &[2; 32]).unwrap();
        let custodian = KeyCustodian::new(FlakyKeyring {
            inner,
            fail_put_for: "b".to_string(),
        });

        match custodian.migrate(true) {
            Err(KeystoreError::PartialMigrationFailure { failed, total }) => {
                assert_eq!(failed, 1);
                assert_eq!(total, 2);
            }
            other => panic!("expected partial failure, got {other:?}"),
        }

        // The healthy key moved; the failed one was cleared before the
        // write and is gone.
        assert_eq!(custodian.retrieve("a").unwrap().as_bytes(), &[1; 32]);
        assert!(matches!(
            custodian.retrieve("b"),
            Err(KeystoreError::KeyNotFound(_))
        ));
    }
}
