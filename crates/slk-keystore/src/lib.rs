//! Key custody for sealed phrases.
//!
//! Each record's content key lives in the platform keyring under the
//! record id, filed under exactly one of two sync policies (synchronized
//! to the account keyring or device-local). The custodian keeps that
//! single-copy invariant and can migrate the whole population between
//! policies when the setting flips.

pub mod backend;
pub mod custodian;

pub use backend::{KeyringBackend, MemoryKeyring, PlatformKeyring};
pub use custodian::{KeyCustodian, MigrationReport, BACKUP_PASSWORD_ID};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum KeystoreError {
    #[error("no key found for '{0}'")]
    KeyNotFound(String),
    #[error("keyring backend: {0}")]
    Backend(String),
    #[error("stored key for '{id}' has invalid length {len}")]
    InvalidKeyBytes { id: String, len: usize },
    #[error("migration failed for {failed} of {total} keys")]
    PartialMigrationFailure { failed: usize, total: usize },
}
