//! Password-protected backup and restore for seed records.
//!
//! A backup file is a JSON container of per-record entries. Each entry
//! carries the record's sealed phrase plus its content key wrapped under
//! a password-derived key, so a backup restores on a machine whose
//! keyring has never seen these records.

pub mod codec;
pub mod container;
pub mod schedule;

pub use codec::{build_backup, restore_backup, BuildOutcome, ItemFailure, RestoreOutcome};
pub use container::{
    backup_file_name, default_device_name, BackupContainer, BackupEntry, BackupError,
    BACKUP_EXTENSION, FORMAT_VERSION,
};
pub use schedule::should_auto_backup;
