use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level seedlock configuration (loaded from the user's config.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SlkConfig {
    pub keystore: KeystoreConfig,
    pub backup: BackupConfig,
    pub vault: VaultConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeystoreConfig {
    /// Keyring service namespace for phrase keys (default: seedlock)
    pub service: String,
    /// Store new keys with the synchronizable attribute
    pub sync_enabled: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BackupConfig {
    /// Device label stamped into backup containers (defaults to hostname)
    pub device_name: Option<String>,
    /// Directory for backup files (default: $XDG_DATA_HOME/seedlock/backups)
    pub dir: Option<PathBuf>,
    /// Whether `backup auto` is allowed to run
    pub auto_enabled: bool,
    /// Minimum seconds between automatic backups (default: 7 days)
    pub auto_interval_secs: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    /// Vault file path (default: $XDG_DATA_HOME/seedlock/vault.json)
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level (default: info)
    pub level: String,
    /// Log format: "json" or "text"
    pub format: String,
}

impl Default for KeystoreConfig {
    fn default() -> Self {
        Self {
            service: "seedlock".into(),
            sync_enabled: false,
        }
    }
}

impl BackupConfig {
    /// Seven days, matching the stock auto-backup cadence.
    pub const DEFAULT_AUTO_INTERVAL_SECS: u64 = 7 * 86_400;
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

impl SlkConfig {
    /// Auto-backup interval with the 7-day fallback applied.
    pub fn auto_interval_secs(&self) -> u64 {
        if self.backup.auto_interval_secs > 0 {
            self.backup.auto_interval_secs
        } else {
            BackupConfig::DEFAULT_AUTO_INTERVAL_SECS
        }
    }
}
