pub mod config;
pub mod types;
pub mod vault;

pub use config::SlkConfig;
pub use types::{now_epoch, short_id, SeedRecord, SyncStatus};
pub use vault::Vault;
