//! Automatic backup scheduling.

/// Decide whether an automatic backup is due.
///
/// Never due when the feature is off. With no prior backup on record, due
/// immediately. Otherwise due once strictly more than `interval_secs` has
/// passed since `last_backup_at`.
pub fn should_auto_backup(
    auto_enabled: bool,
    last_backup_at: Option<u64>,
    now: u64,
    interval_secs: u64,
) -> bool {
    if !auto_enabled {
        return false;
    }
    match last_backup_at {
        None => true,
        Some(last) => now.saturating_sub(last) > interval_secs,
    }
}
