//! Engine configuration constants
//!
//! Central location for storage key names, retention defaults and
//! validation boundaries used throughout the engines.

// ===== Storage Keys =====

/// Backup engine settings blob
pub const BACKUP_SETTINGS_KEY: &str = "backup_settings";
/// Full retained backup set (newest-first array)
pub const BACKUPS_KEY: &str = "backups";
/// Timestamp (ms) of the most recent backup
pub const LAST_BACKUP_KEY: &str = "last_backup";
/// Version-history engine settings blob
pub const VERSION_SETTINGS_KEY: &str = "version_settings";
/// Per-note version logs (array of note history groups)
pub const VERSION_HISTORY_KEY: &str = "version_history";

// ===== Backup Engine Defaults =====

/// Retained backup count; oldest beyond this are dropped on cleanup
pub const DEFAULT_MAX_BACKUPS: usize = 10;

/// Automatic backup interval (5 minutes)
pub const DEFAULT_BACKUP_INTERVAL_MS: u64 = 5 * 60 * 1000;

/// Floor applied when starting the backup timer.
/// Values below this would hammer the store with whole-set rewrites.
pub const MIN_BACKUP_INTERVAL_MS: u64 = 10;

// ===== Version History Defaults =====

/// Retained versions per note; oldest beyond this are dropped on cleanup
pub const DEFAULT_MAX_VERSIONS_PER_NOTE: usize = 20;

/// Auto-save bookkeeping interval (30 seconds)
pub const DEFAULT_AUTO_SAVE_INTERVAL_MS: u64 = 30 * 1000;

/// Floor applied when starting the auto-save timer
pub const MIN_AUTO_SAVE_INTERVAL_MS: u64 = 10;

// ===== Records =====

/// Owner tag stamped on backups when the caller supplies none
pub const DEFAULT_USER_ID: &str = "anonymous";

/// Random base36 suffix length in generated record ids
pub const ID_SUFFIX_LEN: usize = 9;

// ===== Export =====

/// Prefix for exported file names
pub const EXPORT_FILE_PREFIX: &str = "notevault";

/// Character cap for note content previews in text reports
pub const TEXT_PREVIEW_LEN: usize = 100;
