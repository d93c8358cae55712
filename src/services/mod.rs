//! Services module
//!
//! The two durability engines. Each owns its own key namespace in the local
//! store and holds no shared state with the other.

pub mod backup;
pub mod version_history;

pub use backup::BackupEngine;
pub use version_history::VersionHistoryEngine;
