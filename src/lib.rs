//! notevault
//!
//! Local durability engines for note-taking applications: point-in-time
//! backups of the full note collection and per-note version history, both
//! persisted to a file-backed key-value store.

pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod storage;
pub mod util;

pub use error::{AppError, Result};
pub use services::{BackupEngine, VersionHistoryEngine};
pub use storage::LocalStore;
