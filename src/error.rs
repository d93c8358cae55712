//! Error types for the notevault engines
//!
//! All errors use thiserror for structured error handling.
//! Every mutating operation returns `Result<T>`; pure reads degrade to
//! empty results instead of surfacing storage failures.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Backup not found: {0}")]
    BackupNotFound(String),

    #[error("Version not found: {0}")]
    VersionNotFound(String),

    #[error("Invalid backup file: {0}")]
    InvalidBackup(String),

    #[error("Unknown export format: {0}")]
    InvalidFormat(String),
}

pub type Result<T> = std::result::Result<T, AppError>;
