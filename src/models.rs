//! Engine data models
//!
//! Serde structs for notes, backup records, version records and engine
//! settings. All persisted and interchange forms use camelCase field names
//! so exported JSON matches the documented formats.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config;
use crate::error::AppError;
use crate::util;

/// A note with rich text content, consumed by value.
///
/// Owned by the external note collection; the engines only snapshot it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: String,
    pub title: String,
    /// Serialized rich-text markup
    pub content: String,
    #[serde(default = "default_color")]
    pub color: String,
    /// Milliseconds since epoch
    pub created_at: i64,
    pub updated_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

fn default_color() -> String {
    "#ffffff".to_string()
}

impl Note {
    pub fn new(id: impl Into<String>, title: impl Into<String>, content: impl Into<String>) -> Self {
        let now = util::now_ms();
        Self {
            id: id.into(),
            title: title.into(),
            content: content.into(),
            color: default_color(),
            created_at: now,
            updated_at: now,
            metadata: None,
        }
    }
}

/// Contract for the out-of-scope note collection provider.
///
/// Consulted only by the automatic backup timer; every other operation
/// receives notes from the caller.
pub trait NoteSource: Send + Sync {
    /// Current ordered note list, snapshotted for a backup.
    fn snapshot(&self) -> Vec<Note>;
}

/// How a backup was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackupKind {
    Automatic,
    Manual,
}

impl fmt::Display for BackupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackupKind::Automatic => write!(f, "automatic"),
            BackupKind::Manual => write!(f, "manual"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupMetadata {
    pub note_count: usize,
    /// Serialized byte length of the notes array; display only
    pub total_size: usize,
    pub backup_type: BackupKind,
}

/// Immutable full snapshot of the note collection at a point in time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupRecord {
    pub id: String,
    pub timestamp: i64,
    pub user_id: String,
    pub notes: Vec<Note>,
    /// Producing application's version string
    pub version: String,
    pub metadata: BackupMetadata,
}

/// What kind of change produced a version record
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Create,
    Edit,
    Delete,
    Restore,
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeType::Create => write!(f, "create"),
            ChangeType::Edit => write!(f, "edit"),
            ChangeType::Delete => write!(f, "delete"),
            ChangeType::Restore => write!(f, "restore"),
        }
    }
}

/// Snapshot of one note's fields at version-capture time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionData {
    pub title: String,
    pub content: String,
    pub color: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// Immutable entry in a note's append-only change log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionRecord {
    pub id: String,
    /// Non-owning reference; the note may no longer exist
    pub note_id: String,
    pub timestamp: i64,
    pub change_type: ChangeType,
    pub change_description: String,
    pub data: VersionData,
    /// Diagnostic tag, non-semantic
    pub user_agent: String,
    /// Diagnostic tag, non-semantic
    pub session_id: String,
}

/// Per-note version log group as persisted in the history store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteHistory {
    pub note_id: String,
    /// Newest-first
    pub versions: Vec<VersionRecord>,
    pub created_at: i64,
    pub last_modified: i64,
}

// ===== Settings =====

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupSettings {
    #[serde(default = "default_true")]
    pub auto_backup_enabled: bool,
    #[serde(default = "default_backup_interval_ms")]
    pub backup_interval_ms: u64,
    #[serde(default = "default_max_backups")]
    pub max_backups: usize,
}

fn default_true() -> bool {
    true
}

fn default_backup_interval_ms() -> u64 {
    config::DEFAULT_BACKUP_INTERVAL_MS
}

fn default_max_backups() -> usize {
    config::DEFAULT_MAX_BACKUPS
}

impl Default for BackupSettings {
    fn default() -> Self {
        Self {
            auto_backup_enabled: true,
            backup_interval_ms: config::DEFAULT_BACKUP_INTERVAL_MS,
            max_backups: config::DEFAULT_MAX_BACKUPS,
        }
    }
}

/// Partial update for [`BackupSettings`]; `None` fields are left unchanged
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupSettingsUpdate {
    pub auto_backup_enabled: Option<bool>,
    pub backup_interval_ms: Option<u64>,
    pub max_backups: Option<usize>,
}

impl BackupSettings {
    pub fn apply(&mut self, update: &BackupSettingsUpdate) {
        if let Some(enabled) = update.auto_backup_enabled {
            self.auto_backup_enabled = enabled;
        }
        if let Some(interval) = update.backup_interval_ms {
            self.backup_interval_ms = interval;
        }
        if let Some(max) = update.max_backups {
            self.max_backups = max;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionHistorySettings {
    #[serde(default = "default_true")]
    pub auto_save_enabled: bool,
    #[serde(default = "default_auto_save_interval_ms")]
    pub auto_save_interval_ms: u64,
    #[serde(default = "default_max_versions_per_note")]
    pub max_versions_per_note: usize,
}

fn default_auto_save_interval_ms() -> u64 {
    config::DEFAULT_AUTO_SAVE_INTERVAL_MS
}

fn default_max_versions_per_note() -> usize {
    config::DEFAULT_MAX_VERSIONS_PER_NOTE
}

impl Default for VersionHistorySettings {
    fn default() -> Self {
        Self {
            auto_save_enabled: true,
            auto_save_interval_ms: config::DEFAULT_AUTO_SAVE_INTERVAL_MS,
            max_versions_per_note: config::DEFAULT_MAX_VERSIONS_PER_NOTE,
        }
    }
}

/// Partial update for [`VersionHistorySettings`]
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionHistorySettingsUpdate {
    pub auto_save_enabled: Option<bool>,
    pub auto_save_interval_ms: Option<u64>,
    pub max_versions_per_note: Option<usize>,
}

impl VersionHistorySettings {
    pub fn apply(&mut self, update: &VersionHistorySettingsUpdate) {
        if let Some(enabled) = update.auto_save_enabled {
            self.auto_save_enabled = enabled;
        }
        if let Some(interval) = update.auto_save_interval_ms {
            self.auto_save_interval_ms = interval;
        }
        if let Some(max) = update.max_versions_per_note {
            self.max_versions_per_note = max;
        }
    }
}

// ===== Operation results =====

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupCreated {
    pub backup_id: String,
    pub timestamp: i64,
    pub note_count: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupImported {
    pub backup_id: String,
    pub timestamp: i64,
    pub note_count: usize,
}

/// Restore payload; the caller is responsible for applying it to the
/// live note collection.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoredBackup {
    pub backup_id: String,
    pub notes: Vec<Note>,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupStats {
    pub total_backups: usize,
    pub total_size: usize,
    pub last_backup: Option<i64>,
    pub auto_backup_enabled: bool,
    pub next_backup_at: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionCreated {
    pub version_id: String,
    pub timestamp: i64,
}

/// Note payload reconstructed from a version record, returned to the
/// caller for application; the engine never writes it back itself.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoredNote {
    pub id: String,
    pub title: String,
    pub content: String,
    pub color: String,
    pub metadata: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoredVersion {
    pub note: RestoredNote,
    /// The version that was restored from
    pub version_id: String,
    pub timestamp: i64,
}

/// One field's diff in a version comparison
#[derive(Debug, Clone, Serialize)]
pub struct FieldChange<T> {
    pub changed: bool,
    pub old: T,
    pub new: T,
}

impl<T: PartialEq> FieldChange<T> {
    pub fn diff(old: T, new: T) -> Self {
        Self {
            changed: old != new,
            old,
            new,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionChanges {
    pub title: FieldChange<String>,
    pub content: FieldChange<String>,
    pub color: FieldChange<String>,
    pub metadata: FieldChange<Map<String, Value>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionSummary {
    pub id: String,
    pub timestamp: i64,
    pub change_type: ChangeType,
}

impl From<&VersionRecord> for VersionSummary {
    fn from(version: &VersionRecord) -> Self {
        Self {
            id: version.id.clone(),
            timestamp: version.timestamp,
            change_type: version.change_type,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionComparison {
    pub version1: VersionSummary,
    pub version2: VersionSummary,
    pub changes: VersionChanges,
    pub has_changes: bool,
    /// Absolute timestamp delta in milliseconds
    pub time_diff: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteVersionStats {
    pub note_id: String,
    pub total_versions: usize,
    /// Oldest retained version timestamp
    pub first_version: Option<i64>,
    pub last_version: Option<i64>,
    pub change_types: BTreeMap<ChangeType, usize>,
    pub average_time_between_versions: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryStats {
    pub total_notes: usize,
    pub total_versions: usize,
    pub change_types: BTreeMap<ChangeType, usize>,
    pub average_versions_per_note: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum VersionStats {
    Note(NoteVersionStats),
    Overall(HistoryStats),
}

// ===== Export =====

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Json,
    Txt,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Txt => "txt",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = AppError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "txt" | "text" => Ok(ExportFormat::Txt),
            other => Err(AppError::InvalidFormat(other.to_string())),
        }
    }
}

/// Outcome of an export: where the file landed
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportReceipt {
    pub file_name: String,
    pub path: PathBuf,
    pub format: ExportFormat,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backup_settings_defaults_match_config() {
        let settings = BackupSettings::default();
        assert!(settings.auto_backup_enabled);
        assert_eq!(settings.backup_interval_ms, 5 * 60 * 1000);
        assert_eq!(settings.max_backups, 10);
    }

    #[test]
    fn test_settings_partial_apply() {
        let mut settings = BackupSettings::default();
        settings.apply(&BackupSettingsUpdate {
            max_backups: Some(3),
            ..Default::default()
        });
        assert_eq!(settings.max_backups, 3);
        assert!(settings.auto_backup_enabled);
        assert_eq!(settings.backup_interval_ms, 5 * 60 * 1000);
    }

    #[test]
    fn test_records_serialize_camel_case() {
        let record = BackupRecord {
            id: "backup_1_abc".to_string(),
            timestamp: 1,
            user_id: "anonymous".to_string(),
            notes: vec![],
            version: "1.0.0".to_string(),
            metadata: BackupMetadata {
                note_count: 0,
                total_size: 2,
                backup_type: BackupKind::Manual,
            },
        };

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["userId"], "anonymous");
        assert_eq!(json["metadata"]["noteCount"], 0);
        assert_eq!(json["metadata"]["backupType"], "manual");
    }

    #[test]
    fn test_note_missing_color_defaults() {
        let note: Note = serde_json::from_value(serde_json::json!({
            "id": "n1",
            "title": "Title",
            "content": "Body",
            "createdAt": 1,
            "updatedAt": 2
        }))
        .unwrap();

        assert_eq!(note.color, "#ffffff");
        assert!(note.metadata.is_none());
    }

    #[test]
    fn test_export_format_from_str() {
        assert_eq!("json".parse::<ExportFormat>().unwrap(), ExportFormat::Json);
        assert_eq!("TXT".parse::<ExportFormat>().unwrap(), ExportFormat::Txt);
        assert!("csv".parse::<ExportFormat>().is_err());
    }

    #[test]
    fn test_field_change_diff() {
        let change = FieldChange::diff("a".to_string(), "b".to_string());
        assert!(change.changed);

        let same = FieldChange::diff("a".to_string(), "a".to_string());
        assert!(!same.changed);
    }
}
