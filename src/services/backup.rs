//! Backup engine
//!
//! Produces, stores, enumerates, exports/imports, restores and prunes full
//! point-in-time snapshots of the note collection. Records live newest-first
//! in one store key and are immutable once written; only deletion removes
//! them. Restore returns the snapshot to the caller and never touches the
//! live collection.

use std::path::Path;
use std::sync::Arc;

use serde_json::Value;
use tokio::fs;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;

use crate::config;
use crate::error::{AppError, Result};
use crate::models::{
    BackupCreated, BackupImported, BackupKind, BackupMetadata, BackupRecord, BackupSettings,
    BackupSettingsUpdate, BackupStats, ExportFormat, ExportReceipt, Note, NoteSource,
    RestoredBackup,
};
use crate::storage::LocalStore;
use crate::util;

#[derive(Clone)]
pub struct BackupEngine {
    store: LocalStore,
    source: Arc<dyn NoteSource>,
    settings: Arc<RwLock<BackupSettings>>,
    last_backup: Arc<RwLock<Option<i64>>>,
    timer: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl BackupEngine {
    /// Create an engine over `store`, backing up notes from `source` on the
    /// automatic timer. Call [`init`](Self::init) to load persisted state.
    pub fn new(store: LocalStore, source: Arc<dyn NoteSource>) -> Self {
        Self {
            store,
            source,
            settings: Arc::new(RwLock::new(BackupSettings::default())),
            last_backup: Arc::new(RwLock::new(None)),
            timer: Arc::new(Mutex::new(None)),
        }
    }

    /// Load persisted settings and last-backup time, then start the
    /// automatic timer if enabled. Idempotent; safe to call repeatedly.
    pub async fn init(&self) -> Result<()> {
        let settings = match self.store.read(config::BACKUP_SETTINGS_KEY).await {
            Ok(Some(settings)) => settings,
            Ok(None) => BackupSettings::default(),
            Err(e) => {
                tracing::warn!("Failed to load backup settings, using defaults: {}", e);
                BackupSettings::default()
            }
        };
        *self.settings.write().await = settings.clone();

        let last = match self.store.read(config::LAST_BACKUP_KEY).await {
            Ok(last) => last,
            Err(e) => {
                tracing::warn!("Failed to load last backup time: {}", e);
                None
            }
        };
        *self.last_backup.write().await = last;

        if settings.auto_backup_enabled {
            self.start_auto_backup().await;
        }

        Ok(())
    }

    /// Current settings
    pub async fn settings(&self) -> BackupSettings {
        self.settings.read().await.clone()
    }

    /// Timestamp (ms) of the most recent backup, if any
    pub async fn last_backup_time(&self) -> Option<i64> {
        *self.last_backup.read().await
    }

    /// Create an automatic backup and prune beyond the retention cap.
    ///
    /// An empty `notes` slice produces a valid zero-note backup.
    pub async fn create_backup(
        &self,
        notes: &[Note],
        user_id: Option<&str>,
    ) -> Result<BackupCreated> {
        let created = self.write_backup(notes, user_id, BackupKind::Automatic).await?;
        self.cleanup_old_backups().await?;
        Ok(created)
    }

    /// Create a manual backup.
    ///
    /// The manual path does not prune; the set may transiently exceed the
    /// cap until the next automatic insert.
    pub async fn create_manual_backup(
        &self,
        notes: &[Note],
        user_id: Option<&str>,
    ) -> Result<BackupCreated> {
        self.write_backup(notes, user_id, BackupKind::Manual).await
    }

    async fn write_backup(
        &self,
        notes: &[Note],
        user_id: Option<&str>,
        kind: BackupKind,
    ) -> Result<BackupCreated> {
        let record = BackupRecord {
            id: util::generate_id("backup"),
            timestamp: util::now_ms(),
            user_id: user_id.unwrap_or(config::DEFAULT_USER_ID).to_string(),
            notes: notes.to_vec(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            metadata: BackupMetadata {
                note_count: notes.len(),
                total_size: serde_json::to_string(notes)?.len(),
                backup_type: kind,
            },
        };

        self.save_backup(&record).await?;

        *self.last_backup.write().await = Some(record.timestamp);
        self.store
            .write(config::LAST_BACKUP_KEY, &record.timestamp)
            .await?;

        tracing::info!(
            "{} backup created: {} ({} notes)",
            kind,
            record.id,
            record.metadata.note_count
        );

        Ok(BackupCreated {
            backup_id: record.id,
            timestamp: record.timestamp,
            note_count: record.metadata.note_count,
        })
    }

    async fn save_backup(&self, record: &BackupRecord) -> Result<()> {
        let mut backups = self.all_backups().await;
        backups.push(record.clone());
        backups.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        self.store.write(config::BACKUPS_KEY, &backups).await
    }

    /// All retained backups, newest-first. Degrades to empty on a
    /// storage-read failure.
    pub async fn all_backups(&self) -> Vec<BackupRecord> {
        match self.store.read(config::BACKUPS_KEY).await {
            Ok(Some(backups)) => backups,
            Ok(None) => Vec::new(),
            Err(e) => {
                tracing::warn!("Failed to load backups: {}", e);
                Vec::new()
            }
        }
    }

    /// Look up one backup by id
    pub async fn backup(&self, backup_id: &str) -> Option<BackupRecord> {
        self.all_backups()
            .await
            .into_iter()
            .find(|b| b.id == backup_id)
    }

    /// The most recent backup, if any
    pub async fn latest_backup(&self) -> Option<BackupRecord> {
        self.all_backups().await.into_iter().next()
    }

    /// Return the notes snapshot held by `backup_id`.
    ///
    /// The caller applies the snapshot to the live collection; this engine
    /// never writes notes back itself.
    pub async fn restore_from_backup(&self, backup_id: &str) -> Result<RestoredBackup> {
        let backup = self
            .backup(backup_id)
            .await
            .ok_or_else(|| AppError::BackupNotFound(backup_id.to_string()))?;

        tracing::info!("Restoring from backup: {}", backup_id);

        Ok(RestoredBackup {
            backup_id: backup.id,
            notes: backup.notes,
            timestamp: backup.timestamp,
        })
    }

    /// Serialize one backup into `dest_dir` as pretty JSON or a plain-text
    /// report. Only the JSON form round-trips through import.
    pub async fn export_backup(
        &self,
        backup_id: &str,
        format: ExportFormat,
        dest_dir: &Path,
    ) -> Result<ExportReceipt> {
        let backup = self
            .backup(backup_id)
            .await
            .ok_or_else(|| AppError::BackupNotFound(backup_id.to_string()))?;

        let content = match format {
            ExportFormat::Json => serde_json::to_string_pretty(&backup)?,
            ExportFormat::Txt => render_backup_report(&backup),
        };

        let file_name = format!(
            "{}_backup_{}_{}.{}",
            config::EXPORT_FILE_PREFIX,
            backup.id,
            util::date_stamp(backup.timestamp),
            format.extension()
        );

        fs::create_dir_all(dest_dir).await?;
        let path = dest_dir.join(&file_name);
        fs::write(&path, content).await?;

        tracing::info!("Exported backup {} to {:?}", backup_id, path);

        Ok(ExportReceipt {
            file_name,
            path,
            format,
        })
    }

    /// Read, validate and persist a previously exported JSON backup.
    ///
    /// Validation checks `id`, `timestamp`, `notes` (array), `version` and
    /// `metadata` before any write. Import keeps the file's id; re-importing
    /// the same file is last-write-wins, no collision check.
    pub async fn import_backup(&self, path: &Path) -> Result<BackupImported> {
        let bytes = fs::read(path)
            .await
            .map_err(|e| AppError::InvalidBackup(format!("failed to read file: {}", e)))?;

        let value: Value = serde_json::from_slice(&bytes)
            .map_err(|e| AppError::InvalidBackup(format!("failed to parse backup file: {}", e)))?;

        validate_backup_value(&value)?;

        let record: BackupRecord = serde_json::from_value(value)
            .map_err(|e| AppError::InvalidBackup(format!("invalid backup file format: {}", e)))?;

        self.save_backup(&record).await?;

        tracing::info!("Imported backup: {}", record.id);

        Ok(BackupImported {
            backup_id: record.id,
            timestamp: record.timestamp,
            note_count: record.metadata.note_count,
        })
    }

    /// Truncate the retained set to `max_backups`, dropping the oldest
    pub async fn cleanup_old_backups(&self) -> Result<()> {
        let max_backups = self.settings.read().await.max_backups;

        let mut backups = self.all_backups().await;
        if backups.len() <= max_backups {
            return Ok(());
        }

        let dropped = backups.len() - max_backups;
        backups.truncate(max_backups);
        self.store.write(config::BACKUPS_KEY, &backups).await?;

        tracing::info!("Cleaned up {} old backups", dropped);

        Ok(())
    }

    /// Delete one backup; an unknown id is a reported error
    pub async fn delete_backup(&self, backup_id: &str) -> Result<()> {
        let backups = self.all_backups().await;
        let remaining: Vec<BackupRecord> = backups
            .iter()
            .filter(|b| b.id != backup_id)
            .cloned()
            .collect();

        if remaining.len() == backups.len() {
            return Err(AppError::BackupNotFound(backup_id.to_string()));
        }

        self.store.write(config::BACKUPS_KEY, &remaining).await?;

        tracing::info!("Backup deleted: {}", backup_id);

        Ok(())
    }

    /// Remove the entire backup set and the last-backup marker
    pub async fn clear_all_backups(&self) -> Result<()> {
        self.store.remove(config::BACKUPS_KEY).await?;
        self.store.remove(config::LAST_BACKUP_KEY).await?;
        *self.last_backup.write().await = None;

        tracing::info!("All backups cleared");

        Ok(())
    }

    /// Aggregate counts and sizes for display
    pub async fn backup_stats(&self) -> BackupStats {
        let backups = self.all_backups().await;
        let total_size = backups.iter().map(|b| b.metadata.total_size).sum();
        let settings = self.settings.read().await.clone();
        let last_backup = *self.last_backup.read().await;

        BackupStats {
            total_backups: backups.len(),
            total_size,
            last_backup,
            auto_backup_enabled: settings.auto_backup_enabled,
            next_backup_at: next_backup_at(&settings, last_backup),
        }
    }

    /// When the automatic timer is expected to fire next, if it is running
    /// and at least one backup exists
    pub async fn next_backup_at(&self) -> Option<i64> {
        let settings = self.settings.read().await.clone();
        let last_backup = *self.last_backup.read().await;
        next_backup_at(&settings, last_backup)
    }

    /// Merge the partial update, persist, and reconcile the timer with the
    /// new enabled flag and interval
    pub async fn update_settings(&self, update: BackupSettingsUpdate) -> Result<BackupSettings> {
        let settings = {
            let mut guard = self.settings.write().await;
            guard.apply(&update);
            guard.clone()
        };

        self.store
            .write(config::BACKUP_SETTINGS_KEY, &settings)
            .await?;

        if settings.auto_backup_enabled {
            self.start_auto_backup().await;
        } else {
            self.stop_auto_backup().await;
        }

        Ok(settings)
    }

    /// Start (or restart) the automatic backup task
    pub async fn start_auto_backup(&self) {
        self.stop_auto_backup().await;

        let settings = self.settings.read().await.clone();
        if !settings.auto_backup_enabled {
            return;
        }

        let interval_ms = settings.backup_interval_ms.max(config::MIN_BACKUP_INTERVAL_MS);
        let engine = self.clone();

        let handle = tokio::spawn(async move {
            let mut ticker =
                tokio::time::interval(tokio::time::Duration::from_millis(interval_ms));
            // The first tick completes immediately; consume it so the first
            // backup lands one full interval out.
            ticker.tick().await;

            loop {
                ticker.tick().await;

                let notes = engine.source.snapshot();
                if let Err(e) = engine.create_backup(&notes, None).await {
                    tracing::error!("Automatic backup failed: {}", e);
                }
            }
        });

        *self.timer.lock().await = Some(handle);

        tracing::info!("Auto backup started with {}ms interval", interval_ms);
    }

    /// Cancel future automatic firings; an in-flight write is not rolled back
    pub async fn stop_auto_backup(&self) {
        if let Some(handle) = self.timer.lock().await.take() {
            handle.abort();
            tracing::info!("Auto backup stopped");
        }
    }

    /// Stop background work; the engine remains usable for direct calls
    pub async fn shutdown(&self) {
        self.stop_auto_backup().await;
    }
}

fn next_backup_at(settings: &BackupSettings, last_backup: Option<i64>) -> Option<i64> {
    if !settings.auto_backup_enabled {
        return None;
    }
    last_backup.map(|last| last + settings.backup_interval_ms as i64)
}

fn validate_backup_value(value: &Value) -> Result<()> {
    let obj = value
        .as_object()
        .ok_or_else(|| AppError::InvalidBackup("not a JSON object".to_string()))?;

    for field in ["id", "timestamp", "version", "metadata"] {
        if !obj.contains_key(field) {
            return Err(AppError::InvalidBackup(format!("missing field `{}`", field)));
        }
    }

    match obj.get("notes") {
        Some(Value::Array(_)) => Ok(()),
        Some(_) => Err(AppError::InvalidBackup(
            "`notes` must be an array".to_string(),
        )),
        None => Err(AppError::InvalidBackup("missing field `notes`".to_string())),
    }
}

fn render_backup_report(backup: &BackupRecord) -> String {
    let mut text = String::new();

    text.push_str("Notevault Backup Report\n");
    text.push_str("=======================\n\n");
    text.push_str(&format!("Backup ID: {}\n", backup.id));
    text.push_str(&format!(
        "Created: {}\n",
        util::format_timestamp(backup.timestamp)
    ));
    text.push_str(&format!("User ID: {}\n", backup.user_id));
    text.push_str(&format!("Version: {}\n", backup.version));
    text.push_str(&format!("Note Count: {}\n", backup.metadata.note_count));
    text.push_str(&format!("Total Size: {} bytes\n\n", backup.metadata.total_size));

    text.push_str("Notes:\n");
    text.push_str("------\n");

    for (index, note) in backup.notes.iter().enumerate() {
        let title = if note.title.is_empty() {
            "Untitled"
        } else {
            &note.title
        };
        let preview: String = note.content.chars().take(config::TEXT_PREVIEW_LEN).collect();
        let ellipsis = if note.content.chars().count() > config::TEXT_PREVIEW_LEN {
            "..."
        } else {
            ""
        };

        text.push_str(&format!("{}. {}\n", index + 1, title));
        text.push_str(&format!(
            "   Created: {}\n",
            util::format_timestamp(note.created_at)
        ));
        text.push_str(&format!(
            "   Modified: {}\n",
            util::format_timestamp(note.updated_at)
        ));
        text.push_str(&format!("   Content: {}{}\n\n", preview, ellipsis));
    }

    text
}
