//! Version history engine
//!
//! Maintains an append-only change log per note: every save becomes an
//! immutable version record, kept newest-first and capped per note. History
//! is never rewritten, only grown and trimmed from the tail; a restore
//! appends a new "restore" version instead of mutating the log.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, OnceLock};

use tokio::fs;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;

use crate::config;
use crate::error::{AppError, Result};
use crate::models::{
    ChangeType, ExportFormat, ExportReceipt, FieldChange, HistoryStats, Note, NoteHistory,
    NoteVersionStats, RestoredNote, RestoredVersion, VersionChanges, VersionComparison,
    VersionCreated, VersionData, VersionHistorySettings, VersionHistorySettingsUpdate,
    VersionRecord, VersionStats, VersionSummary,
};
use crate::storage::LocalStore;
use crate::util;

/// Diagnostic tag stamped on every version record
const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

#[derive(Clone)]
pub struct VersionHistoryEngine {
    store: LocalStore,
    settings: Arc<RwLock<VersionHistorySettings>>,
    timer: Arc<Mutex<Option<JoinHandle<()>>>>,
    session_id: Arc<OnceLock<String>>,
}

impl VersionHistoryEngine {
    pub fn new(store: LocalStore) -> Self {
        Self {
            store,
            settings: Arc::new(RwLock::new(VersionHistorySettings::default())),
            timer: Arc::new(Mutex::new(None)),
            session_id: Arc::new(OnceLock::new()),
        }
    }

    /// Load persisted settings and start the auto-save timer if enabled.
    /// Idempotent; safe to call repeatedly.
    pub async fn init(&self) -> Result<()> {
        let settings = match self.store.read(config::VERSION_SETTINGS_KEY).await {
            Ok(Some(settings)) => settings,
            Ok(None) => VersionHistorySettings::default(),
            Err(e) => {
                tracing::warn!("Failed to load version settings, using defaults: {}", e);
                VersionHistorySettings::default()
            }
        };
        *self.settings.write().await = settings.clone();

        if settings.auto_save_enabled {
            self.start_auto_save().await;
        }

        Ok(())
    }

    /// Current settings
    pub async fn settings(&self) -> VersionHistorySettings {
        self.settings.read().await.clone()
    }

    /// Session tag generated once per engine instance, diagnostic only
    pub fn session_id(&self) -> String {
        self.session_id
            .get_or_init(|| util::generate_id("session"))
            .clone()
    }

    /// Append a version capturing `note`'s current fields, then prune the
    /// note's log to the retention cap
    pub async fn create_version(
        &self,
        note: &Note,
        change_type: ChangeType,
        change_description: &str,
    ) -> Result<VersionCreated> {
        let data = VersionData {
            title: note.title.clone(),
            content: note.content.clone(),
            color: note.color.clone(),
            metadata: note.metadata.clone().unwrap_or_default(),
        };

        self.append_version(&note.id, data, change_type, change_description)
            .await
    }

    async fn append_version(
        &self,
        note_id: &str,
        data: VersionData,
        change_type: ChangeType,
        change_description: &str,
    ) -> Result<VersionCreated> {
        let version = VersionRecord {
            id: util::generate_id("version"),
            note_id: note_id.to_string(),
            timestamp: util::now_ms(),
            change_type,
            change_description: change_description.to_string(),
            data,
            user_agent: USER_AGENT.to_string(),
            session_id: self.session_id(),
        };

        let version_id = version.id.clone();
        let timestamp = version.timestamp;

        self.save_version(version).await?;
        self.cleanup_old_versions(note_id).await?;

        tracing::debug!("Version created for note {}: {}", note_id, change_type);

        Ok(VersionCreated {
            version_id,
            timestamp,
        })
    }

    async fn save_version(&self, version: VersionRecord) -> Result<()> {
        let mut history = self.all_history().await;
        let now = util::now_ms();

        match history.iter_mut().find(|h| h.note_id == version.note_id) {
            Some(entry) => {
                entry.versions.push(version);
                // Stable sort keeps insertion order among equal timestamps
                entry.versions.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
                entry.last_modified = now;
            }
            None => {
                history.push(NoteHistory {
                    note_id: version.note_id.clone(),
                    versions: vec![version],
                    created_at: now,
                    last_modified: now,
                });
            }
        }

        self.store.write(config::VERSION_HISTORY_KEY, &history).await
    }

    /// The entire history store. Degrades to empty on a storage-read failure.
    pub async fn all_history(&self) -> Vec<NoteHistory> {
        match self.store.read(config::VERSION_HISTORY_KEY).await {
            Ok(Some(history)) => history,
            Ok(None) => Vec::new(),
            Err(e) => {
                tracing::warn!("Failed to load version history: {}", e);
                Vec::new()
            }
        }
    }

    /// All versions of one note, newest-first; empty if the note has no log
    pub async fn note_history(&self, note_id: &str) -> Vec<VersionRecord> {
        self.all_history()
            .await
            .into_iter()
            .find(|h| h.note_id == note_id)
            .map(|h| h.versions)
            .unwrap_or_default()
    }

    /// Look up one version by id
    pub async fn version(&self, note_id: &str, version_id: &str) -> Option<VersionRecord> {
        self.note_history(note_id)
            .await
            .into_iter()
            .find(|v| v.id == version_id)
    }

    /// The most recent version of a note, if any
    pub async fn latest_version(&self, note_id: &str) -> Option<VersionRecord> {
        self.note_history(note_id).await.into_iter().next()
    }

    /// The version whose timestamp is nearest `timestamp` by absolute
    /// difference. On a tie the first match in the stored newest-first
    /// order wins.
    pub async fn version_by_timestamp(
        &self,
        note_id: &str,
        timestamp: i64,
    ) -> Option<VersionRecord> {
        let versions = self.note_history(note_id).await;

        let mut best: Option<&VersionRecord> = None;
        let mut best_diff = i64::MAX;

        for version in &versions {
            let diff = (version.timestamp - timestamp).abs();
            if diff < best_diff {
                best_diff = diff;
                best = Some(version);
            }
        }

        best.cloned()
    }

    /// Whether `note` differs from its latest stored version.
    ///
    /// A note with no history counts as changed; callers use this to decide
    /// when to capture a version.
    pub async fn note_changed(&self, note: &Note) -> bool {
        match self.latest_version(&note.id).await {
            Some(latest) => {
                latest.data.title != note.title
                    || latest.data.content != note.content
                    || latest.data.color != note.color
                    || latest.data.metadata != note.metadata.clone().unwrap_or_default()
            }
            None => true,
        }
    }

    /// Reconstruct the note payload held by `version_id` and append a new
    /// "restore" version recording the action.
    ///
    /// The payload is returned to the caller for application; the engine
    /// never writes the live note itself.
    pub async fn restore_to_version(
        &self,
        note_id: &str,
        version_id: &str,
    ) -> Result<RestoredVersion> {
        let version = self
            .version(note_id, version_id)
            .await
            .ok_or_else(|| AppError::VersionNotFound(version_id.to_string()))?;

        let created = self
            .append_version(
                note_id,
                version.data.clone(),
                ChangeType::Restore,
                &format!("Restored from version {}", version_id),
            )
            .await?;

        tracing::info!("Note {} restored to version {}", note_id, version_id);

        Ok(RestoredVersion {
            note: RestoredNote {
                id: note_id.to_string(),
                title: version.data.title,
                content: version.data.content,
                color: version.data.color,
                metadata: version.data.metadata,
            },
            version_id: version_id.to_string(),
            timestamp: created.timestamp,
        })
    }

    /// Per-field diff between two versions of the same note
    pub async fn compare_versions(
        &self,
        note_id: &str,
        version_id1: &str,
        version_id2: &str,
    ) -> Result<VersionComparison> {
        let v1 = self
            .version(note_id, version_id1)
            .await
            .ok_or_else(|| AppError::VersionNotFound(version_id1.to_string()))?;
        let v2 = self
            .version(note_id, version_id2)
            .await
            .ok_or_else(|| AppError::VersionNotFound(version_id2.to_string()))?;

        let changes = VersionChanges {
            title: FieldChange::diff(v1.data.title.clone(), v2.data.title.clone()),
            content: FieldChange::diff(v1.data.content.clone(), v2.data.content.clone()),
            color: FieldChange::diff(v1.data.color.clone(), v2.data.color.clone()),
            metadata: FieldChange::diff(v1.data.metadata.clone(), v2.data.metadata.clone()),
        };

        let has_changes = changes.title.changed
            || changes.content.changed
            || changes.color.changed
            || changes.metadata.changed;

        Ok(VersionComparison {
            version1: VersionSummary::from(&v1),
            version2: VersionSummary::from(&v2),
            changes,
            has_changes,
            time_diff: (v2.timestamp - v1.timestamp).abs(),
        })
    }

    /// Export one note's version list, or the entire history store, into
    /// `dest_dir` as pretty JSON or a plain-text report
    pub async fn export_history(
        &self,
        note_id: Option<&str>,
        format: ExportFormat,
        dest_dir: &Path,
    ) -> Result<ExportReceipt> {
        let content = match (note_id, format) {
            (Some(id), ExportFormat::Json) => {
                serde_json::to_string_pretty(&self.note_history(id).await)?
            }
            (None, ExportFormat::Json) => serde_json::to_string_pretty(&self.all_history().await)?,
            (Some(id), ExportFormat::Txt) => {
                render_note_report(id, &self.note_history(id).await)
            }
            (None, ExportFormat::Txt) => render_overall_report(&self.all_history().await),
        };

        let file_name = format!(
            "{}_version_history_{}_{}.{}",
            config::EXPORT_FILE_PREFIX,
            note_id.unwrap_or("all"),
            util::date_stamp(util::now_ms()),
            format.extension()
        );

        fs::create_dir_all(dest_dir).await?;
        let path = dest_dir.join(&file_name);
        fs::write(&path, content).await?;

        tracing::info!(
            "Exported version history ({}) to {:?}",
            note_id.unwrap_or("all"),
            path
        );

        Ok(ExportReceipt {
            file_name,
            path,
            format,
        })
    }

    /// Tail-drop one note's log beyond the retention cap
    pub async fn cleanup_old_versions(&self, note_id: &str) -> Result<()> {
        let max_versions = self.settings.read().await.max_versions_per_note;

        let mut history = self.all_history().await;
        let Some(entry) = history.iter_mut().find(|h| h.note_id == note_id) else {
            return Ok(());
        };

        if entry.versions.len() <= max_versions {
            return Ok(());
        }

        let dropped = entry.versions.len() - max_versions;
        entry.versions.truncate(max_versions);
        self.store.write(config::VERSION_HISTORY_KEY, &history).await?;

        tracing::debug!("Dropped {} old versions for note {}", dropped, note_id);

        Ok(())
    }

    /// Remove one note's entire log; removing an absent log is a no-op
    pub async fn delete_note_history(&self, note_id: &str) -> Result<()> {
        let history = self.all_history().await;
        let remaining: Vec<NoteHistory> = history
            .into_iter()
            .filter(|h| h.note_id != note_id)
            .collect();

        self.store
            .write(config::VERSION_HISTORY_KEY, &remaining)
            .await?;

        tracing::info!("Version history deleted for note {}", note_id);

        Ok(())
    }

    /// Remove the entire history store
    pub async fn clear_all_history(&self) -> Result<()> {
        self.store.remove(config::VERSION_HISTORY_KEY).await?;
        tracing::info!("All version history cleared");
        Ok(())
    }

    /// Aggregate statistics for one note, or across the whole store.
    ///
    /// `None` if `note_id` is given but has no log.
    pub async fn version_stats(&self, note_id: Option<&str>) -> Option<VersionStats> {
        let history = self.all_history().await;

        match note_id {
            Some(note_id) => {
                let entry = history.into_iter().find(|h| h.note_id == note_id)?;
                let versions = entry.versions;

                let mut change_types: BTreeMap<ChangeType, usize> = BTreeMap::new();
                for version in &versions {
                    *change_types.entry(version.change_type).or_default() += 1;
                }

                Some(VersionStats::Note(NoteVersionStats {
                    note_id: note_id.to_string(),
                    total_versions: versions.len(),
                    first_version: versions.last().map(|v| v.timestamp),
                    last_version: versions.first().map(|v| v.timestamp),
                    average_time_between_versions: average_gap_ms(&versions),
                    change_types,
                }))
            }
            None => {
                let total_notes = history.len();
                let total_versions: usize = history.iter().map(|h| h.versions.len()).sum();

                let mut change_types: BTreeMap<ChangeType, usize> = BTreeMap::new();
                for entry in &history {
                    for version in &entry.versions {
                        *change_types.entry(version.change_type).or_default() += 1;
                    }
                }

                let average_versions_per_note = if total_notes > 0 {
                    total_versions as f64 / total_notes as f64
                } else {
                    0.0
                };

                Some(VersionStats::Overall(HistoryStats {
                    total_notes,
                    total_versions,
                    change_types,
                    average_versions_per_note,
                }))
            }
        }
    }

    /// Merge the partial update, persist, and reconcile the auto-save timer
    pub async fn update_settings(
        &self,
        update: VersionHistorySettingsUpdate,
    ) -> Result<VersionHistorySettings> {
        let settings = {
            let mut guard = self.settings.write().await;
            guard.apply(&update);
            guard.clone()
        };

        self.store
            .write(config::VERSION_SETTINGS_KEY, &settings)
            .await?;

        if settings.auto_save_enabled {
            self.start_auto_save().await;
        } else {
            self.stop_auto_save().await;
        }

        Ok(settings)
    }

    /// Start (or restart) the auto-save interval task.
    ///
    /// The tick itself creates no versions: capture is event-driven through
    /// [`create_version`](Self::create_version) when callers detect a note
    /// change. The interval is advisory bookkeeping only.
    // TODO: product call pending on whether the tick should also snapshot
    // notes that changed since the last capture, or stay purely advisory.
    pub async fn start_auto_save(&self) {
        self.stop_auto_save().await;

        let settings = self.settings.read().await.clone();
        if !settings.auto_save_enabled {
            return;
        }

        let interval_ms = settings
            .auto_save_interval_ms
            .max(config::MIN_AUTO_SAVE_INTERVAL_MS);

        let handle = tokio::spawn(async move {
            let mut ticker =
                tokio::time::interval(tokio::time::Duration::from_millis(interval_ms));
            ticker.tick().await;

            loop {
                ticker.tick().await;
                tracing::trace!("Auto-save interval elapsed");
            }
        });

        *self.timer.lock().await = Some(handle);

        tracing::info!("Auto-save started with {}ms interval", interval_ms);
    }

    /// Cancel future auto-save ticks
    pub async fn stop_auto_save(&self) {
        if let Some(handle) = self.timer.lock().await.take() {
            handle.abort();
            tracing::info!("Auto-save stopped");
        }
    }

    /// Stop background work; the engine remains usable for direct calls
    pub async fn shutdown(&self) {
        self.stop_auto_save().await;
    }
}

/// Mean gap between consecutive versions of a newest-first list;
/// zero if fewer than two versions
fn average_gap_ms(versions: &[VersionRecord]) -> f64 {
    if versions.len() < 2 {
        return 0.0;
    }

    let total: i64 = versions
        .windows(2)
        .map(|pair| (pair[0].timestamp - pair[1].timestamp).abs())
        .sum();

    total as f64 / (versions.len() - 1) as f64
}

fn render_note_report(note_id: &str, versions: &[VersionRecord]) -> String {
    let mut text = String::new();

    text.push_str("Notevault Version History Report\n");
    text.push_str("================================\n\n");
    text.push_str(&format!("Note ID: {}\n", note_id));
    text.push_str(&format!("Total Versions: {}\n\n", versions.len()));

    text.push_str("Version Timeline:\n");
    text.push_str("=================\n");

    for (index, version) in versions.iter().enumerate() {
        let description = if version.change_description.is_empty() {
            "No description"
        } else {
            &version.change_description
        };

        text.push_str(&format!(
            "{}. {}\n",
            index + 1,
            util::format_timestamp(version.timestamp)
        ));
        text.push_str(&format!("   Type: {}\n", version.change_type));
        text.push_str(&format!("   Description: {}\n", description));
        text.push_str(&format!("   Version ID: {}\n\n", version.id));
    }

    text.push_str(&format!(
        "Report Generated: {}\n",
        util::format_timestamp(util::now_ms())
    ));

    text
}

fn render_overall_report(history: &[NoteHistory]) -> String {
    let total_versions: usize = history.iter().map(|h| h.versions.len()).sum();

    let mut text = String::new();

    text.push_str("Notevault Version History Report\n");
    text.push_str("================================\n\n");
    text.push_str(&format!("Total Notes: {}\n", history.len()));
    text.push_str(&format!("Total Versions: {}\n\n", total_versions));

    for (index, entry) in history.iter().enumerate() {
        text.push_str(&format!("Note {}: {}\n", index + 1, entry.note_id));
        text.push_str(&format!("Versions: {}\n", entry.versions.len()));
        text.push_str(&format!(
            "Created: {}\n",
            util::format_timestamp(entry.created_at)
        ));
        text.push_str(&format!(
            "Last Modified: {}\n\n",
            util::format_timestamp(entry.last_modified)
        ));
    }

    text.push_str(&format!(
        "Report Generated: {}\n",
        util::format_timestamp(util::now_ms())
    ));

    text
}
