//! End-to-end tests exercising both engines over a shared store

use std::sync::{Arc, Mutex};

use tempfile::TempDir;

use notevault::models::{
    BackupSettingsUpdate, ChangeType, ExportFormat, Note, NoteSource, VersionHistorySettingsUpdate,
};
use notevault::{BackupEngine, LocalStore, VersionHistoryEngine};

/// In-memory note collection standing in for the live app
struct SharedNotes(Mutex<Vec<Note>>);

impl SharedNotes {
    fn new(notes: Vec<Note>) -> Arc<Self> {
        Arc::new(Self(Mutex::new(notes)))
    }

    fn set(&self, notes: Vec<Note>) {
        *self.0.lock().unwrap() = notes;
    }
}

impl NoteSource for SharedNotes {
    fn snapshot(&self) -> Vec<Note> {
        self.0.lock().unwrap().clone()
    }
}

async fn setup() -> (LocalStore, Arc<SharedNotes>, TempDir) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();

    let temp_dir = TempDir::new().unwrap();
    let store = LocalStore::new(temp_dir.path().join("store"));
    store.initialize().await.unwrap();

    let notes = SharedNotes::new(vec![
        Note::new("n1", "Shopping", "milk, eggs"),
        Note::new("n2", "Ideas", "note-taking app"),
        Note::new("n3", "Journal", "a quiet day"),
    ]);

    (store, notes, temp_dir)
}

#[tokio::test]
async fn test_backup_survives_live_deletion() {
    let (store, notes, _temp) = setup().await;

    let engine = BackupEngine::new(store, notes.clone());
    engine.init().await.unwrap();
    engine.stop_auto_backup().await;

    let created = engine
        .create_manual_backup(&notes.snapshot(), None)
        .await
        .unwrap();
    assert_eq!(created.note_count, 3);

    // Delete everything from the live collection
    notes.set(Vec::new());
    assert!(notes.snapshot().is_empty());

    // The snapshot is untouched and fully recoverable
    let restored = engine.restore_from_backup(&created.backup_id).await.unwrap();
    assert_eq!(restored.notes.len(), 3);
    assert_eq!(restored.notes[0].id, "n1");
    assert_eq!(restored.notes[2].content, "a quiet day");

    engine.shutdown().await;
}

#[tokio::test]
async fn test_export_import_across_stores() {
    let (store, notes, temp) = setup().await;
    let export_dir = temp.path().join("exports");

    let engine = BackupEngine::new(store, notes.clone());
    let created = engine
        .create_manual_backup(&notes.snapshot(), Some("user-1"))
        .await
        .unwrap();

    let receipt = engine
        .export_backup(&created.backup_id, ExportFormat::Json, &export_dir)
        .await
        .unwrap();

    // Bring the export into a completely separate installation
    let other_temp = TempDir::new().unwrap();
    let other_store = LocalStore::new(other_temp.path().join("store"));
    other_store.initialize().await.unwrap();
    let other = BackupEngine::new(other_store, SharedNotes::new(Vec::new()));

    let imported = other.import_backup(&receipt.path).await.unwrap();
    assert_eq!(imported.backup_id, created.backup_id);
    assert_eq!(imported.note_count, 3);

    let copy = other.backup(&created.backup_id).await.unwrap();
    assert_eq!(copy.user_id, "user-1");
    assert_eq!(copy.notes, notes.snapshot());
}

#[tokio::test]
async fn test_auto_backup_fires_and_stops() {
    let (store, notes, _temp) = setup().await;

    let engine = BackupEngine::new(store, notes.clone());

    engine
        .update_settings(BackupSettingsUpdate {
            auto_backup_enabled: Some(true),
            backup_interval_ms: Some(50),
            ..Default::default()
        })
        .await
        .unwrap();

    tokio::time::sleep(tokio::time::Duration::from_millis(200)).await;

    let fired = engine.all_backups().await.len();
    assert!(fired >= 1, "timer should have produced at least one backup");

    let latest = engine.latest_backup().await.unwrap();
    assert_eq!(latest.metadata.note_count, 3);
    assert_eq!(latest.user_id, "anonymous");

    // Disabling stops future firings
    engine
        .update_settings(BackupSettingsUpdate {
            auto_backup_enabled: Some(false),
            ..Default::default()
        })
        .await
        .unwrap();

    let after_stop = engine.all_backups().await.len();
    tokio::time::sleep(tokio::time::Duration::from_millis(150)).await;
    assert_eq!(engine.all_backups().await.len(), after_stop);

    engine.shutdown().await;
}

#[tokio::test]
async fn test_version_restore_workflow() {
    let (store, _notes, _temp) = setup().await;

    let engine = VersionHistoryEngine::new(store);
    engine
        .update_settings(VersionHistorySettingsUpdate {
            auto_save_enabled: Some(false),
            ..Default::default()
        })
        .await
        .unwrap();

    // A note goes through create and two edits
    let mut note = Note::new("n1", "Draft", "v1");
    engine
        .create_version(&note, ChangeType::Create, "Initial save")
        .await
        .unwrap();

    tokio::time::sleep(tokio::time::Duration::from_millis(5)).await;
    note.content = "v2".to_string();
    let second = engine
        .create_version(&note, ChangeType::Edit, "")
        .await
        .unwrap();

    tokio::time::sleep(tokio::time::Duration::from_millis(5)).await;
    note.content = "v3".to_string();
    engine
        .create_version(&note, ChangeType::Edit, "")
        .await
        .unwrap();

    // Roll the note back to the middle state
    let restored = engine
        .restore_to_version("n1", &second.version_id)
        .await
        .unwrap();
    assert_eq!(restored.note.content, "v2");

    // The rollback itself is recorded, nothing was rewritten
    let versions = engine.note_history("n1").await;
    assert_eq!(versions.len(), 4);
    assert_eq!(versions[0].change_type, ChangeType::Restore);
    assert_eq!(versions[3].data.content, "v1");

    // Applying the restored payload and saving again continues the log
    note.content = restored.note.content;
    engine
        .create_version(&note, ChangeType::Edit, "Continued after restore")
        .await
        .unwrap();
    assert_eq!(engine.note_history("n1").await.len(), 5);

    engine.shutdown().await;
}

#[tokio::test]
async fn test_engines_share_a_store_without_interference() {
    let (store, notes, _temp) = setup().await;

    let backups = BackupEngine::new(store.clone(), notes.clone());
    let history = VersionHistoryEngine::new(store.clone());

    backups
        .create_manual_backup(&notes.snapshot(), None)
        .await
        .unwrap();
    history
        .create_version(&notes.snapshot()[0], ChangeType::Create, "")
        .await
        .unwrap();

    assert_eq!(backups.all_backups().await.len(), 1);
    assert_eq!(history.note_history("n1").await.len(), 1);

    // Clearing one engine's namespace leaves the other intact
    backups.clear_all_backups().await.unwrap();
    assert!(backups.all_backups().await.is_empty());
    assert_eq!(history.note_history("n1").await.len(), 1);

    history.clear_all_history().await.unwrap();
    assert!(history.all_history().await.is_empty());
}

#[tokio::test]
async fn test_state_survives_process_restart() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("store");

    let backup_id;
    {
        let store = LocalStore::new(root.clone());
        store.initialize().await.unwrap();

        let notes = SharedNotes::new(vec![Note::new("n1", "Persistent", "survives restarts")]);
        let backups = BackupEngine::new(store.clone(), notes.clone());
        let history = VersionHistoryEngine::new(store);

        backup_id = backups
            .create_manual_backup(&notes.snapshot(), None)
            .await
            .unwrap()
            .backup_id;
        history
            .create_version(&notes.snapshot()[0], ChangeType::Create, "")
            .await
            .unwrap();

        backups.shutdown().await;
        history.shutdown().await;
    }

    // Fresh engines over the same root see everything
    let store = LocalStore::new(root);
    store.initialize().await.unwrap();

    let backups = BackupEngine::new(store.clone(), SharedNotes::new(Vec::new()));
    backups.init().await.unwrap();
    backups.stop_auto_backup().await;
    let history = VersionHistoryEngine::new(store);
    history.init().await.unwrap();
    history.stop_auto_save().await;

    let restored = backups.restore_from_backup(&backup_id).await.unwrap();
    assert_eq!(restored.notes[0].title, "Persistent");
    assert!(backups.last_backup_time().await.is_some());

    let versions = history.note_history("n1").await;
    assert_eq!(versions.len(), 1);
    assert_eq!(versions[0].data.content, "survives restarts");
}
