//! File-backed key-value store
//!
//! Mirrors the browser localStorage contract: one JSON document per fixed
//! string key, replaced wholesale on every write. Keys map to files under a
//! single root directory ("backups" is stored at "<root>/backups.json").
//!
//! Writes go through a temp file and rename so a key is always either its
//! previous document or its new one, never a partial write. Single-writer:
//! concurrent processes sharing a root are last-write-wins.

use crate::error::{AppError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

#[derive(Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    /// Create a store rooted at the given directory
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Initialize the store (create the root directory if needed)
    pub async fn initialize(&self) -> Result<()> {
        fs::create_dir_all(&self.root).await?;
        tracing::info!("Local store initialized at: {:?}", self.root);
        Ok(())
    }

    /// Read and deserialize the document under `key`.
    ///
    /// A missing key is `None`; a present but unparsable document is a
    /// `Storage` error for the caller to degrade on.
    pub async fn read<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let path = self.path_for(key);

        if !path.exists() {
            return Ok(None);
        }

        let bytes = fs::read(&path).await?;
        let value = serde_json::from_slice(&bytes)
            .map_err(|e| AppError::Storage(format!("corrupt entry `{}`: {}", key, e)))?;

        tracing::debug!("Read key {} ({} bytes)", key, bytes.len());

        Ok(Some(value))
    }

    /// Serialize `value` and replace the document under `key` atomically
    pub async fn write<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec(value)?;
        let path = self.path_for(key);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        // Write to temp file first (atomic replace)
        let temp_path = path.with_extension("json.tmp");
        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(&bytes).await?;
        file.sync_all().await?;
        fs::rename(&temp_path, &path).await?;

        tracing::debug!("Wrote key {} ({} bytes)", key, bytes.len());

        Ok(())
    }

    /// Remove the document under `key`; removing an absent key is a no-op
    pub async fn remove(&self, key: &str) -> Result<()> {
        let path = self.path_for(key);

        if !path.exists() {
            return Ok(());
        }

        fs::remove_file(&path).await?;
        tracing::debug!("Removed key {}", key);

        Ok(())
    }

    /// Check whether a document exists under `key`
    pub async fn exists(&self, key: &str) -> bool {
        self.path_for(key).exists()
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.json", key))
    }

    /// Store root directory
    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn create_test_store() -> (LocalStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = LocalStore::new(temp_dir.path().join("store"));
        store.initialize().await.unwrap();
        (store, temp_dir)
    }

    #[tokio::test]
    async fn test_write_and_read() {
        let (store, _temp) = create_test_store().await;

        store.write("numbers", &vec![1, 2, 3]).await.unwrap();

        let read: Option<Vec<i32>> = store.read("numbers").await.unwrap();
        assert_eq!(read, Some(vec![1, 2, 3]));
    }

    #[tokio::test]
    async fn test_missing_key_is_none() {
        let (store, _temp) = create_test_store().await;

        let read: Option<Vec<i32>> = store.read("absent").await.unwrap();
        assert!(read.is_none());
    }

    #[tokio::test]
    async fn test_write_replaces_document() {
        let (store, _temp) = create_test_store().await;

        store.write("value", &"first").await.unwrap();
        store.write("value", &"second").await.unwrap();

        let read: Option<String> = store.read("value").await.unwrap();
        assert_eq!(read.as_deref(), Some("second"));
    }

    #[tokio::test]
    async fn test_remove() {
        let (store, _temp) = create_test_store().await;

        store.write("value", &42).await.unwrap();
        assert!(store.exists("value").await);

        store.remove("value").await.unwrap();
        assert!(!store.exists("value").await);

        // Removing again is a no-op
        store.remove("value").await.unwrap();
    }

    #[tokio::test]
    async fn test_corrupt_document_is_storage_error() {
        let (store, _temp) = create_test_store().await;

        tokio::fs::write(store.root().join("broken.json"), b"{not json")
            .await
            .unwrap();

        let result: Result<Option<Vec<i32>>> = store.read("broken").await;
        assert!(matches!(result, Err(AppError::Storage(_))));
    }

    #[tokio::test]
    async fn test_no_temp_file_left_behind() {
        let (store, _temp) = create_test_store().await;

        store.write("value", &"data").await.unwrap();

        assert!(store.root().join("value.json").exists());
        assert!(!store.root().join("value.json.tmp").exists());
    }
}
