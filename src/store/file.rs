//! JSON file store.
//!
//! Holds every key in memory and rewrites the whole file after each mutation.
//! The file is a single JSON object mapping keys to payloads.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use super::Store;
use crate::error::StoreError;

// == File Store ==
/// Store persisted to a JSON file on disk.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    /// `None` until `ready()` has loaded the file
    entries: RwLock<Option<HashMap<String, String>>>,
}

impl FileStore {
    /// Creates a store for `path`. Nothing is read until `ready()`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: RwLock::new(None),
        }
    }

    async fn load(&self) -> Result<HashMap<String, String>, StoreError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) if contents.trim().is_empty() => Ok(HashMap::new()),
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(HashMap::new()),
            Err(err) => Err(err.into()),
        }
    }

    /// Writes to a sibling temp file then renames it over the target.
    async fn persist(&self, entries: &HashMap<String, String>) -> Result<(), StoreError> {
        let contents = serde_json::to_string(entries)?;
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, contents).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl Store for FileStore {
    async fn ready(&self) -> Result<(), StoreError> {
        let mut guard = self.entries.write().await;
        if guard.is_none() {
            let loaded = self.load().await?;
            debug!(path = %self.path.display(), keys = loaded.len(), "file store loaded");
            *guard = Some(loaded);
        }
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let guard = self.entries.read().await;
        let entries = guard.as_ref().ok_or(StoreError::NotReady)?;
        Ok(entries.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StoreError> {
        let mut guard = self.entries.write().await;
        let entries = guard.as_mut().ok_or(StoreError::NotReady)?;
        entries.insert(key.to_string(), value);
        self.persist(entries).await
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut guard = self.entries.write().await;
        let entries = guard.as_mut().ok_or(StoreError::NotReady)?;
        if entries.remove(key).is_some() {
            self.persist(entries).await?;
        }
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>, StoreError> {
        let guard = self.entries.read().await;
        let entries = guard.as_ref().ok_or(StoreError::NotReady)?;
        Ok(entries.keys().cloned().collect())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        let mut guard = self.entries.write().await;
        let entries = guard.as_mut().ok_or(StoreError::NotReady)?;
        entries.clear();
        self.persist(entries).await
    }
}
