//! Durable persistence of the registry snapshot.
//!
//! The store holds one logical record: an ordered sequence of encoded
//! artifact descriptors. `save` replaces the whole record; merge semantics
//! live in the registry.

use std::sync::Mutex;

use async_trait::async_trait;
use thiserror::Error;

mod sqlite;

pub use sqlite::SqliteArtifactStore;

/// Key under which the registry snapshot is stored.
pub const REGISTRY_KEY: &str = "storage";

#[derive(Debug, Error)]
#[error("artifact store {operation} failed: {cause:#}")]
pub struct StorageError {
    pub operation: &'static str,
    pub cause: anyhow::Error,
}

impl StorageError {
    pub fn new(operation: &'static str, cause: impl Into<anyhow::Error>) -> Self {
        Self {
            operation,
            cause: cause.into(),
        }
    }
}

#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Entries of the last saved snapshot; empty when nothing was ever saved.
    async fn load(&self) -> Result<Vec<String>, StorageError>;

    /// Replace the stored snapshot with `entries`.
    async fn save(&self, entries: &[String]) -> Result<(), StorageError>;

    /// Reset the stored snapshot to empty.
    async fn clear(&self) -> Result<(), StorageError>;

    /// Human-readable location, for logs.
    fn location(&self) -> String;
}

/// Process-local store. Used when the database cannot be opened, and in tests.
#[derive(Debug, Default)]
pub struct MemoryArtifactStore {
    entries: Mutex<Option<Vec<String>>>,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            entries: Mutex::new(Some(entries.into_iter().map(Into::into).collect())),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<Vec<String>>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl ArtifactStore for MemoryArtifactStore {
    async fn load(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.lock().clone().unwrap_or_default())
    }

    async fn save(&self, entries: &[String]) -> Result<(), StorageError> {
        *self.lock() = Some(entries.to_vec());
        Ok(())
    }

    async fn clear(&self) -> Result<(), StorageError> {
        *self.lock() = Some(Vec::new());
        Ok(())
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_store_load_before_save_is_empty() {
        let store = MemoryArtifactStore::new();
        assert!(store.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn memory_store_save_replaces_snapshot() {
        let store = MemoryArtifactStore::with_entries(["a%17/audio/a/audio.mp3"]);
        store
            .save(&["b%17/audio/b/audio.mp3".to_string()])
            .await
            .unwrap();
        assert_eq!(store.load().await.unwrap(), vec!["b%17/audio/b/audio.mp3"]);

        store.clear().await.unwrap();
        assert!(store.load().await.unwrap().is_empty());
    }
}
