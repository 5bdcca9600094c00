use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::warn;

use super::{ArtifactStore, StorageError, REGISTRY_KEY};

const DB_FILE_NAME: &str = "artifacts.db";

/// Key-value table in a SQLite file; the registry snapshot is one JSON array
/// of strings stored under a single key.
#[derive(Debug, Clone)]
pub struct SqliteArtifactStore {
    db_path: PathBuf,
    key: String,
}

impl SqliteArtifactStore {
    pub fn new(data_dir: &Path) -> Result<Self> {
        Self::with_key(data_dir, REGISTRY_KEY)
    }

    pub fn with_key(data_dir: &Path, key: &str) -> Result<Self> {
        std::fs::create_dir_all(data_dir).with_context(|| {
            format!(
                "failed to create data directory for artifacts db: {}",
                data_dir.display()
            )
        })?;

        let store = Self {
            db_path: data_dir.join(DB_FILE_NAME),
            key: key.to_string(),
        };
        store.initialize_schema()?;
        Ok(store)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn load_blocking(&self) -> Result<Vec<String>> {
        self.with_connection(|conn| {
            let raw: Option<String> = conn
                .query_row(
                    "SELECT value FROM kv WHERE key = ?1",
                    params![self.key],
                    |row| row.get(0),
                )
                .optional()
                .with_context(|| format!("failed to read key '{}'", self.key))?;

            let Some(raw) = raw else {
                return Ok(Vec::new());
            };

            match serde_json::from_str::<Vec<String>>(&raw) {
                Ok(entries) => Ok(entries),
                Err(err) => {
                    warn!(
                        key = %self.key,
                        error = %err,
                        "Persisted registry snapshot is not a JSON string array; treating as empty"
                    );
                    Ok(Vec::new())
                }
            }
        })
    }

    fn save_blocking(&self, entries: &[String]) -> Result<()> {
        let encoded =
            serde_json::to_string(entries).context("failed to serialize registry snapshot")?;
        let updated_at = Utc::now().to_rfc3339();

        self.with_connection(|conn| {
            conn.execute(
                "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET
                    value = excluded.value,
                    updated_at = excluded.updated_at",
                params![self.key, encoded, updated_at],
            )
            .with_context(|| format!("failed to write key '{}'", self.key))?;
            Ok(())
        })
    }

    fn initialize_schema(&self) -> Result<()> {
        self.with_connection(|conn| {
            conn.execute_batch(
                "PRAGMA journal_mode = WAL;
                 CREATE TABLE IF NOT EXISTS kv (
                    key TEXT PRIMARY KEY,
                    value TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                 );",
            )
            .with_context(|| {
                format!(
                    "failed to initialize artifacts schema: {}",
                    self.db_path.display()
                )
            })?;
            Ok(())
        })
    }

    fn with_connection<T>(&self, op: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = Connection::open(&self.db_path)
            .with_context(|| format!("failed to open artifacts db: {}", self.db_path.display()))?;
        conn.busy_timeout(std::time::Duration::from_secs(5))
            .context("failed to set artifacts db busy timeout")?;
        op(&conn)
    }

    async fn blocking<T, F>(&self, operation: &'static str, op: F) -> Result<T, StorageError>
    where
        T: Send + 'static,
        F: FnOnce(&SqliteArtifactStore) -> Result<T> + Send + 'static,
    {
        let store = self.clone();
        tokio::task::spawn_blocking(move || op(&store))
            .await
            .map_err(|err| StorageError::new(operation, err))?
            .map_err(|err| StorageError::new(operation, err))
    }
}

#[async_trait]
impl ArtifactStore for SqliteArtifactStore {
    async fn load(&self) -> Result<Vec<String>, StorageError> {
        self.blocking("load", |store| store.load_blocking()).await
    }

    async fn save(&self, entries: &[String]) -> Result<(), StorageError> {
        let entries = entries.to_vec();
        self.blocking("save", move |store| store.save_blocking(&entries))
            .await
    }

    async fn clear(&self) -> Result<(), StorageError> {
        self.blocking("clear", |store| store.save_blocking(&[])).await
    }

    fn location(&self) -> String {
        format!("{}#{}", self.db_path.display(), self.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn load_on_fresh_database_is_empty() {
        let dir = tempdir().unwrap();
        let store = SqliteArtifactStore::new(dir.path()).unwrap();
        assert!(store.load().await.unwrap().is_empty());
        assert!(store.db_path().exists());
    }

    #[tokio::test]
    async fn save_fully_replaces_previous_snapshot() {
        let dir = tempdir().unwrap();
        let store = SqliteArtifactStore::new(dir.path()).unwrap();

        store
            .save(&["a%17/audio/a/audio.mp3".into(), "b%17/audio/b/audio.mp3".into()])
            .await
            .unwrap();
        store
            .save(&["c%17/audio/c/audio.mp3".into()])
            .await
            .unwrap();

        assert_eq!(
            store.load().await.unwrap(),
            vec!["c%17/audio/c/audio.mp3".to_string()]
        );
    }

    #[tokio::test]
    async fn snapshot_survives_reopen() {
        let dir = tempdir().unwrap();
        {
            let store = SqliteArtifactStore::new(dir.path()).unwrap();
            store
                .save(&["Song A%17/audio/Song%20A/audio.mp3".into()])
                .await
                .unwrap();
        }

        let reopened = SqliteArtifactStore::new(dir.path()).unwrap();
        assert_eq!(
            reopened.load().await.unwrap(),
            vec!["Song A%17/audio/Song%20A/audio.mp3".to_string()]
        );
    }

    #[tokio::test]
    async fn clear_resets_to_empty() {
        let dir = tempdir().unwrap();
        let store = SqliteArtifactStore::new(dir.path()).unwrap();
        store.save(&["x%17/audio/x/audio.mp3".into()]).await.unwrap();
        store.clear().await.unwrap();
        assert!(store.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn non_array_value_is_treated_as_empty() {
        let dir = tempdir().unwrap();
        let store = SqliteArtifactStore::new(dir.path()).unwrap();
        let conn = Connection::open(store.db_path()).unwrap();
        conn.execute(
            "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)",
            params![REGISTRY_KEY, "{\"not\":\"an array\"}", Utc::now().to_rfc3339()],
        )
        .unwrap();

        assert!(store.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn keys_are_isolated() {
        let dir = tempdir().unwrap();
        let a = SqliteArtifactStore::with_key(dir.path(), "a").unwrap();
        let b = SqliteArtifactStore::with_key(dir.path(), "b").unwrap();
        a.save(&["x%17/audio/x/audio.mp3".into()]).await.unwrap();
        assert!(b.load().await.unwrap().is_empty());
    }
}
