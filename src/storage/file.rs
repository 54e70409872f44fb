//! File-backed store: one JSON document per key

use super::KeyValueStore;
use crate::error::StorageError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Persistent store writing `<sha256(key)>.json` files into a directory
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

#[derive(Serialize, Deserialize)]
struct StoredValue {
    key: String,
    value: Value,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let mut hasher = Sha256::new();
        hasher.update(key.as_bytes());
        self.dir.join(format!("{:x}.json", hasher.finalize()))
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        let bytes = match tokio::fs::read(self.path_for(key)).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let stored: StoredValue = serde_json::from_slice(&bytes)?;
        Ok(Some(stored.value))
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let path = self.path_for(key);
        // Writers of the same key each get their own temp file
        let tmp = path.with_extension(format!("{}.tmp", Uuid::new_v4().simple()));
        let stored = StoredValue {
            key: key.to_string(),
            value,
        };
        tokio::fs::write(&tmp, serde_json::to_vec(&stored)?).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_round_trip_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        store
            .set("fetch-cache-/api/posts", json!({"data": [1, 2]}))
            .await
            .unwrap();

        let reopened = FileStore::new(dir.path());
        let value = reopened.get("fetch-cache-/api/posts").await.unwrap();
        assert_eq!(value, Some(json!({"data": [1, 2]})));
    }

    #[tokio::test]
    async fn test_missing_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("not-created-yet"));
        assert_eq!(store.get("nope").await.unwrap(), None);
        store.remove("nope").await.unwrap();
    }

    #[tokio::test]
    async fn test_corrupt_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        std::fs::write(store.path_for("broken"), b"{not json").unwrap();
        assert!(matches!(
            store.get("broken").await,
            Err(StorageError::Serde(_))
        ));
    }

    #[tokio::test]
    async fn test_remove() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        store.set("k", json!("v")).await.unwrap();
        store.remove("k").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_concurrent_writers_same_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move { store.set("search-history", json!([i])).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let value = store.get("search-history").await.unwrap().unwrap();
        assert!(value.as_array().is_some_and(|a| a.len() == 1));

        let leftovers = std::fs::read_dir(dir.path())
            .unwrap()
            .filter(|e| e.as_ref().unwrap().path().extension() == Some(std::ffi::OsStr::new("tmp")))
            .count();
        assert_eq!(leftovers, 0);
    }
}
