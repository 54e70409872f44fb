//! In-memory store backed by moka

use super::KeyValueStore;
use crate::error::StorageError;
use async_trait::async_trait;
use moka::future::Cache;
use serde_json::Value;

/// Bounded in-process store. Contents are lost on exit.
#[derive(Clone)]
pub struct MemoryStore {
    cache: Cache<String, Value>,
}

impl MemoryStore {
    /// Create a store holding at most `max_capacity` entries
    pub fn new(max_capacity: u64) -> Self {
        let cache = Cache::builder().max_capacity(max_capacity).build();
        Self { cache }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(10_000)
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        Ok(self.cache.get(key).await)
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StorageError> {
        self.cache.insert(key.to_string(), value).await;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.cache.remove(key).await;
        Ok(())
    }
}
