//! Client-side key-value storage
//!
//! Both the response cache and the query history persist through a
//! [`KeyValueStore`]. Stores are shared, unlocked and last-write-wins.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use crate::config::{StorageBackend, StorageSettings};
use crate::error::StorageError;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

/// Async JSON key-value store
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError>;

    /// Store `value` under `key`, replacing any previous value
    async fn set(&self, key: &str, value: Value) -> Result<(), StorageError>;

    /// Delete `key`. Missing keys are not an error.
    async fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Build the store selected in settings
pub fn from_settings(settings: &StorageSettings) -> Arc<dyn KeyValueStore> {
    match settings.backend {
        StorageBackend::Memory => {
            info!("Using in-memory client storage");
            Arc::new(MemoryStore::new(settings.memory_capacity))
        }
        StorageBackend::File => {
            let dir = settings.resolved_directory();
            info!("Using file client storage at {}", dir.display());
            Arc::new(FileStore::new(dir))
        }
    }
}
