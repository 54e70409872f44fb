//! Recent-queries history persisted through a [`KeyValueStore`]

use crate::storage::KeyValueStore;
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;

/// Storage key of the history list
pub const HISTORY_KEY: &str = "search-history";

/// Default number of queries kept
pub const DEFAULT_HISTORY_CAPACITY: usize = 10;

/// Bounded, most-recent-first query list.
///
/// A query already in the list is not recorded again and keeps its position.
pub struct QueryHistory {
    store: Arc<dyn KeyValueStore>,
    capacity: usize,
    entries: Vec<String>,
}

impl QueryHistory {
    /// Load the persisted list. Unreadable or malformed data starts empty.
    pub async fn load(store: Arc<dyn KeyValueStore>, capacity: usize) -> Self {
        let entries = match store.get(HISTORY_KEY).await {
            Ok(Some(value)) => match serde_json::from_value::<Vec<String>>(value) {
                Ok(mut entries) => {
                    entries.truncate(capacity);
                    entries
                }
                Err(e) => {
                    warn!("Ignoring malformed search history: {}", e);
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!("Failed to read search history: {}", e);
                Vec::new()
            }
        };

        Self {
            store,
            capacity,
            entries,
        }
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Prepend `query` unless it is already present. Returns whether the list changed.
    pub async fn record(&mut self, query: &str) -> bool {
        if self.capacity == 0 || self.entries.iter().any(|q| q == query) {
            return false;
        }
        self.entries.insert(0, query.to_string());
        self.entries.truncate(self.capacity);
        self.persist().await;
        true
    }

    pub async fn clear(&mut self) {
        self.entries.clear();
        self.persist().await;
    }

    async fn persist(&self) {
        let value = Value::from(self.entries.clone());
        if let Err(e) = self.store.set(HISTORY_KEY, value).await {
            warn!("Failed to persist search history: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use serde_json::json;

    async fn fresh() -> (Arc<dyn KeyValueStore>, QueryHistory) {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::default());
        let history = QueryHistory::load(store.clone(), DEFAULT_HISTORY_CAPACITY).await;
        (store, history)
    }

    #[tokio::test]
    async fn test_duplicate_skipped_not_moved() {
        let (_, mut history) = fresh().await;
        assert!(history.record("foo").await);
        assert!(history.record("bar").await);
        assert!(!history.record("foo").await);
        assert_eq!(history.entries(), ["bar", "foo"]);
    }

    #[tokio::test]
    async fn test_capacity() {
        let (_, mut history) = fresh().await;
        for i in 0..11 {
            history.record(&format!("q{}", i)).await;
        }
        let expected: Vec<String> = (1..11).rev().map(|i| format!("q{}", i)).collect();
        assert_eq!(history.entries(), expected.as_slice());
    }

    #[tokio::test]
    async fn test_persisted_and_reloaded() {
        let (store, mut history) = fresh().await;
        history.record("thể thao").await;

        assert_eq!(store.get(HISTORY_KEY).await.unwrap(), Some(json!(["thể thao"])));
        let reloaded = QueryHistory::load(store, DEFAULT_HISTORY_CAPACITY).await;
        assert_eq!(reloaded.entries(), ["thể thao"]);
    }

    #[tokio::test]
    async fn test_clear() {
        let (store, mut history) = fresh().await;
        history.record("a").await;
        history.clear().await;
        assert!(history.entries().is_empty());
        assert_eq!(store.get(HISTORY_KEY).await.unwrap(), Some(json!([])));
    }

    #[tokio::test]
    async fn test_malformed_starts_empty() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::default());
        store.set(HISTORY_KEY, json!({"not": "a list"})).await.unwrap();
        let history = QueryHistory::load(store, DEFAULT_HISTORY_CAPACITY).await;
        assert!(history.entries().is_empty());
    }
}
