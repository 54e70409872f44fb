//! Response cache for the fetch orchestrator
//!
//! Entries are stored in a [`KeyValueStore`] under a fingerprint derived from the
//! request URL, path params and query params. An entry is valid while
//! `now < expires`; anything else is a miss. Storage failures are logged and
//! treated as misses so they never break a fetch.

use crate::fetch::Params;
use crate::storage::KeyValueStore;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Prefix of every generated fingerprint
pub const CACHE_KEY_PREFIX: &str = "fetch-cache-";

/// Source of epoch milliseconds
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> i64;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Clock that only moves when told to
#[derive(Debug, Default)]
pub struct ManualClock(AtomicI64);

impl ManualClock {
    pub fn new(start_millis: i64) -> Self {
        Self(AtomicI64::new(start_millis))
    }

    pub fn advance(&self, by: Duration) {
        self.0.fetch_add(by.as_millis() as i64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }
}

/// A cached payload with its validity window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Transformed payload
    pub data: Value,
    /// When the payload was fetched (epoch ms)
    pub timestamp: i64,
    /// When the entry stops being valid (epoch ms)
    pub expires: i64,
}

impl CacheEntry {
    pub fn new(data: Value, now_millis: i64, ttl: Duration) -> Self {
        Self {
            data,
            timestamp: now_millis,
            expires: now_millis.saturating_add(ttl.as_millis() as i64),
        }
    }

    /// Whether the entry can be served at `now_millis`
    pub fn is_valid_at(&self, now_millis: i64) -> bool {
        self.timestamp != 0 && !self.data.is_null() && now_millis < self.expires
    }
}

/// Generate the cache fingerprint for a request
///
/// `fetch-cache-<url>`, then `-params-<json>` and `-query-<json>` when the maps
/// are non-empty. Maps serialize in key order so the key is deterministic.
pub fn cache_key(url: &str, params: &Params, query: &Params) -> String {
    let mut key = format!("{}{}", CACHE_KEY_PREFIX, url);

    if !params.is_empty() {
        key.push_str("-params-");
        key.push_str(&serde_json::to_string(params).unwrap_or_default());
    }

    if !query.is_empty() {
        key.push_str("-query-");
        key.push_str(&serde_json::to_string(query).unwrap_or_default());
    }

    key
}

/// Fingerprint-keyed cache over a shared store
#[derive(Clone)]
pub struct ResponseCache {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
}

impl ResponseCache {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    pub fn with_clock(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Return the cached payload if a valid entry exists
    pub async fn lookup(&self, key: &str) -> Option<Value> {
        let raw = match self.store.get(key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!("Cache read failed for {}: {}", key, e);
                return None;
            }
        };

        let entry: CacheEntry = match serde_json::from_value(raw) {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Ignoring malformed cache entry {}: {}", key, e);
                return None;
            }
        };

        if entry.is_valid_at(self.clock.now_millis()) {
            Some(entry.data)
        } else {
            debug!("Cache entry expired: {}", key);
            None
        }
    }

    /// Write a fresh entry valid for `ttl`
    pub async fn save(&self, key: &str, data: Value, ttl: Duration) {
        let entry = CacheEntry::new(data, self.clock.now_millis(), ttl);
        let raw = match serde_json::to_value(&entry) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Failed to encode cache entry {}: {}", key, e);
                return;
            }
        };
        if let Err(e) = self.store.set(key, raw).await {
            warn!("Cache write failed for {}: {}", key, e);
        }
    }

    /// Drop the entry stored under `key`
    pub async fn clear(&self, key: &str) {
        if let Err(e) = self.store.remove(key).await {
            warn!("Cache clear failed for {}: {}", key, e);
        }
    }
}
