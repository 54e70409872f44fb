//! Newsreader: client-side data fetching and article search
//!
//! Two independent units share the same storage and observable-state
//! conventions:
//!
//! - [`fetch::Fetcher`] resolves URL templates, caches responses with a TTL,
//!   retries with a fixed delay, debounces, and can be aborted.
//! - [`search::SearchEngine`] loads a document set lazily, builds a weighted
//!   fuzzy index and keeps a short query history.

pub mod cache;
pub mod config;
pub mod error;
pub mod fetch;
pub mod metrics;
pub mod models;
pub mod network;
pub mod search;
pub mod storage;

pub use config::Settings;
pub use error::{DatasetError, FetchError, SearchError, StorageError};
pub use fetch::{FetchOptions, Fetcher, RequestState};
pub use models::Article;
pub use search::{SearchEngine, SearchOptions, SearchState};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default cache time-to-live in milliseconds
pub const DEFAULT_CACHE_TTL_MS: u64 = 300_000;

/// Default delay between retry attempts in milliseconds
pub const DEFAULT_RETRY_DELAY_MS: u64 = 1000;
