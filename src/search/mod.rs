//! Client-side search
//!
//! Loads a document set once, builds a weighted fuzzy index over configured
//! fields and keeps a short history of recent queries.

mod engine;
mod fuzzy;
mod history;
mod index;
mod source;

pub use engine::{SearchEngine, SearchOptions, SearchState, SEARCH_FAILED_MESSAGE};
pub use fuzzy::{score, FuzzyOptions, Pattern, MAX_PATTERN_CHUNKS, MAX_PATTERN_LENGTH};
pub use history::{QueryHistory, DEFAULT_HISTORY_CAPACITY, HISTORY_KEY};
pub use index::{SearchHit, SearchIndex};
pub use source::{DatasetSource, FallbackSource, HttpSource, JsonFileSource, StaticSource};
