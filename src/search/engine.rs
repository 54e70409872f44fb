//! Search engine: lazy dataset, fuzzy index, query history, observable state

use super::fuzzy::FuzzyOptions;
use super::history::QueryHistory;
use super::index::SearchIndex;
use super::source::DatasetSource;
use crate::config::{SearchKey, SearchSettings};
use crate::storage::KeyValueStore;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::{watch, Mutex};
use tracing::{debug, error, info};

/// Message shown when matching fails
pub const SEARCH_FAILED_MESSAGE: &str = "Search failed. Please try again.";

/// Search engine configuration
#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub keys: Vec<SearchKey>,
    pub fuzzy: FuzzyOptions,
    /// Load the dataset on construction instead of on first search
    pub immediate: bool,
    pub history_capacity: usize,
    /// Query the engine starts with; searched once the index is built
    pub initial_query: String,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self::from_settings(&SearchSettings::default())
    }
}

impl SearchOptions {
    pub fn from_settings(settings: &SearchSettings) -> Self {
        Self {
            keys: settings.keys.clone(),
            fuzzy: FuzzyOptions::from_settings(settings),
            immediate: settings.immediate,
            history_capacity: settings.history_capacity,
            initial_query: String::new(),
        }
    }

    pub fn immediate(mut self, immediate: bool) -> Self {
        self.immediate = immediate;
        self
    }

    pub fn initial_query(mut self, query: impl Into<String>) -> Self {
        self.initial_query = query.into();
        self
    }
}

/// Observable search state
#[derive(Debug, Clone, PartialEq)]
pub struct SearchState<D> {
    pub query: String,
    /// Matching documents, most relevant first
    pub results: Vec<D>,
    pub total_results: usize,
    /// `searching || dataset_loading`
    pub is_loading: bool,
    /// A query is being matched
    pub searching: bool,
    /// The dataset is being (re)loaded
    pub dataset_loading: bool,
    /// User-facing error message
    pub error: Option<String>,
    /// Recent queries, most recent first
    pub history: Vec<String>,
}

impl<D> Default for SearchState<D> {
    fn default() -> Self {
        Self {
            query: String::new(),
            results: Vec::new(),
            total_results: 0,
            is_loading: false,
            searching: false,
            dataset_loading: false,
            error: None,
            history: Vec::new(),
        }
    }
}

/// Fuzzy search over a lazily loaded document set
pub struct SearchEngine<D> {
    source: Arc<dyn DatasetSource<D>>,
    options: SearchOptions,
    index: RwLock<Option<Arc<SearchIndex<D>>>>,
    history: Mutex<QueryHistory>,
    state: watch::Sender<SearchState<D>>,
    load_started: AtomicBool,
    load_lock: Mutex<()>,
}

impl<D> SearchEngine<D>
where
    D: Serialize + Clone + Send + Sync + 'static,
{
    /// Create the engine. With `immediate`, the dataset starts loading in the
    /// background right away.
    pub async fn new(
        source: Arc<dyn DatasetSource<D>>,
        store: Arc<dyn KeyValueStore>,
        options: SearchOptions,
    ) -> Arc<Self> {
        let history = QueryHistory::load(store, options.history_capacity).await;
        // An immediate load counts as started before its task runs, so an
        // early search leaves its query pending instead of loading again.
        let immediate = options.immediate;
        let (state, _) = watch::channel(SearchState {
            query: options.initial_query.clone(),
            history: history.entries().to_vec(),
            is_loading: immediate,
            dataset_loading: immediate,
            ..Default::default()
        });

        let engine = Arc::new(Self {
            source,
            options,
            index: RwLock::new(None),
            history: Mutex::new(history),
            state,
            load_started: AtomicBool::new(immediate),
            load_lock: Mutex::new(()),
        });

        if engine.options.immediate {
            let loader = engine.clone();
            tokio::spawn(async move { loader.load_search_data().await });
        }

        engine
    }

    /// Set the query and run it
    pub async fn search(&self, text: &str) {
        self.publish(|s| s.query = text.to_string());

        if self.index().is_none() && !self.load_started.load(Ordering::SeqCst) {
            debug!("Loading search data on first use");
            self.load_documents().await;
        }

        self.run_query(text).await;
    }

    /// Reset query, results and error. History is kept.
    pub fn clear_search(&self) {
        self.publish(|s| {
            s.query.clear();
            s.results.clear();
            s.total_results = 0;
            s.error = None;
        });
    }

    pub async fn clear_history(&self) {
        let mut history = self.history.lock().await;
        history.clear().await;
        self.publish(|s| s.history.clear());
    }

    /// Set the query without searching
    pub fn update_query(&self, text: &str) {
        self.publish(|s| s.query = text.to_string());
    }

    /// (Re)load the dataset and rebuild the index. A pending query runs
    /// against the new index. Load failures are logged and leave the
    /// previous index in place.
    pub async fn load_search_data(&self) {
        if self.load_documents().await {
            self.rerun_pending().await;
        }
    }

    /// Replace the document set directly
    pub async fn set_documents(&self, docs: Vec<D>) {
        self.install(docs);
        self.rerun_pending().await;
    }

    pub fn subscribe(&self) -> watch::Receiver<SearchState<D>> {
        self.state.subscribe()
    }

    pub fn state(&self) -> SearchState<D> {
        self.state.borrow().clone()
    }

    pub fn query(&self) -> String {
        self.state.borrow().query.clone()
    }

    pub fn results(&self) -> Vec<D> {
        self.state.borrow().results.clone()
    }

    pub fn total_results(&self) -> usize {
        self.state.borrow().total_results
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().is_loading
    }

    pub fn error(&self) -> Option<String> {
        self.state.borrow().error.clone()
    }

    pub fn history(&self) -> Vec<String> {
        self.state.borrow().history.clone()
    }

    /// Whether an index has been built
    pub fn is_ready(&self) -> bool {
        self.index().is_some()
    }

    fn index(&self) -> Option<Arc<SearchIndex<D>>> {
        self.index
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn publish(&self, apply: impl FnOnce(&mut SearchState<D>)) {
        self.state.send_modify(|s| {
            apply(s);
            s.is_loading = s.searching || s.dataset_loading;
        });
    }

    /// Returns whether a new index was built
    async fn load_documents(&self) -> bool {
        self.load_started.store(true, Ordering::SeqCst);
        let _guard = self.load_lock.lock().await;

        self.publish(|s| s.dataset_loading = true);
        let loaded = self.source.load().await;
        let built = match loaded {
            Ok(docs) => {
                info!(
                    "Loaded {} documents from {}",
                    docs.len(),
                    self.source.describe()
                );
                self.install(docs);
                true
            }
            Err(e) => {
                error!(
                    "Failed to load search data from {}: {}",
                    self.source.describe(),
                    e
                );
                false
            }
        };
        self.publish(|s| s.dataset_loading = false);
        built
    }

    fn install(&self, docs: Vec<D>) {
        let index = SearchIndex::build(docs, &self.options.keys, self.options.fuzzy.clone());
        *self.index.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(index));
    }

    async fn rerun_pending(&self) {
        let pending = self.query();
        if !pending.trim().is_empty() {
            debug!("Re-running pending query '{}'", pending);
            self.run_query(&pending).await;
        }
    }

    async fn run_query(&self, query: &str) {
        if query.trim().is_empty() {
            self.publish(|s| {
                s.results.clear();
                s.total_results = 0;
                s.error = None;
            });
            return;
        }

        self.publish(|s| {
            s.searching = true;
            s.error = None;
        });

        {
            let mut history = self.history.lock().await;
            if history.record(query).await {
                let entries = history.entries().to_vec();
                self.publish(|s| s.history = entries);
            }
        }

        match self.index() {
            Some(index) => match index.search(query) {
                Ok(hits) => {
                    debug!("Query '{}' matched {} documents", query, hits.len());
                    let results: Vec<D> = hits.into_iter().map(|hit| hit.item).collect();
                    self.publish(|s| {
                        s.total_results = results.len();
                        s.results = results;
                    });
                }
                Err(e) => {
                    error!("Search error: {}", e);
                    self.publish(|s| {
                        s.error = Some(SEARCH_FAILED_MESSAGE.to_string());
                        s.results.clear();
                        s.total_results = 0;
                    });
                }
            },
            None => debug!("Index not built yet, query '{}' is pending", query),
        }

        self.publish(|s| s.searching = false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DatasetError;
    use crate::search::source::{JsonFileSource, StaticSource};
    use crate::search::{MAX_PATTERN_CHUNKS, MAX_PATTERN_LENGTH};
    use crate::storage::MemoryStore;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use tokio::sync::Notify;

    fn docs() -> Vec<Value> {
        vec![json!({"title": "Hello World"}), json!({"title": "Goodbye"})]
    }

    async fn engine_with(docs: Vec<Value>) -> Arc<SearchEngine<Value>> {
        SearchEngine::new(
            Arc::new(StaticSource::new(docs)),
            Arc::new(MemoryStore::default()),
            SearchOptions::default(),
        )
        .await
    }

    /// Source that blocks until released
    struct GatedSource {
        gate: Notify,
        docs: Vec<Value>,
    }

    #[async_trait]
    impl DatasetSource<Value> for GatedSource {
        async fn load(&self) -> Result<Vec<Value>, DatasetError> {
            self.gate.notified().await;
            Ok(self.docs.clone())
        }

        fn describe(&self) -> String {
            "gated".into()
        }
    }

    /// Source that counts loads and takes a while to answer
    struct CountingSource {
        loads: AtomicUsize,
        docs: Vec<Value>,
    }

    #[async_trait]
    impl DatasetSource<Value> for CountingSource {
        async fn load(&self) -> Result<Vec<Value>, DatasetError> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok(self.docs.clone())
        }

        fn describe(&self) -> String {
            "counting".into()
        }
    }

    #[tokio::test]
    async fn test_fuzzy_search() {
        let engine = engine_with(docs()).await;

        engine.search("Helo").await;
        let state = engine.state();
        assert_eq!(state.results, vec![json!({"title": "Hello World"})]);
        assert_eq!(state.total_results, 1);
        assert!(!state.is_loading);
        assert!(state.error.is_none());

        engine.search("zzz").await;
        assert!(engine.results().is_empty());
        assert_eq!(engine.total_results(), 0);
    }

    #[tokio::test]
    async fn test_deferred_load_on_first_search() {
        let engine = engine_with(docs()).await;
        assert!(!engine.is_ready());

        engine.search("Goodbye").await;
        assert!(engine.is_ready());
        assert_eq!(engine.total_results(), 1);
    }

    #[tokio::test]
    async fn test_empty_query_clears() {
        let engine = engine_with(docs()).await;
        engine.search("Hello").await;
        assert_eq!(engine.total_results(), 1);

        engine.search("   ").await;
        let state = engine.state();
        assert!(state.results.is_empty());
        assert_eq!(state.total_results, 0);
        assert!(state.error.is_none());
        assert_eq!(state.history, vec!["Hello"]);
    }

    #[tokio::test]
    async fn test_history_dedup() {
        let engine = engine_with(docs()).await;
        engine.search("foo").await;
        engine.search("bar").await;
        engine.search("foo").await;
        assert_eq!(engine.history(), vec!["bar", "foo"]);
    }

    #[tokio::test]
    async fn test_history_capacity() {
        let engine = engine_with(docs()).await;
        for i in 0..11 {
            engine.search(&format!("query {}", i)).await;
        }
        let history = engine.history();
        assert_eq!(history.len(), 10);
        assert_eq!(history[0], "query 10");
        assert_eq!(history[9], "query 1");
    }

    #[tokio::test]
    async fn test_history_restored_from_store() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::default());
        let first: Arc<SearchEngine<Value>> = SearchEngine::new(
            Arc::new(StaticSource::new(docs())),
            store.clone(),
            SearchOptions::default(),
        )
        .await;
        first.search("tin tức").await;

        let second: Arc<SearchEngine<Value>> = SearchEngine::new(
            Arc::new(StaticSource::new(docs())),
            store,
            SearchOptions::default(),
        )
        .await;
        assert_eq!(second.history(), vec!["tin tức"]);
    }

    #[tokio::test]
    async fn test_clear_search_and_history() {
        let engine = engine_with(docs()).await;
        engine.search("Hello").await;

        engine.clear_search();
        let state = engine.state();
        assert_eq!(state.query, "");
        assert!(state.results.is_empty());
        assert_eq!(state.history, vec!["Hello"]);

        engine.clear_history().await;
        assert!(engine.history().is_empty());
    }

    #[tokio::test]
    async fn test_update_query_does_not_search() {
        let engine = engine_with(docs()).await;
        engine.update_query("Hello");
        assert_eq!(engine.query(), "Hello");
        assert!(engine.results().is_empty());
        assert!(engine.history().is_empty());
    }

    #[tokio::test]
    async fn test_pending_query_runs_after_load() {
        let source = Arc::new(GatedSource {
            gate: Notify::new(),
            docs: docs(),
        });
        let engine: Arc<SearchEngine<Value>> = SearchEngine::new(
            source.clone(),
            Arc::new(MemoryStore::default()),
            SearchOptions::default().immediate(true),
        )
        .await;

        let mut rx = engine.subscribe();
        tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|s| s.dataset_loading))
            .await
            .unwrap()
            .unwrap();

        engine.search("Helo").await;
        let state = engine.state();
        assert!(state.results.is_empty());
        assert!(state.is_loading);
        assert!(!state.searching);

        source.gate.notify_one();
        tokio::time::timeout(
            Duration::from_secs(5),
            rx.wait_for(|s| !s.is_loading && s.total_results == 1),
        )
        .await
        .unwrap()
        .unwrap();
    }

    #[tokio::test]
    async fn test_initial_query_searched_on_load() {
        let engine: Arc<SearchEngine<Value>> = SearchEngine::new(
            Arc::new(StaticSource::new(docs())),
            Arc::new(MemoryStore::default()),
            SearchOptions::default().initial_query("Goodbye"),
        )
        .await;

        engine.load_search_data().await;
        assert_eq!(engine.total_results(), 1);
    }

    #[tokio::test]
    async fn test_load_failure_is_logged_only() {
        let engine: Arc<SearchEngine<Value>> = SearchEngine::new(
            Arc::new(JsonFileSource::new("/nonexistent/articles.json")),
            Arc::new(MemoryStore::default()),
            SearchOptions::default(),
        )
        .await;

        engine.search("Hello").await;
        let state = engine.state();
        assert!(!engine.is_ready());
        assert!(state.results.is_empty());
        assert!(state.error.is_none());
        assert!(!state.is_loading);
        assert_eq!(state.history, vec!["Hello"]);
    }

    #[tokio::test]
    async fn test_execution_error_message() {
        let engine = engine_with(docs()).await;
        engine.search("Hello").await;

        let long = "x".repeat(MAX_PATTERN_LENGTH * MAX_PATTERN_CHUNKS + 1);
        engine.search(&long).await;
        let state = engine.state();
        assert_eq!(state.error.as_deref(), Some(SEARCH_FAILED_MESSAGE));
        assert!(state.results.is_empty());
        assert_eq!(state.total_results, 0);
        assert!(!state.is_loading);
    }

    #[tokio::test]
    async fn test_set_documents_rebuilds() {
        let engine = engine_with(Vec::new()).await;
        engine.search("Hello").await;
        assert_eq!(engine.total_results(), 0);

        engine.set_documents(docs()).await;
        assert_eq!(engine.total_results(), 1);
    }

    #[tokio::test]
    async fn test_immediate_load_runs_once() {
        let source = Arc::new(CountingSource {
            loads: AtomicUsize::new(0),
            docs: docs(),
        });
        let engine: Arc<SearchEngine<Value>> = SearchEngine::new(
            source.clone(),
            Arc::new(MemoryStore::default()),
            SearchOptions::default().immediate(true),
        )
        .await;

        // Issued before the background load has had a chance to start
        engine.search("Hello").await;
        assert!(engine.is_loading());

        let mut rx = engine.subscribe();
        tokio::time::timeout(
            Duration::from_secs(5),
            rx.wait_for(|s| !s.is_loading && s.total_results == 1),
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(source.loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_long_query_matches() {
        let title = "Giá vàng hôm nay tăng mạnh ".repeat(16);
        let engine = engine_with(vec![json!({"title": title}), json!({"title": "Goodbye"})]).await;

        let query: String = title.chars().take(332).collect();
        assert!(query.chars().count() > MAX_PATTERN_LENGTH);
        engine.search(&query).await;

        let state = engine.state();
        assert!(state.error.is_none());
        assert_eq!(state.total_results, 1);
    }
}
