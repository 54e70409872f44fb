//! Fetch orchestrator
//!
//! A [`Fetcher`] owns one logical request: a URL template plus options. It
//! resolves the URL, serves valid cache entries without touching the network,
//! retries failures with a constant delay, and publishes its state through a
//! watch channel. Errors never escape `execute`; they land in the state.

use super::cancel::CancellationToken;
use super::options::{ExecuteOverrides, FetchOptions, RequestOptions};
use super::state::RequestState;
use super::url::{build_url, Params};
use crate::cache::{cache_key, Clock, ResponseCache, SystemClock};
use crate::config::FetchSettings;
use crate::error::FetchError;
use crate::metrics::{host_of, Metrics};
use crate::network::{HttpMethod, HttpRequest, RequestBody, Transport};
use crate::storage::{KeyValueStore, MemoryStore};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Types a [`Fetcher`] can produce and cache
pub trait Payload: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

impl<T> Payload for T where T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

/// Where the URL template comes from
#[derive(Debug)]
pub enum UrlSource {
    /// Fixed template
    Static(String),
    /// Template that may change; with `immediate`, every change triggers a fetch
    Dynamic(watch::Receiver<String>),
}

impl From<&str> for UrlSource {
    fn from(url: &str) -> Self {
        UrlSource::Static(url.to_string())
    }
}

impl From<String> for UrlSource {
    fn from(url: String) -> Self {
        UrlSource::Static(url)
    }
}

impl From<watch::Receiver<String>> for UrlSource {
    fn from(rx: watch::Receiver<String>) -> Self {
        UrlSource::Dynamic(rx)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Builder for [`Fetcher`]
pub struct FetcherBuilder<T> {
    transport: Arc<dyn Transport>,
    url: UrlSource,
    options: FetchOptions<T>,
    base_url: String,
    store: Option<Arc<dyn KeyValueStore>>,
    clock: Arc<dyn Clock>,
    metrics: Option<Arc<Metrics>>,
}

impl<T: Payload> FetcherBuilder<T> {
    pub fn options(mut self, options: FetchOptions<T>) -> Self {
        self.options = options;
        self
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Take the base URL from the `fetch` settings section
    pub fn settings(mut self, settings: &FetchSettings) -> Self {
        self.base_url = settings.base_url.clone();
        self
    }

    /// Store backing the response cache (in-memory when unset)
    pub fn store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Build the fetcher. With `immediate`, the first fetch is scheduled on the
    /// current tokio runtime.
    pub fn build(self) -> Fetcher<T> {
        let (url, dynamic) = match self.url {
            UrlSource::Static(template) => {
                let (_tx, rx) = watch::channel(template);
                (rx, false)
            }
            UrlSource::Dynamic(rx) => (rx, true),
        };

        let cache = if self.options.enable_cache {
            let store = self
                .store
                .unwrap_or_else(|| Arc::new(MemoryStore::default()));
            Some(ResponseCache::with_clock(store, self.clock))
        } else {
            None
        };

        let (state, _) = watch::channel(RequestState::default());
        let (revision, _) = watch::channel(0u64);

        let inner = Arc::new(Inner {
            id: Uuid::new_v4(),
            transport: self.transport,
            base_url: self.base_url,
            url,
            params: RwLock::new(self.options.params.clone()),
            query: RwLock::new(self.options.query.clone()),
            options: self.options,
            state,
            revision,
            cache,
            cancel: Mutex::new(None),
            generation: AtomicU64::new(0),
            debounce_ticket: AtomicU64::new(0),
            closed: AtomicBool::new(false),
            metrics: self.metrics,
        });

        let mut fetcher = Fetcher {
            inner,
            scheduler: None,
            dynamic,
        };
        if fetcher.inner.options.immediate {
            fetcher.scheduler = Some(fetcher.spawn_scheduler());
        }
        fetcher
    }
}

struct Inner<T> {
    id: Uuid,
    transport: Arc<dyn Transport>,
    base_url: String,
    url: watch::Receiver<String>,
    params: RwLock<Params>,
    query: RwLock<Params>,
    options: FetchOptions<T>,
    state: watch::Sender<RequestState<T>>,
    /// Bumped on every params/query update so the scheduler can react
    revision: watch::Sender<u64>,
    cache: Option<ResponseCache>,
    /// Token of the run currently allowed to touch the network
    cancel: Mutex<Option<CancellationToken>>,
    /// Latest run; older runs may not write state
    generation: AtomicU64,
    debounce_ticket: AtomicU64,
    closed: AtomicBool,
    metrics: Option<Arc<Metrics>>,
}

/// Reactive handle over one logical request
pub struct Fetcher<T> {
    inner: Arc<Inner<T>>,
    scheduler: Option<JoinHandle<()>>,
    dynamic: bool,
}

impl<T: Payload> Fetcher<T> {
    /// Start building a fetcher for `url`
    pub fn builder(transport: Arc<dyn Transport>, url: impl Into<UrlSource>) -> FetcherBuilder<T> {
        FetcherBuilder {
            transport,
            url: url.into(),
            options: FetchOptions::default(),
            base_url: String::new(),
            store: None,
            clock: Arc::new(SystemClock),
            metrics: None,
        }
    }

    /// GET request builder
    pub fn get(
        transport: Arc<dyn Transport>,
        url: impl Into<UrlSource>,
        options: FetchOptions<T>,
    ) -> FetcherBuilder<T> {
        Self::builder(transport, url).options(options.method(HttpMethod::Get))
    }

    /// POST request builder with a JSON body
    pub fn post(
        transport: Arc<dyn Transport>,
        url: impl Into<UrlSource>,
        body: Value,
        options: FetchOptions<T>,
    ) -> FetcherBuilder<T> {
        Self::with_body(transport, url, HttpMethod::Post, body, options)
    }

    /// PUT request builder with a JSON body
    pub fn put(
        transport: Arc<dyn Transport>,
        url: impl Into<UrlSource>,
        body: Value,
        options: FetchOptions<T>,
    ) -> FetcherBuilder<T> {
        Self::with_body(transport, url, HttpMethod::Put, body, options)
    }

    /// PATCH request builder with a JSON body
    pub fn patch(
        transport: Arc<dyn Transport>,
        url: impl Into<UrlSource>,
        body: Value,
        options: FetchOptions<T>,
    ) -> FetcherBuilder<T> {
        Self::with_body(transport, url, HttpMethod::Patch, body, options)
    }

    /// DELETE request builder
    pub fn delete(
        transport: Arc<dyn Transport>,
        url: impl Into<UrlSource>,
        options: FetchOptions<T>,
    ) -> FetcherBuilder<T> {
        Self::builder(transport, url).options(options.method(HttpMethod::Delete))
    }

    fn with_body(
        transport: Arc<dyn Transport>,
        url: impl Into<UrlSource>,
        method: HttpMethod,
        body: Value,
        options: FetchOptions<T>,
    ) -> FetcherBuilder<T> {
        Self::builder(transport, url).options(options.method(method).body(RequestBody::Json(body)))
    }

    /// Run the request with the configured URL and options (debounced)
    pub async fn execute(&self) {
        self.inner.execute(None, None).await
    }

    /// Run the request with a URL override and/or per-call options (debounced)
    pub async fn execute_with(&self, url: Option<&str>, overrides: Option<ExecuteOverrides>) {
        let url = url.filter(|u| !u.is_empty()).map(str::to_string);
        self.inner.execute(url, overrides).await
    }

    /// Drop the cache entry for the current fingerprint and fetch again.
    /// Not debounced.
    pub async fn refresh(&self) {
        if let Some(cache) = &self.inner.cache {
            cache.clear(&self.inner.current_cache_key()).await;
        }
        self.inner.fetch_data(None, None).await
    }

    /// Cancel the in-flight request (and any pending retry) and clear `loading`.
    /// `data` and `error` are left as they are.
    pub fn abort(&self) {
        self.inner.abort()
    }

    /// Merge new path params into the current ones
    pub fn update_params(&self, params: Params) {
        self.inner
            .params
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(params);
        self.inner.revision.send_modify(|r| *r += 1);
    }

    /// Merge new query params into the current ones
    pub fn update_query(&self, query: Params) {
        self.inner
            .query
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(query);
        self.inner.revision.send_modify(|r| *r += 1);
    }

    /// Subscribe to state changes. Dropping the receiver unsubscribes.
    pub fn subscribe(&self) -> watch::Receiver<RequestState<T>> {
        self.inner.state.subscribe()
    }

    /// Current state snapshot
    pub fn state(&self) -> RequestState<T> {
        self.inner.state.borrow().clone()
    }

    pub fn data(&self) -> Option<T> {
        self.inner.state.borrow().data.clone()
    }

    pub fn loading(&self) -> bool {
        self.inner.state.borrow().loading
    }

    pub fn error(&self) -> Option<FetchError> {
        self.inner.state.borrow().error.clone()
    }

    pub fn status_code(&self) -> Option<u16> {
        self.inner.state.borrow().status_code
    }

    pub fn retry_count(&self) -> u32 {
        self.inner.state.borrow().retry_count
    }

    /// URL the next un-overridden run would request
    pub fn resolved_url(&self) -> String {
        self.inner.resolved_url()
    }

    /// Cache fingerprint for the current URL, params and query
    pub fn cache_key(&self) -> String {
        self.inner.current_cache_key()
    }

    /// Identifier used in log lines
    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    /// One task coalesces the initial fetch and every later URL change
    fn spawn_scheduler(&self) -> JoinHandle<()> {
        let weak = Arc::downgrade(&self.inner);
        let mut url_rx = self.inner.url.clone();
        let mut revision_rx = self.inner.revision.subscribe();
        let dynamic = self.dynamic;
        drop(url_rx.borrow_and_update());

        tokio::spawn(async move {
            let mut last_url = match weak.upgrade() {
                Some(inner) => {
                    let url = inner.resolved_url();
                    Inner::spawn_run(inner);
                    url
                }
                None => return,
            };

            if !dynamic {
                return;
            }

            loop {
                tokio::select! {
                    changed = url_rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                    changed = revision_rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }

                let Some(inner) = weak.upgrade() else {
                    break;
                };
                let url = inner.resolved_url();
                if url != last_url {
                    debug!(fetcher = %inner.id, "URL changed to {}", url);
                    last_url = url;
                    Inner::spawn_run(inner);
                }
            }
        })
    }
}

impl<T> Drop for Fetcher<T> {
    fn drop(&mut self) {
        self.inner.closed.store(true, Ordering::SeqCst);
        if let Some(handle) = self.scheduler.take() {
            handle.abort();
        }
        let token = lock(&self.inner.cancel).take();
        if let Some(token) = token {
            token.cancel();
        }
    }
}

impl<T: Payload> Inner<T> {
    fn spawn_run(inner: Arc<Self>) {
        tokio::spawn(async move { inner.execute(None, None).await });
    }

    fn params(&self) -> Params {
        self.params
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn query(&self) -> Params {
        self.query
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn template(&self) -> String {
        self.url.borrow().clone()
    }

    fn resolved_url(&self) -> String {
        build_url(
            &self.template(),
            &self.base_url,
            self.options.use_base_url,
            &self.params(),
            &self.query(),
        )
    }

    fn current_cache_key(&self) -> String {
        self.options
            .cache_key
            .clone()
            .unwrap_or_else(|| cache_key(&self.template(), &self.params(), &self.query()))
    }

    /// Debounce entry point. Only the last call inside the window runs.
    async fn execute(&self, url: Option<String>, overrides: Option<ExecuteOverrides>) {
        if !self.options.debounce.is_zero() {
            let ticket = self.debounce_ticket.fetch_add(1, Ordering::SeqCst) + 1;
            tokio::time::sleep(self.options.debounce).await;
            if self.debounce_ticket.load(Ordering::SeqCst) != ticket {
                debug!(fetcher = %self.id, "Debounced call superseded");
                return;
            }
        }
        self.fetch_data(url, overrides).await
    }

    async fn fetch_data(&self, url_override: Option<String>, overrides: Option<ExecuteOverrides>) {
        if self.closed.load(Ordering::SeqCst) {
            return;
        }

        let overrides = overrides.unwrap_or_default();
        let template = url_override.unwrap_or_else(|| self.template());
        if template.trim().is_empty() {
            warn!(fetcher = %self.id, "Fetch skipped: {}", FetchError::MissingUrl);
            self.state
                .send_modify(|s| s.error = Some(FetchError::MissingUrl));
            return;
        }

        let params = self.params();
        let query = self.query();
        let use_base_url = overrides.use_base_url.unwrap_or(self.options.use_base_url);
        let target = build_url(&template, &self.base_url, use_base_url, &params, &query);
        let key = self
            .options
            .cache_key
            .clone()
            .unwrap_or_else(|| cache_key(&template, &params, &query));
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        if let Some(cache) = &self.cache {
            if let Some(data) = self.cached(cache, &key).await {
                if self.commit(generation, |s| {
                    s.data = Some(data);
                    s.error = None;
                    s.loading = false;
                }) {
                    debug!(fetcher = %self.id, "Cache hit: {}", key);
                    if let Some(metrics) = &self.metrics {
                        metrics.record_cache_hit();
                    }
                }
                return;
            }
            debug!(fetcher = %self.id, "Cache miss: {}", key);
            if let Some(metrics) = &self.metrics {
                metrics.record_cache_miss();
            }
        }

        let token = CancellationToken::new();
        let previous = lock(&self.cancel).replace(token.clone());
        if let Some(previous) = previous {
            debug!(fetcher = %self.id, "Cancelling superseded request");
            previous.cancel();
        }

        self.state.send_modify(|s| {
            s.loading = true;
            s.error = None;
            s.retry_count = 0;
        });

        let request = self.build_request(target.clone(), &overrides.request);
        let mut attempt: u32 = 0;

        loop {
            let started = Instant::now();
            let outcome = tokio::select! {
                biased;
                _ = token.cancelled() => {
                    debug!(fetcher = %self.id, "Request to {} aborted", target);
                    return;
                }
                outcome = self.attempt(request.clone()) => outcome,
            };
            if let Some(metrics) = &self.metrics {
                metrics.record_request(&host_of(&target), started.elapsed().as_millis() as u64);
            }

            match outcome {
                Ok((data, status)) => {
                    let to_cache = match (&self.cache, &data) {
                        (Some(_), Some(data)) => {
                            serde_json::to_value(data).ok().filter(|v| !v.is_null())
                        }
                        _ => None,
                    };

                    let committed = self.commit(generation, |s| {
                        s.data = data;
                        s.status_code = Some(status);
                        s.error = None;
                        s.retry_count = 0;
                        s.loading = false;
                    });
                    if !committed {
                        debug!(fetcher = %self.id, "Discarding stale response from {}", target);
                        break;
                    }

                    if let (Some(cache), Some(value)) = (&self.cache, to_cache) {
                        cache.save(&key, value, self.options.cache_ttl).await;
                        debug!(fetcher = %self.id, "Cached {} for {:?}", key, self.options.cache_ttl);
                    }
                    info!(fetcher = %self.id, "Fetched {} ({})", target, status);
                    break;
                }
                Err(err) => {
                    let exhausted = attempt >= self.options.retry || !err.is_retryable();
                    let status = match &err {
                        FetchError::Status { status, .. } => Some(*status),
                        _ => None,
                    };

                    let committed = self.commit(generation, |s| {
                        s.error = Some(err.clone());
                        if status.is_some() {
                            s.status_code = status;
                        }
                        if exhausted {
                            s.loading = false;
                        } else {
                            s.retry_count = attempt + 1;
                        }
                    });
                    if !committed {
                        break;
                    }

                    if exhausted {
                        error!(
                            fetcher = %self.id,
                            "Request to {} failed after {} attempt(s): {}",
                            target,
                            attempt + 1,
                            err
                        );
                        if let Some(metrics) = &self.metrics {
                            metrics.record_failure();
                        }
                        break;
                    }

                    attempt += 1;
                    warn!(
                        fetcher = %self.id,
                        "Request to {} failed: {}; retry {}/{} in {:?}",
                        target,
                        err,
                        attempt,
                        self.options.retry,
                        self.options.retry_delay
                    );
                    if let Some(metrics) = &self.metrics {
                        metrics.record_retry();
                    }

                    tokio::select! {
                        biased;
                        _ = token.cancelled() => {
                            debug!(fetcher = %self.id, "Retry of {} cancelled", target);
                            return;
                        }
                        _ = tokio::time::sleep(self.options.retry_delay) => {}
                    }
                }
            }
        }

        let mut slot = lock(&self.cancel);
        if slot.as_ref().is_some_and(|current| current.same_as(&token)) {
            *slot = None;
        }
    }

    /// One network attempt: send, check status, decode, transform
    async fn attempt(&self, request: HttpRequest) -> Result<(Option<T>, u16), FetchError> {
        let response = self.transport.send(request).await?;
        if !response.is_success() {
            return Err(FetchError::Status {
                status: response.status,
                message: response.reason(),
            });
        }

        let raw: Value = response
            .json()
            .map_err(|e| FetchError::Decode(e.to_string()))?;
        if raw.is_null() {
            return Ok((None, response.status));
        }

        let data = match &self.options.transform {
            Some(transform) => transform(raw).map_err(FetchError::Transform)?,
            None => serde_json::from_value(raw).map_err(|e| FetchError::Decode(e.to_string()))?,
        };
        Ok((Some(data), response.status))
    }

    async fn cached(&self, cache: &ResponseCache, key: &str) -> Option<T> {
        let value = cache.lookup(key).await?;
        match serde_json::from_value(value) {
            Ok(data) => Some(data),
            Err(e) => {
                warn!(fetcher = %self.id, "Cached value for {} does not decode: {}", key, e);
                None
            }
        }
    }

    fn build_request(&self, url: String, overrides: &RequestOptions) -> HttpRequest {
        let opts = self.options.request.merged(overrides);
        let mut request = HttpRequest {
            url,
            method: opts.method.unwrap_or_default(),
            headers: opts.headers,
            body: opts.body,
            timeout: opts.timeout,
        };
        request.ensure_json_content_type();
        request
    }

    /// Apply a state change only if `generation` is still the latest run
    fn commit(&self, generation: u64, apply: impl FnOnce(&mut RequestState<T>)) -> bool {
        self.state.send_if_modified(|state| {
            if self.generation.load(Ordering::SeqCst) != generation {
                return false;
            }
            apply(state);
            true
        })
    }

    fn abort(&self) {
        let token = lock(&self.cancel).take();
        if let Some(token) = token {
            self.generation.fetch_add(1, Ordering::SeqCst);
            token.cancel();
            self.state.send_modify(|s| s.loading = false);
            if let Some(metrics) = &self.metrics {
                metrics.record_abort();
            }
            info!(fetcher = %self.id, "Request aborted");
        }
    }
}
