//! Configuration bag for a [`Fetcher`](super::Fetcher)

use super::url::{ParamValue, Params};
use crate::config::FetchSettings;
use crate::network::{HttpMethod, RequestBody};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Maps the raw JSON payload to the caller's type
pub type Transform<T> = Arc<dyn Fn(serde_json::Value) -> Result<T, String> + Send + Sync>;

/// Options passed straight through to the transport
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub method: Option<HttpMethod>,
    pub headers: HashMap<String, String>,
    pub body: Option<RequestBody>,
    pub timeout: Option<Duration>,
}

impl RequestOptions {
    /// Layer `other` on top of `self`; set fields in `other` win
    pub fn merged(&self, other: &RequestOptions) -> RequestOptions {
        let mut headers = self.headers.clone();
        headers.extend(other.headers.clone());
        RequestOptions {
            method: other.method.or(self.method),
            headers,
            body: other.body.clone().or_else(|| self.body.clone()),
            timeout: other.timeout.or(self.timeout),
        }
    }
}

/// Per-call overrides accepted by `execute`
#[derive(Debug, Clone, Default)]
pub struct ExecuteOverrides {
    pub use_base_url: Option<bool>,
    pub request: RequestOptions,
}

/// Fetch orchestrator configuration
pub struct FetchOptions<T> {
    /// Coalesce `execute` calls made within this window (zero disables)
    pub debounce: Duration,
    pub enable_cache: bool,
    /// Fixed cache key; derived from URL, params and query when unset
    pub cache_key: Option<String>,
    pub cache_ttl: Duration,
    /// Fetch on construction, and on URL changes for dynamic URLs
    pub immediate: bool,
    /// Additional attempts after the first failure
    pub retry: u32,
    /// Constant delay between attempts
    pub retry_delay: Duration,
    pub use_base_url: bool,
    pub transform: Option<Transform<T>>,
    pub params: Params,
    pub query: Params,
    pub request: RequestOptions,
}

impl<T> Default for FetchOptions<T> {
    fn default() -> Self {
        Self {
            debounce: Duration::ZERO,
            enable_cache: false,
            cache_key: None,
            cache_ttl: Duration::from_millis(crate::DEFAULT_CACHE_TTL_MS),
            immediate: true,
            retry: 0,
            retry_delay: Duration::from_millis(crate::DEFAULT_RETRY_DELAY_MS),
            use_base_url: true,
            transform: None,
            params: Params::new(),
            query: Params::new(),
            request: RequestOptions::default(),
        }
    }
}

impl<T> Clone for FetchOptions<T> {
    fn clone(&self) -> Self {
        Self {
            debounce: self.debounce,
            enable_cache: self.enable_cache,
            cache_key: self.cache_key.clone(),
            cache_ttl: self.cache_ttl,
            immediate: self.immediate,
            retry: self.retry,
            retry_delay: self.retry_delay,
            use_base_url: self.use_base_url,
            transform: self.transform.clone(),
            params: self.params.clone(),
            query: self.query.clone(),
            request: self.request.clone(),
        }
    }
}

impl<T> fmt::Debug for FetchOptions<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchOptions")
            .field("debounce", &self.debounce)
            .field("enable_cache", &self.enable_cache)
            .field("cache_key", &self.cache_key)
            .field("cache_ttl", &self.cache_ttl)
            .field("immediate", &self.immediate)
            .field("retry", &self.retry)
            .field("retry_delay", &self.retry_delay)
            .field("use_base_url", &self.use_base_url)
            .field("transform", &self.transform.is_some())
            .field("params", &self.params)
            .field("query", &self.query)
            .field("request", &self.request)
            .finish()
    }
}

impl<T> FetchOptions<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults taken from the `fetch` settings section
    pub fn from_settings(settings: &FetchSettings) -> Self {
        Self {
            cache_ttl: Duration::from_millis(settings.cache_ttl_ms),
            retry_delay: Duration::from_millis(settings.retry_delay_ms),
            ..Self::default()
        }
    }

    pub fn debounce(mut self, window: Duration) -> Self {
        self.debounce = window;
        self
    }

    /// Enable caching with the given time-to-live
    pub fn cache(mut self, ttl: Duration) -> Self {
        self.enable_cache = true;
        self.cache_ttl = ttl;
        self
    }

    pub fn cache_key(mut self, key: impl Into<String>) -> Self {
        self.cache_key = Some(key.into());
        self
    }

    pub fn immediate(mut self, immediate: bool) -> Self {
        self.immediate = immediate;
        self
    }

    pub fn retry(mut self, count: u32, delay: Duration) -> Self {
        self.retry = count;
        self.retry_delay = delay;
        self
    }

    pub fn use_base_url(mut self, use_base_url: bool) -> Self {
        self.use_base_url = use_base_url;
        self
    }

    pub fn transform<F>(mut self, f: F) -> Self
    where
        F: Fn(serde_json::Value) -> Result<T, String> + Send + Sync + 'static,
    {
        self.transform = Some(Arc::new(f));
        self
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    pub fn method(mut self, method: HttpMethod) -> Self {
        self.request.method = Some(method);
        self
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.request.headers.insert(key.into(), value.into());
        self
    }

    pub fn body(mut self, body: RequestBody) -> Self {
        self.request.body = Some(body);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.request.timeout = Some(timeout);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let opts: FetchOptions<()> = FetchOptions::default();
        assert_eq!(opts.debounce, Duration::ZERO);
        assert!(!opts.enable_cache);
        assert_eq!(opts.cache_ttl, Duration::from_secs(300));
        assert!(opts.immediate);
        assert_eq!(opts.retry, 0);
        assert_eq!(opts.retry_delay, Duration::from_secs(1));
        assert!(opts.use_base_url);
    }

    #[test]
    fn test_request_merge() {
        let base = RequestOptions {
            method: Some(HttpMethod::Post),
            headers: HashMap::from([("X-A".to_string(), "1".to_string())]),
            body: None,
            timeout: Some(Duration::from_secs(5)),
        };
        let over = RequestOptions {
            method: None,
            headers: HashMap::from([("X-B".to_string(), "2".to_string())]),
            body: Some(RequestBody::Text("hi".into())),
            timeout: None,
        };
        let merged = base.merged(&over);
        assert_eq!(merged.method, Some(HttpMethod::Post));
        assert_eq!(merged.headers.len(), 2);
        assert_eq!(merged.body, Some(RequestBody::Text("hi".into())));
        assert_eq!(merged.timeout, Some(Duration::from_secs(5)));
    }
}
