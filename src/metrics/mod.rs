//! Metrics collection module
//!
//! Tracks request counts, cache effectiveness and per-host response times.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

/// Rolling window of response times kept per host
const RESPONSE_TIME_WINDOW: usize = 100;

/// Fetch metrics collector, shareable between orchestrators
#[derive(Debug, Default)]
pub struct Metrics {
    requests: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    retries: AtomicU64,
    failures: AtomicU64,
    aborts: AtomicU64,
    response_times: RwLock<HashMap<String, Vec<u64>>>,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one network attempt against `host`
    pub fn record_request(&self, host: &str, time_ms: u64) {
        self.requests.fetch_add(1, Ordering::Relaxed);

        let mut times = self
            .response_times
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let entry = times.entry(host.to_string()).or_default();
        if entry.len() >= RESPONSE_TIME_WINDOW {
            entry.remove(0);
        }
        entry.push(time_ms);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    /// A run that ended with its retry budget exhausted
    pub fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_abort(&self) {
        self.aborts.fetch_add(1, Ordering::Relaxed);
    }

    /// Average response time for a host
    pub fn get_avg_response_time(&self, host: &str) -> Option<u64> {
        let times = self
            .response_times
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        times.get(host).and_then(|t| {
            if t.is_empty() {
                None
            } else {
                Some(t.iter().sum::<u64>() / t.len() as u64)
            }
        })
    }

    /// Share of cache lookups that hit, in percent
    pub fn cache_hit_ratio(&self) -> f64 {
        let hits = self.cache_hits.load(Ordering::Relaxed);
        let total = hits + self.cache_misses.load(Ordering::Relaxed);
        if total == 0 {
            0.0
        } else {
            (hits as f64 / total as f64) * 100.0
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            aborts: self.aborts.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub requests: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub retries: u64,
    pub failures: u64,
    pub aborts: u64,
}

/// Host part of a URL, or `relative` for path-only URLs
pub fn host_of(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| "relative".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics() {
        let metrics = Metrics::new();

        metrics.record_request("api.example.com", 100);
        metrics.record_request("api.example.com", 300);
        metrics.record_cache_miss();
        metrics.record_cache_hit();
        metrics.record_retry();

        let snap = metrics.snapshot();
        assert_eq!(snap.requests, 2);
        assert_eq!(snap.retries, 1);
        assert_eq!(metrics.get_avg_response_time("api.example.com"), Some(200));
        assert_eq!(metrics.get_avg_response_time("other"), None);
        assert_eq!(metrics.cache_hit_ratio(), 50.0);
    }

    #[test]
    fn test_window() {
        let metrics = Metrics::new();
        for _ in 0..RESPONSE_TIME_WINDOW {
            metrics.record_request("h", 0);
        }
        metrics.record_request("h", 1000);
        assert_eq!(metrics.get_avg_response_time("h"), Some(10));
    }

    #[test]
    fn test_host_of() {
        assert_eq!(host_of("https://api.example.com/feeds?x=1"), "api.example.com");
        assert_eq!(host_of("/api/feeds"), "relative");
    }
}
