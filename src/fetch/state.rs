//! Observable request state

use crate::error::FetchError;

/// Snapshot of one orchestrator's state, published through a watch channel
#[derive(Debug, Clone, PartialEq)]
pub struct RequestState<T> {
    /// Last successfully fetched (and transformed) payload
    pub data: Option<T>,
    /// True from request start until success or retry budget exhaustion
    pub loading: bool,
    /// Last failure; cleared when a run starts or a cached value is served
    pub error: Option<FetchError>,
    /// Status code of the last response
    pub status_code: Option<u16>,
    /// Retries performed by the current run
    pub retry_count: u32,
}

impl<T> Default for RequestState<T> {
    fn default() -> Self {
        Self {
            data: None,
            loading: false,
            error: None,
            status_code: None,
            retry_count: 0,
        }
    }
}

impl<T> RequestState<T> {
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}
