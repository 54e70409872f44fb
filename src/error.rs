//! Error types shared across the crate

use thiserror::Error;

/// Errors produced while fetching a document.
///
/// Clonable so it can be stored inside observable request state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// No URL was configured and none was passed to `execute`
    #[error("URL is required")]
    MissingUrl,

    /// Network level failure (connect, timeout, TLS...)
    #[error("Transport error: {0}")]
    Transport(String),

    /// The endpoint answered with a non-success status
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// The response body was not valid JSON
    #[error("Failed to decode response: {0}")]
    Decode(String),

    /// The transform hook rejected the payload
    #[error("Failed to transform response: {0}")]
    Transform(String),

    /// The request was cancelled by `abort`
    #[error("Request aborted")]
    Aborted,
}

impl FetchError {
    /// Whether another attempt may succeed
    pub fn is_retryable(&self) -> bool {
        !matches!(self, FetchError::MissingUrl | FetchError::Aborted)
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        FetchError::Transport(err.to_string())
    }
}

/// Errors from a key-value store. Callers downgrade these to misses.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Errors raised while matching a query against the index
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SearchError {
    #[error("Search execution failed: {0}")]
    Execution(String),
}

/// Errors raised while loading the searchable dataset
#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("Failed to read dataset: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse dataset: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Failed to fetch dataset: {0}")]
    Fetch(#[from] FetchError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable() {
        assert!(FetchError::Transport("reset".into()).is_retryable());
        assert!(FetchError::Status {
            status: 503,
            message: "Service Unavailable".into()
        }
        .is_retryable());
        assert!(!FetchError::MissingUrl.is_retryable());
        assert!(!FetchError::Aborted.is_retryable());
    }

    #[test]
    fn test_display() {
        assert_eq!(FetchError::MissingUrl.to_string(), "URL is required");
        let err = FetchError::Status {
            status: 404,
            message: "Not Found".into(),
        };
        assert_eq!(err.to_string(), "HTTP 404: Not Found");
    }
}
