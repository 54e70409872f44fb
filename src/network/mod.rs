//! HTTP networking module
//!
//! The fetch orchestrator talks to endpoints through the [`Transport`] trait;
//! [`HttpClient`] is the reqwest-backed implementation.

mod client;
mod types;

pub use client::HttpClient;
pub use types::{HttpMethod, HttpRequest, HttpResponse, RequestBody};

use crate::error::FetchError;
use async_trait::async_trait;

/// Something that can perform an HTTP-style request
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform the request. Non-2xx responses are returned as `Ok`;
    /// only transport-level failures are errors.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, FetchError>;
}
