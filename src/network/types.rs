//! Request and response types passed through a [`Transport`](super::Transport)

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// HTTP method
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }
}

/// Request body types
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    /// Structured value, serialized to JSON
    Json(serde_json::Value),
    /// `application/x-www-form-urlencoded` pairs
    Form(Vec<(String, String)>),
    /// Plain text sent as-is
    Text(String),
    /// Raw bytes sent as-is
    Bytes(Vec<u8>),
}

/// A fully resolved outgoing request
#[derive(Debug, Clone, Default)]
pub struct HttpRequest {
    pub url: String,
    pub method: HttpMethod,
    pub headers: HashMap<String, String>,
    pub body: Option<RequestBody>,
    /// Per-request timeout; the client default applies when unset
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    /// Create a GET request
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Set the method
    pub fn method(mut self, method: HttpMethod) -> Self {
        self.method = method;
        self
    }

    /// Add a header
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Set the body
    pub fn body(mut self, body: RequestBody) -> Self {
        self.body = Some(body);
        self
    }

    /// Look up a header by case-insensitive name
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// JSON bodies get `Content-Type: application/json` unless the caller set one
    pub fn ensure_json_content_type(&mut self) {
        if matches!(self.body, Some(RequestBody::Json(_)))
            && self.header_value("content-type").is_none()
        {
            self.headers
                .insert("Content-Type".to_string(), "application/json".to_string());
        }
    }
}

/// HTTP response as seen by the orchestrator
#[derive(Debug, Clone, Default)]
pub struct HttpResponse {
    /// HTTP status code
    pub status: u16,
    /// Response headers
    pub headers: HashMap<String, String>,
    /// Response body as text
    pub text: String,
    /// Response URL (after redirects)
    pub url: String,
}

impl HttpResponse {
    /// Build a 200 response with a JSON body, mostly useful for tests and fixtures
    pub fn json_ok(value: &serde_json::Value) -> Self {
        Self {
            status: 200,
            text: value.to_string(),
            ..Default::default()
        }
    }

    /// Parse response as JSON. An empty body is `null`.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> serde_json::Result<T> {
        if self.text.trim().is_empty() {
            return serde_json::from_value(serde_json::Value::Null);
        }
        serde_json::from_str(&self.text)
    }

    /// Check if response is successful (2xx)
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Short human-readable reason for a failed status
    pub fn reason(&self) -> String {
        reqwest::StatusCode::from_u16(self.status)
            .ok()
            .and_then(|s| s.canonical_reason())
            .unwrap_or("Request failed")
            .to_string()
    }
}
