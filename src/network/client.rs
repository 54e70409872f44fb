//! HTTP client for talking to the news backend

use super::types::{HttpMethod, HttpRequest, HttpResponse, RequestBody};
use super::Transport;
use crate::config::FetchSettings;
use crate::error::FetchError;
use anyhow::Result;
use async_trait::async_trait;
use reqwest::{Client, Response};
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

/// HTTP client wrapper with newsreader-specific configuration
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    default_timeout: Duration,
    default_headers: HashMap<String, String>,
}

impl HttpClient {
    /// Create a new HTTP client with default settings
    pub fn new() -> Result<Self> {
        Self::with_settings(&FetchSettings::default())
    }

    /// Create a new HTTP client with custom settings
    pub fn with_settings(settings: &FetchSettings) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs_f64(settings.request_timeout))
            .user_agent(settings.user_agent.clone())
            .gzip(true)
            .brotli(true)
            .build()?;

        Ok(Self {
            client,
            default_timeout: Duration::from_secs_f64(settings.request_timeout),
            default_headers: settings.default_headers.clone(),
        })
    }

    /// Execute a request
    pub async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, FetchError> {
        let mut req_builder = match request.method {
            HttpMethod::Get => self.client.get(&request.url),
            HttpMethod::Post => self.client.post(&request.url),
            HttpMethod::Put => self.client.put(&request.url),
            HttpMethod::Patch => self.client.patch(&request.url),
            HttpMethod::Delete => self.client.delete(&request.url),
        };

        req_builder = req_builder
            .timeout(request.timeout.unwrap_or(self.default_timeout))
            .header("Accept", "application/json");

        for (key, value) in &self.default_headers {
            req_builder = req_builder.header(key, value);
        }

        // Per-request headers win over defaults
        for (key, value) in &request.headers {
            req_builder = req_builder.header(key, value);
        }

        if let Some(body) = request.body {
            req_builder = match body {
                RequestBody::Json(json) => req_builder.body(json.to_string()),
                RequestBody::Form(data) => req_builder.form(&data),
                RequestBody::Text(text) => req_builder.body(text),
                RequestBody::Bytes(bytes) => req_builder.body(bytes),
            };
        }

        debug!("{} {}", request.method.as_str(), request.url);
        let response = req_builder.send().await?;

        Self::parse_response(response).await
    }

    /// Parse response into HttpResponse
    async fn parse_response(response: Response) -> Result<HttpResponse, FetchError> {
        let status = response.status().as_u16();
        let url = response.url().to_string();

        let mut headers = HashMap::new();
        for (key, value) in response.headers() {
            if let Ok(v) = value.to_str() {
                headers.insert(key.to_string(), v.to_string());
            }
        }

        let text = response.text().await?;

        Ok(HttpResponse {
            status,
            headers,
            text,
            url,
        })
    }
}

#[async_trait]
impl Transport for HttpClient {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, FetchError> {
        self.execute(request).await
    }
}
