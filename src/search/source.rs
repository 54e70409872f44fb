//! Where the searchable dataset comes from

use crate::error::{DatasetError, FetchError};
use crate::network::{HttpRequest, Transport};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// No-argument async loader of the full document set
#[async_trait]
pub trait DatasetSource<D>: Send + Sync {
    async fn load(&self) -> Result<Vec<D>, DatasetError>;

    /// Name used in log lines
    fn describe(&self) -> String;
}

/// Documents held in memory
pub struct StaticSource<D> {
    docs: Vec<D>,
}

impl<D> StaticSource<D> {
    pub fn new(docs: Vec<D>) -> Self {
        Self { docs }
    }
}

#[async_trait]
impl<D: Clone + Send + Sync> DatasetSource<D> for StaticSource<D> {
    async fn load(&self) -> Result<Vec<D>, DatasetError> {
        Ok(self.docs.clone())
    }

    fn describe(&self) -> String {
        format!("static ({} documents)", self.docs.len())
    }
}

/// JSON array read from a file
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl<D: DeserializeOwned + Send + 'static> DatasetSource<D> for JsonFileSource {
    async fn load(&self) -> Result<Vec<D>, DatasetError> {
        debug!("Reading dataset from {}", self.path.display());
        let bytes = tokio::fs::read(&self.path).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    fn describe(&self) -> String {
        format!("file {}", self.path.display())
    }
}

/// JSON array served by a backend endpoint
pub struct HttpSource {
    transport: Arc<dyn Transport>,
    url: String,
}

impl HttpSource {
    pub fn new(transport: Arc<dyn Transport>, url: impl Into<String>) -> Self {
        Self {
            transport,
            url: url.into(),
        }
    }
}

#[async_trait]
impl<D: DeserializeOwned + Send + 'static> DatasetSource<D> for HttpSource {
    async fn load(&self) -> Result<Vec<D>, DatasetError> {
        let response = self.transport.send(HttpRequest::get(&self.url)).await?;
        if !response.is_success() {
            return Err(FetchError::Status {
                status: response.status,
                message: response.reason(),
            }
            .into());
        }
        Ok(response.json()?)
    }

    fn describe(&self) -> String {
        format!("endpoint {}", self.url)
    }
}

/// Tries the primary source and degrades to the fallback when it fails
pub struct FallbackSource<D> {
    primary: Box<dyn DatasetSource<D>>,
    fallback: Box<dyn DatasetSource<D>>,
}

impl<D> FallbackSource<D> {
    pub fn new(primary: Box<dyn DatasetSource<D>>, fallback: Box<dyn DatasetSource<D>>) -> Self {
        Self { primary, fallback }
    }
}

#[async_trait]
impl<D: Send + Sync> DatasetSource<D> for FallbackSource<D> {
    async fn load(&self) -> Result<Vec<D>, DatasetError> {
        match self.primary.load().await {
            Ok(docs) => Ok(docs),
            Err(e) => {
                warn!(
                    "Dataset source {} failed ({}), falling back to {}",
                    self.primary.describe(),
                    e,
                    self.fallback.describe()
                );
                let docs = self.fallback.load().await?;
                info!("Loaded {} documents from fallback", docs.len());
                Ok(docs)
            }
        }
    }

    fn describe(&self) -> String {
        format!(
            "{} (fallback: {})",
            self.primary.describe(),
            self.fallback.describe()
        )
    }
}
