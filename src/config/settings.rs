//! Settings structures for newsreader configuration

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Main settings structure matching `newsreader.yml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub fetch: FetchSettings,
    pub search: SearchSettings,
    pub storage: StorageSettings,
}

impl Settings {
    /// Load settings from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let settings: Settings = serde_yaml::from_str(&content)?;
        Ok(settings)
    }

    /// Merge with environment variables (NEWSREADER_* prefix)
    pub fn merge_env(&mut self) {
        if let Ok(val) = std::env::var("NEWSREADER_DEBUG") {
            self.general.debug = val.parse().unwrap_or(false);
        }
        if let Ok(val) = std::env::var("NEWSREADER_BASE_URL") {
            self.fetch.base_url = val;
        }
        if let Ok(val) = std::env::var("NEWSREADER_REQUEST_TIMEOUT") {
            if let Ok(timeout) = val.parse() {
                self.fetch.request_timeout = timeout;
            }
        }
        if let Ok(val) = std::env::var("NEWSREADER_STORAGE_DIR") {
            self.storage.directory = Some(PathBuf::from(val));
        }
        if let Ok(val) = std::env::var("NEWSREADER_DATASET_PATH") {
            self.search.dataset_path = Some(PathBuf::from(val));
        }
        if let Ok(val) = std::env::var("NEWSREADER_DATASET_URL") {
            self.search.dataset_url = Some(val);
        }
    }
}

/// General settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Enable debug logging
    pub debug: bool,
    /// Instance name used in log lines
    pub instance_name: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            debug: false,
            instance_name: "newsreader".to_string(),
        }
    }
}

/// Outgoing request settings used by the fetch orchestrator
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchSettings {
    /// Base API URL prepended to relative request paths
    pub base_url: String,
    /// Default request timeout in seconds
    pub request_timeout: f64,
    /// User agent sent with every request
    pub user_agent: String,
    /// Headers added to every request
    pub default_headers: HashMap<String, String>,
    /// Default cache time-to-live in milliseconds
    pub cache_ttl_ms: u64,
    /// Default delay between retry attempts in milliseconds
    pub retry_delay_ms: u64,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            request_timeout: 10.0,
            user_agent: format!("newsreader/{}", crate::VERSION),
            default_headers: HashMap::new(),
            cache_ttl_ms: crate::DEFAULT_CACHE_TTL_MS,
            retry_delay_ms: crate::DEFAULT_RETRY_DELAY_MS,
        }
    }
}

/// A searchable field path and its relative weight
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchKey {
    /// Dotted path into the document, e.g. `author.name`
    pub path: String,
    /// Relative weight of this field
    #[serde(default = "default_weight")]
    pub weight: f64,
}

impl SearchKey {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            weight: 1.0,
        }
    }

    pub fn weighted(path: impl Into<String>, weight: f64) -> Self {
        Self {
            path: path.into(),
            weight,
        }
    }
}

fn default_weight() -> f64 {
    1.0
}

/// Search behavior settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    /// Fields to index
    pub keys: Vec<SearchKey>,
    /// Match threshold, 0.0 = exact, 1.0 = match anything
    pub threshold: f64,
    /// Minimum number of characters a query must have to match
    pub min_match_char_length: usize,
    /// How far from the start of a field a match may drift before it is penalized fully
    pub distance: usize,
    /// Ignore match position when scoring
    pub ignore_location: bool,
    /// Load the dataset as soon as the engine is created
    pub immediate: bool,
    /// Number of recent queries kept
    pub history_capacity: usize,
    /// JSON file holding the bundled article set
    pub dataset_path: Option<PathBuf>,
    /// Backend endpoint returning the searchable article set
    pub dataset_url: Option<String>,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            keys: default_search_keys(),
            threshold: 0.4,
            min_match_char_length: 2,
            distance: 100,
            ignore_location: false,
            immediate: false,
            history_capacity: crate::search::DEFAULT_HISTORY_CAPACITY,
            dataset_path: None,
            dataset_url: None,
        }
    }
}

/// Which key-value store backs the cache and the query history
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    /// In-process only, lost on exit
    Memory,
    /// One JSON file per key under `directory`
    #[default]
    File,
}

/// Client storage settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub backend: StorageBackend,
    /// Directory for the file backend (defaults to the user data dir)
    pub directory: Option<PathBuf>,
    /// Maximum entries held by the memory backend
    pub memory_capacity: u64,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            directory: None,
            memory_capacity: 10_000,
        }
    }
}

impl StorageSettings {
    /// Resolve the directory used by the file backend
    pub fn resolved_directory(&self) -> PathBuf {
        self.directory.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("newsreader")
        })
    }
}

/// Default searchable fields for articles
fn default_search_keys() -> Vec<SearchKey> {
    vec![
        SearchKey::new("title"),
        SearchKey::new("description"),
        SearchKey::new("content"),
        SearchKey::new("author.name"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.fetch.cache_ttl_ms, 300_000);
        assert_eq!(settings.fetch.retry_delay_ms, 1000);
        assert_eq!(settings.search.threshold, 0.4);
        assert_eq!(settings.search.min_match_char_length, 2);
        assert_eq!(settings.search.history_capacity, 10);
        assert!(!settings.search.immediate);
        assert_eq!(settings.storage.backend, StorageBackend::File);
    }

    #[test]
    fn test_default_keys() {
        let settings = Settings::default();
        let paths: Vec<&str> = settings.search.keys.iter().map(|k| k.path.as_str()).collect();
        assert_eq!(paths, vec!["title", "description", "content", "author.name"]);
    }

    #[test]
    fn test_partial_yaml() {
        let yaml = r#"
fetch:
  base_url: "https://api.example.com/"
search:
  threshold: 0.2
  keys:
    - path: title
      weight: 2.0
    - path: author.name
storage:
  backend: memory
"#;
        let settings: Settings = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(settings.fetch.base_url, "https://api.example.com/");
        assert_eq!(settings.fetch.request_timeout, 10.0);
        assert_eq!(settings.search.threshold, 0.2);
        assert_eq!(settings.search.keys[0], SearchKey::weighted("title", 2.0));
        assert_eq!(settings.search.keys[1].weight, 1.0);
        assert_eq!(settings.storage.backend, StorageBackend::Memory);
    }
}
