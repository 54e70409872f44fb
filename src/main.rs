//! Newsreader command line
//!
//! Runs the fetch orchestrator and the article search engine against the
//! configured backend and dataset.

use anyhow::{bail, Result};
use newsreader::{
    config::{self, Settings},
    fetch::{FetchOptions, Fetcher},
    metrics::Metrics,
    models::Article,
    network::{HttpClient, Transport},
    search::{
        DatasetSource, FallbackSource, HttpSource, JsonFileSource, QueryHistory, SearchEngine,
        SearchOptions,
    },
    storage::{self, KeyValueStore},
};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    match args.first().map(String::as_str) {
        None | Some("-h") | Some("--help") => {
            print_usage();
            return Ok(());
        }
        Some("-V") | Some("--version") => {
            println!("newsreader {}", newsreader::VERSION);
            return Ok(());
        }
        _ => {}
    }

    let settings = config::load()?;
    init_logging(&settings);
    debug!("Loaded configuration for instance: {}", settings.general.instance_name);

    let store = storage::from_settings(&settings.storage);

    match (args[0].as_str(), args.get(1)) {
        ("fetch", Some(url)) => fetch(&settings, store, url).await,
        ("search", Some(_)) => search(&settings, store, &args[1..].join(" ")).await,
        ("history", None) => {
            let history = QueryHistory::load(store, settings.search.history_capacity).await;
            for query in history.entries() {
                println!("{}", query);
            }
            Ok(())
        }
        ("clear-history", None) => {
            let mut history = QueryHistory::load(store, settings.search.history_capacity).await;
            history.clear().await;
            info!("Search history cleared");
            Ok(())
        }
        _ => {
            print_usage();
            bail!("invalid arguments: {}", args.join(" "));
        }
    }
}

fn init_logging(settings: &Settings) {
    let default_level = if settings.general.debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Fetch a document and print it as JSON
async fn fetch(settings: &Settings, store: Arc<dyn KeyValueStore>, url: &str) -> Result<()> {
    let client: Arc<dyn Transport> = Arc::new(HttpClient::with_settings(&settings.fetch)?);
    let metrics = Arc::new(Metrics::new());

    let options = FetchOptions::from_settings(&settings.fetch);
    let ttl = options.cache_ttl;
    let fetcher: Fetcher<Value> = Fetcher::get(
        client,
        url,
        options
            .immediate(false)
            .cache(ttl)
            .retry(2, Duration::from_millis(settings.fetch.retry_delay_ms)),
    )
    .settings(&settings.fetch)
    .store(store)
    .metrics(metrics.clone())
    .build();

    fetcher.execute().await;

    let state = fetcher.state();
    let snapshot = metrics.snapshot();
    debug!(
        "requests={} cache_hits={} retries={}",
        snapshot.requests, snapshot.cache_hits, snapshot.retries
    );

    if let Some(err) = state.error {
        bail!("fetching {} failed: {}", fetcher.resolved_url(), err);
    }
    println!("{}", serde_json::to_string_pretty(&state.data.unwrap_or(Value::Null))?);
    Ok(())
}

/// Run a fuzzy search over the configured dataset and print the hits
async fn search(settings: &Settings, store: Arc<dyn KeyValueStore>, query: &str) -> Result<()> {
    let source = dataset_source(settings)?;
    let engine: Arc<SearchEngine<Article>> = SearchEngine::new(
        source,
        store,
        SearchOptions::from_settings(&settings.search),
    )
    .await;

    engine.search(query).await;

    let state = engine.state();
    if let Some(message) = state.error {
        bail!(message);
    }

    println!("{} result(s) for '{}'", state.total_results, query);
    for article in &state.results {
        println!(
            "  {}  {}",
            article.title.as_deref().unwrap_or("(untitled)"),
            article.author_name().unwrap_or("")
        );
    }
    Ok(())
}

fn dataset_source(settings: &Settings) -> Result<Arc<dyn DatasetSource<Article>>> {
    let search = &settings.search;

    let remote = match &search.dataset_url {
        Some(url) => {
            let client: Arc<dyn Transport> = Arc::new(HttpClient::with_settings(&settings.fetch)?);
            Some(HttpSource::new(client, url.clone()))
        }
        None => None,
    };
    let local = search.dataset_path.as_ref().map(JsonFileSource::new);

    let source: Arc<dyn DatasetSource<Article>> = match (remote, local) {
        (Some(remote), Some(local)) => {
            Arc::new(FallbackSource::<Article>::new(Box::new(remote), Box::new(local)))
        }
        (Some(remote), None) => Arc::new(remote),
        (None, Some(local)) => Arc::new(local),
        (None, None) => {
            bail!("no dataset configured, set search.dataset_path or NEWSREADER_DATASET_PATH")
        }
    };
    Ok(source)
}

/// Print usage information
fn print_usage() {
    println!(
        r#"
Newsreader v{}
Fetch news documents and search articles from the command line

USAGE:
    newsreader <COMMAND> [ARGS]

COMMANDS:
    fetch <URL>        Fetch a document (relative URLs use the base URL) and print it
    search <QUERY>     Fuzzy-search the configured article dataset
    history            Print recent search queries
    clear-history      Forget recent search queries

OPTIONS:
    -h, --help         Print help information
    -V, --version      Print version information

ENVIRONMENT VARIABLES:
    NEWSREADER_SETTINGS_PATH    Path to a settings YAML file
    NEWSREADER_DEBUG            Enable debug logging (true/false)
    NEWSREADER_BASE_URL         Base URL for relative fetches
    NEWSREADER_REQUEST_TIMEOUT  Request timeout in seconds
    NEWSREADER_STORAGE_DIR      Directory for cache and history files
    NEWSREADER_DATASET_PATH     JSON file with the article dataset
    NEWSREADER_DATASET_URL      Backend endpoint serving the article dataset
    RUST_LOG                    Log filter, overrides NEWSREADER_DEBUG
"#,
        newsreader::VERSION
    );
}
