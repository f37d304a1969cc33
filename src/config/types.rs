use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure for Catalog-Harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    pub crawler: CrawlerConfig,
    pub loader: LoaderConfig,
}

/// Remote catalog API and politeness settings
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Endpoint returning the full work-item universe
    #[serde(rename = "catalog-url")]
    pub catalog_url: String,

    /// Base URL of the per-item detail and review endpoints
    #[serde(rename = "store-base-url")]
    pub store_base_url: String,

    /// User-Agent header sent with every request
    #[serde(rename = "user-agent")]
    pub user_agent: String,

    /// Minimum time between two consecutive requests (milliseconds)
    #[serde(rename = "request-delay-ms", default = "default_request_delay_ms")]
    pub request_delay_ms: u64,

    /// Per-request timeout for detail calls (seconds)
    #[serde(rename = "request-timeout-secs", default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Timeout for the one-off catalog download (seconds)
    #[serde(rename = "catalog-timeout-secs", default = "default_catalog_timeout_secs")]
    pub catalog_timeout_secs: u64,

    /// Total attempts per item for retryable failures
    #[serde(rename = "max-attempts", default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Exponential backoff base
    #[serde(rename = "backoff-base", default = "default_backoff_base")]
    pub backoff_base: u32,

    /// Backoff unit: delay before the first retry, without jitter (milliseconds)
    #[serde(rename = "backoff-unit-ms", default = "default_backoff_unit_ms")]
    pub backoff_unit_ms: u64,

    /// Upper bound of the random jitter added to each backoff (milliseconds)
    #[serde(rename = "jitter-ms", default = "default_jitter_ms")]
    pub jitter_ms: u64,
}

impl ApiConfig {
    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn catalog_timeout(&self) -> Duration {
        Duration::from_secs(self.catalog_timeout_secs)
    }
}

/// Crawl output locations and batching
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Directory holding the state logs and the catalog cache
    #[serde(rename = "state-dir")]
    pub state_dir: PathBuf,

    /// Directory receiving batch artifacts
    #[serde(rename = "data-dir")]
    pub data_dir: PathBuf,

    /// Number of successful records per batch artifact
    #[serde(rename = "batch-size", default = "default_crawl_batch_size")]
    pub batch_size: usize,
}

/// Relational loader settings
#[derive(Debug, Clone, Deserialize)]
pub struct LoaderConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: PathBuf,

    /// Application records per bulk insert
    #[serde(rename = "batch-size", default = "default_load_batch_size")]
    pub batch_size: usize,

    /// Review rows per bulk insert
    #[serde(rename = "review-batch-size", default = "default_review_batch_size")]
    pub review_batch_size: usize,

    /// How long SQLite waits on a locked database (seconds)
    #[serde(rename = "busy-timeout-secs", default = "default_busy_timeout_secs")]
    pub busy_timeout_secs: u64,
}

impl LoaderConfig {
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_secs(self.busy_timeout_secs)
    }
}

fn default_request_delay_ms() -> u64 {
    1500
}

fn default_request_timeout_secs() -> u64 {
    20
}

fn default_catalog_timeout_secs() -> u64 {
    60
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_base() -> u32 {
    5
}

fn default_backoff_unit_ms() -> u64 {
    1000
}

fn default_jitter_ms() -> u64 {
    500
}

fn default_crawl_batch_size() -> usize {
    500
}

fn default_load_batch_size() -> usize {
    1000
}

fn default_review_batch_size() -> usize {
    2000
}

fn default_busy_timeout_secs() -> u64 {
    30
}
