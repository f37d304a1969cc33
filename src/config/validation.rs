use crate::config::types::{ApiConfig, Config, CrawlerConfig, LoaderConfig};
use crate::ConfigError;
use url::Url;

/// Upper bound for loader batches; one batch is held in memory before insert.
const MAX_LOAD_BATCH_SIZE: usize = 100_000;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_api_config(&config.api)?;
    validate_crawler_config(&config.crawler)?;
    validate_loader_config(&config.loader)?;
    Ok(())
}

/// Validates remote API and retry settings
fn validate_api_config(config: &ApiConfig) -> Result<(), ConfigError> {
    validate_http_url("catalog-url", &config.catalog_url)?;
    validate_http_url("store-base-url", &config.store_base_url)?;

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    if config.max_attempts < 1 || config.max_attempts > 10 {
        return Err(ConfigError::Validation(format!(
            "max-attempts must be between 1 and 10, got {}",
            config.max_attempts
        )));
    }

    if config.backoff_base < 2 {
        return Err(ConfigError::Validation(format!(
            "backoff-base must be >= 2, got {}",
            config.backoff_base
        )));
    }

    // unit * base^n * (base - 1) is the smallest gap between two successive
    // backoffs, so jitter up to unit * (base - 1) keeps them non-decreasing.
    let max_jitter = config
        .backoff_unit_ms
        .saturating_mul(u64::from(config.backoff_base - 1));
    if config.jitter_ms > max_jitter {
        return Err(ConfigError::Validation(format!(
            "jitter-ms must be <= backoff-unit-ms * (backoff-base - 1) = {}ms, got {}ms",
            max_jitter, config.jitter_ms
        )));
    }

    if config.request_timeout_secs < 1 || config.catalog_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "request-timeout-secs and catalog-timeout-secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates crawler output settings
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.batch_size < 1 {
        return Err(ConfigError::Validation(format!(
            "crawler batch-size must be >= 1, got {}",
            config.batch_size
        )));
    }

    if config.state_dir.as_os_str().is_empty() || config.data_dir.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "state-dir and data-dir cannot be empty".to_string(),
        ));
    }

    if config.state_dir == config.data_dir {
        return Err(ConfigError::Validation(
            "state-dir and data-dir must be different directories".to_string(),
        ));
    }

    Ok(())
}

/// Validates loader settings
fn validate_loader_config(config: &LoaderConfig) -> Result<(), ConfigError> {
    if config.database_path.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "database-path cannot be empty".to_string(),
        ));
    }

    for (name, value) in [
        ("loader batch-size", config.batch_size),
        ("review-batch-size", config.review_batch_size),
    ] {
        if value < 1 || value > MAX_LOAD_BATCH_SIZE {
            return Err(ConfigError::Validation(format!(
                "{} must be between 1 and {}, got {}",
                name, MAX_LOAD_BATCH_SIZE, value
            )));
        }
    }

    Ok(())
}

fn validate_http_url(key: &str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} '{}': {}", key, value, e)))?;

    if url.scheme() != "https" && url.scheme() != "http" {
        return Err(ConfigError::InvalidUrl(format!(
            "{} must use http or https, got '{}'",
            key, value
        )));
    }

    Ok(())
}
