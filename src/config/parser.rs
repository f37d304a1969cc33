use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Reads, parses and validates the configuration at `path`
///
/// # Errors
///
/// `MissingFile` when nothing exists at `path`, `Parse` for malformed TOML,
/// `Validation`/`InvalidUrl` when a value is out of range.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    load_config_with_hash(path).map(|(config, _)| config)
}

/// Loads a configuration along with the SHA-256 of the exact bytes parsed
///
/// The hash is logged at startup so a config change between a crawl and its
/// resume shows up in the run logs.
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let content = read_config_file(path)?;
    let config = parse_config(&content)?;
    Ok((config, digest(&content)))
}

/// SHA-256 of the configuration file, hex encoded
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    read_config_file(path).map(|content| digest(&content))
}

fn read_config_file(path: &Path) -> Result<String, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::MissingFile(path.to_path_buf()));
    }
    Ok(std::fs::read_to_string(path)?)
}

fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(content)?;
    validate(&config)?;
    Ok(config)
}

fn digest(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}
