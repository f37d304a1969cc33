//! Catalog-Harvest: a resumable catalog crawler and relational loader
//!
//! This crate walks a large, rate-limited remote catalog one work item at a
//! time, persisting progress so that any interruption can be resumed, and
//! then streams the resulting batch artifacts into a normalized SQLite store
//! with idempotent, transactional bulk inserts.

pub mod catalog;
pub mod client;
pub mod config;
pub mod crawler;
pub mod decode;
pub mod loader;
pub mod output;
pub mod record;
pub mod state;
pub mod storage;

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for Catalog-Harvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP error for {url}: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Catalog snapshot error: {0}")]
    Catalog(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Decode error: {0}")]
    Decode(#[from] decode::DecodeError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("State file error for {path}: {source}")]
    State {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write batch artifact {path}: {source}")]
    Artifact {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{phase} failed: {source}")]
    InPhase {
        phase: Phase,
        source: Box<HarvestError>,
    },
}

impl HarvestError {
    /// Tags an error with the phase it occurred in
    pub fn in_phase(phase: Phase, source: HarvestError) -> Self {
        match source {
            // Keep the innermost phase; it is the one that actually failed
            already @ HarvestError::InPhase { .. } => already,
            other => HarvestError::InPhase {
                phase,
                source: Box::new(other),
            },
        }
    }

    /// Returns the phase this error was tagged with, if any
    pub fn phase(&self) -> Option<Phase> {
        match self {
            HarvestError::InPhase { phase, .. } => Some(*phase),
            _ => None,
        }
    }
}

/// Named stages of a run, used to identify where a fatal error happened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Catalog,
    Crawl,
    LookupExtraction,
    LookupPopulation,
    FactInsertion,
    ReviewInsertion,
    GapDetection,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Catalog => "catalog snapshot",
            Phase::Crawl => "crawl",
            Phase::LookupExtraction => "lookup extraction",
            Phase::LookupPopulation => "lookup population",
            Phase::FactInsertion => "fact insertion",
            Phase::ReviewInsertion => "review insertion",
            Phase::GapDetection => "gap detection",
        };
        f.write_str(name)
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Required file not found: {0}")]
    MissingFile(PathBuf),
}

/// Result type alias for Catalog-Harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use record::{Dataset, RawRecord, WorkItem};
pub use state::{ProcessingOutcome, ProcessingState};
