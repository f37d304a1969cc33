//! Work items and fetch outcomes
//!
//! A [`WorkItem`] names one unit of fetchable data; a [`RawRecord`] is what
//! fetching it produced. Consumers match on the record exhaustively instead of
//! probing a loosely shaped response for keys.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// One entry of the catalog universe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    pub appid: u64,
    #[serde(default)]
    pub name: String,
}

impl WorkItem {
    pub fn new(appid: u64, name: impl Into<String>) -> Self {
        Self {
            appid,
            name: name.into(),
        }
    }
}

/// The remote datasets the crawler knows how to harvest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dataset {
    /// Per-application store details
    Apps,
    /// Per-application user reviews, which reference apps by id
    Reviews,
}

impl Dataset {
    /// File name prefix of this dataset's batch artifacts
    pub fn artifact_prefix(&self) -> &'static str {
        match self {
            Self::Apps => "steam_data_batch",
            Self::Reviews => "reviews_batch",
        }
    }

    /// Short name used in state file names and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Apps => "apps",
            Self::Reviews => "reviews",
        }
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dataset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "apps" => Ok(Self::Apps),
            "reviews" => Ok(Self::Reviews),
            other => Err(format!("unknown dataset '{}' (expected apps or reviews)", other)),
        }
    }
}

/// Outcome of fetching one work item
#[derive(Debug, Clone, PartialEq)]
pub enum RawRecord {
    /// The item was fetched and is logically present; holds the artifact element
    Success(Value),

    /// The remote refused access (HTTP 401/403)
    Restricted { status: u16 },

    /// The item does not exist or is logically absent
    NotFound { status: Option<u16> },

    /// HTTP 200, but the body was not the expected shape
    Malformed { detail: String },

    /// Retry budget exhausted on rate limiting, server or network errors
    TransientFailure { detail: String },
}

impl RawRecord {
    /// Short label for logs and summary counters
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Success(_) => "success",
            Self::Restricted { .. } => "restricted",
            Self::NotFound { .. } => "not_found",
            Self::Malformed { .. } => "malformed",
            Self::TransientFailure { .. } => "transient_failure",
        }
    }
}

impl fmt::Display for RawRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success(_) => write!(f, "success"),
            Self::Restricted { status } => write!(f, "restricted (HTTP {})", status),
            Self::NotFound { status: Some(status) } => write!(f, "not found (HTTP {})", status),
            Self::NotFound { status: None } => write!(f, "not found (unsuccessful response)"),
            Self::Malformed { detail } => write!(f, "malformed response: {}", detail),
            Self::TransientFailure { detail } => write!(f, "transient failure: {}", detail),
        }
    }
}
