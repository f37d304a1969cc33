/// Processing outcome definitions for work items
///
/// An outcome is written once per id, the moment it is known, and is never
/// revisited by the regular crawl.
use std::fmt;

/// Terminal outcome recorded for a work item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessingOutcome {
    /// The item was fetched and buffered for a batch artifact
    Succeeded,

    /// The item failed terminally (restricted, absent, malformed, or out of retries)
    PermanentlyFailed,
}

impl ProcessingOutcome {
    /// File stem of the append-only log holding this outcome
    pub fn log_stem(&self) -> &'static str {
        match self {
            Self::Succeeded => "processed",
            Self::PermanentlyFailed => "failed",
        }
    }
}

impl fmt::Display for ProcessingOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Succeeded => write!(f, "succeeded"),
            Self::PermanentlyFailed => write!(f, "permanently failed"),
        }
    }
}
