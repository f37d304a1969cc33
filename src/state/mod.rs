//! State module for tracking crawl progress across runs
//!
//! # Components
//!
//! - `ProcessingOutcome`: the terminal outcome recorded for a work item
//! - `DurableIdSet` / `IdLog`: append-only durable id sets
//! - `ProcessingState`: the succeeded/failed pair consulted before every fetch

mod id_log;
mod outcome;
mod tracker;

// Re-export main types
pub use id_log::{DurableIdSet, IdLog};
pub use outcome::ProcessingOutcome;
pub use tracker::{log_path, ProcessingState};
