//! Output module for run summaries and reports
//!
//! This module handles:
//! - Crawl and load summary counters, printed at the end of each run
//! - The `stats` report over the store and the state logs

pub mod stats;
mod summary;

pub use stats::{load_statistics, print_statistics, StoreStatistics};
pub use summary::{
    print_crawl_summary, print_load_summary, print_review_summary, CrawlSummary, LoadSummary,
    ReviewLoadSummary,
};
