//! Statistics from the relational store
//!
//! This module provides the row-count report printed by the `stats`
//! command, alongside the crawl progress recorded in the state logs.

use crate::record::Dataset;
use crate::state::ProcessingState;
use crate::storage::SqliteStore;
use crate::Result;
use std::path::Path;

/// Store and crawl statistics summary
#[derive(Debug, Clone)]
pub struct StoreStatistics {
    /// Row count per table, in schema order
    pub table_counts: Vec<(&'static str, u64)>,

    /// (dataset, succeeded, failed) as recorded in the state logs
    pub crawl_progress: Vec<(Dataset, usize, usize)>,
}

/// Loads statistics from the store and the state directory
///
/// # Arguments
///
/// * `store` - The relational store to query
/// * `state_dir` - Directory holding the crawl state logs
pub fn load_statistics(store: &SqliteStore, state_dir: &Path) -> Result<StoreStatistics> {
    let table_counts = store.table_counts()?;

    let mut crawl_progress = Vec::new();
    for dataset in [Dataset::Apps, Dataset::Reviews] {
        let state = ProcessingState::open(state_dir, dataset)?;
        crawl_progress.push((dataset, state.succeeded_count(), state.failed_count()));
    }

    Ok(StoreStatistics {
        table_counts,
        crawl_progress,
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &StoreStatistics) {
    println!("=== Catalog Statistics ===\n");

    println!("Crawl Progress:");
    for (dataset, succeeded, failed) in &stats.crawl_progress {
        let total = succeeded + failed;
        let success_rate = if total > 0 {
            (*succeeded as f64 / total as f64) * 100.0
        } else {
            0.0
        };
        println!(
            "  {}: {} succeeded, {} failed ({:.1}% success)",
            dataset, succeeded, failed, success_rate
        );
    }
    println!();

    println!("Table Row Counts:");
    for (table, count) in &stats.table_counts {
        println!("  {:<24} {}", table, count);
    }
    println!();
}
