//! End-of-run summaries for crawls and loads

use crate::record::Dataset;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Counters for one crawl or backfill run
#[derive(Debug, Clone)]
pub struct CrawlSummary {
    pub dataset: Dataset,

    /// Work items handed to the run
    pub universe: usize,

    /// Items skipped because an outcome was already recorded
    pub skipped: usize,

    /// Items fetched this run
    pub targeted: usize,

    pub succeeded: usize,

    /// Failed items keyed by [`RawRecord::kind`](crate::RawRecord::kind)
    pub failed_by_kind: BTreeMap<&'static str, usize>,

    /// HTTP requests sent, retries included
    pub http_attempts: u64,

    /// Artifacts written, in order
    pub artifacts: Vec<PathBuf>,
}

impl CrawlSummary {
    pub fn new(dataset: Dataset) -> Self {
        Self {
            dataset,
            universe: 0,
            skipped: 0,
            targeted: 0,
            succeeded: 0,
            failed_by_kind: BTreeMap::new(),
            http_attempts: 0,
            artifacts: Vec::new(),
        }
    }

    pub fn failed(&self) -> usize {
        self.failed_by_kind.values().sum()
    }

    pub fn record_failure(&mut self, kind: &'static str) {
        *self.failed_by_kind.entry(kind).or_insert(0) += 1;
    }
}

/// Counters for one application load
#[derive(Debug, Clone, Default)]
pub struct LoadSummary {
    pub artifacts: usize,
    pub records: u64,

    /// Well-formed envelopes whose success flag was not true
    pub skipped_unsuccessful: u64,

    /// Elements that were not a usable envelope at all
    pub skipped_malformed: u64,

    /// Records of appids already stored or seen earlier in the load
    pub skipped_duplicates: u64,

    /// New lookup rows per table
    pub lookups_inserted: BTreeMap<&'static str, u64>,

    pub facts_inserted: u64,
    pub junctions_inserted: u64,

    /// Relations dropped because the name had no lookup id
    pub unresolved_relations: u64,
}

/// Counters for one review load
#[derive(Debug, Clone, Default)]
pub struct ReviewLoadSummary {
    pub artifacts: usize,
    pub records: u64,

    /// Records whose embedded success flag is not 1
    pub skipped_unsuccessful: u64,

    /// Records without a usable appid
    pub skipped_malformed: u64,

    /// Records whose application is not in the store, keyed by appid
    pub orphaned: BTreeMap<u64, u64>,

    /// Individual reviews without a recommendation id
    pub skipped_reviews: u64,

    pub reviews_inserted: u64,
}

impl ReviewLoadSummary {
    /// Appids with the most skipped orphan records, most frequent first
    pub fn top_orphans(&self, n: usize) -> Vec<(u64, u64)> {
        let mut orphans: Vec<(u64, u64)> = self.orphaned.iter().map(|(a, c)| (*a, *c)).collect();
        orphans.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        orphans.truncate(n);
        orphans
    }
}

pub fn print_crawl_summary(summary: &CrawlSummary) {
    println!("=== Crawl Summary ({}) ===\n", summary.dataset);
    println!("  Work items:            {}", summary.universe);
    println!("  Already processed:     {}", summary.skipped);
    println!("  Fetched this run:      {}", summary.targeted);
    println!("  Succeeded:             {}", summary.succeeded);
    println!("  Failed:                {}", summary.failed());
    for (kind, count) in &summary.failed_by_kind {
        println!("    {}: {}", kind, count);
    }
    println!("  HTTP requests:         {}", summary.http_attempts);
    println!("  Artifacts written:     {}", summary.artifacts.len());
    for path in &summary.artifacts {
        println!("    - {}", path.display());
    }
    println!();
}

pub fn print_load_summary(summary: &LoadSummary) {
    println!("=== Application Load Summary ===\n");
    println!("  Artifacts:             {}", summary.artifacts);
    println!("  Records read:          {}", summary.records);
    println!("  Skipped (unsuccessful): {}", summary.skipped_unsuccessful);
    println!("  Skipped (malformed):   {}", summary.skipped_malformed);
    println!("  Skipped (duplicate):   {}", summary.skipped_duplicates);
    for (table, count) in &summary.lookups_inserted {
        println!("  New {}: {}", table, count);
    }
    println!("  Applications inserted: {}", summary.facts_inserted);
    println!("  Relations inserted:    {}", summary.junctions_inserted);
    println!("  Unresolved relations:  {}", summary.unresolved_relations);
    println!();
}

pub fn print_review_summary(summary: &ReviewLoadSummary) {
    println!("=== Review Load Summary ===\n");
    println!("  Artifacts:             {}", summary.artifacts);
    println!("  Records read:          {}", summary.records);
    println!("  Skipped (unsuccessful): {}", summary.skipped_unsuccessful);
    println!("  Skipped (malformed):   {}", summary.skipped_malformed);
    println!(
        "  Skipped (unknown app): {} records across {} appids",
        summary.orphaned.values().sum::<u64>(),
        summary.orphaned.len()
    );
    println!("  Reviews without id:    {}", summary.skipped_reviews);
    println!("  Reviews inserted:      {}", summary.reviews_inserted);
    println!();
}
