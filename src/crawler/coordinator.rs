//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the crawl loop that coordinates:
//! - Filtering the work list against the durable state logs
//! - Fetching each remaining item through the throttled client
//! - Recording every outcome the moment it is known
//! - Buffering successes and flushing them as batch artifacts

use crate::catalog;
use crate::client::ThrottledClient;
use crate::config::Config;
use crate::crawler::batch::BatchWriter;
use crate::output::CrawlSummary;
use crate::record::{Dataset, RawRecord, WorkItem};
use crate::state::{DurableIdSet, IdLog, ProcessingState};
use crate::{HarvestError, Phase, Result};
use serde_json::Value;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Items between two progress log lines
const PROGRESS_INTERVAL: usize = 100;

/// Which recorded outcomes keep an id from being fetched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Exclusion {
    /// Regular crawl: any recorded outcome is final
    AnyOutcome,
    /// Backfill: only successes are final, failures are retried
    SucceededOnly,
}

impl Exclusion {
    fn excludes<S: DurableIdSet>(&self, state: &ProcessingState<S>, id: u64) -> bool {
        match self {
            Self::AnyOutcome => state.has_been_processed(id),
            Self::SucceededOnly => state.has_succeeded(id),
        }
    }
}

/// Sequential, resumable crawler for one dataset
pub struct Crawler<S: DurableIdSet = IdLog> {
    client: ThrottledClient,
    state: ProcessingState<S>,
    writer: BatchWriter,
    dataset: Dataset,
    batch_size: usize,
    buffer: Vec<Value>,
}

impl Crawler<IdLog> {
    /// Creates a crawler for `dataset` from the configuration
    ///
    /// # Arguments
    ///
    /// * `config` - The validated configuration
    /// * `dataset` - Which remote dataset to harvest
    ///
    /// # Returns
    ///
    /// * `Ok(Crawler)` - State logs loaded, data directory ready
    /// * `Err(HarvestError)` - Failed to initialize
    pub fn open(config: &Config, dataset: Dataset) -> Result<Self> {
        let client = ThrottledClient::new(&config.api)?;
        let state = ProcessingState::open(&config.crawler.state_dir, dataset)?;
        let writer = BatchWriter::open(&config.crawler.data_dir, dataset)?;

        Ok(Self::new(
            client,
            state,
            writer,
            dataset,
            config.crawler.batch_size,
        ))
    }
}

impl<S: DurableIdSet> Crawler<S> {
    pub fn new(
        client: ThrottledClient,
        state: ProcessingState<S>,
        writer: BatchWriter,
        dataset: Dataset,
        batch_size: usize,
    ) -> Self {
        Self {
            client,
            state,
            writer,
            dataset,
            batch_size: batch_size.max(1),
            buffer: Vec::with_capacity(batch_size.max(1)),
        }
    }

    /// Loads the work-item universe, downloading the catalog on first use
    pub async fn load_catalog(&mut self, state_dir: &Path) -> Result<Vec<WorkItem>> {
        catalog::load_work_items(&mut self.client, state_dir)
            .await
            .map_err(|e| HarvestError::in_phase(Phase::Catalog, e))
    }

    /// Crawls every work item that has no recorded outcome yet
    pub async fn run(&mut self, items: &[WorkItem]) -> Result<CrawlSummary> {
        let ids: Vec<u64> = items.iter().map(|item| item.appid).collect();
        self.crawl(&ids, Exclusion::AnyOutcome)
            .await
            .map_err(|e| HarvestError::in_phase(Phase::Crawl, e))
    }

    /// Crawls an explicit id list, retrying ids that previously failed
    pub async fn backfill(&mut self, ids: &[u64]) -> Result<CrawlSummary> {
        self.crawl(ids, Exclusion::SucceededOnly)
            .await
            .map_err(|e| HarvestError::in_phase(Phase::Crawl, e))
    }

    /// Writes any buffered records as a final artifact
    ///
    /// Buffered records are already marked succeeded, so this is what must
    /// run when a crawl stops early.
    pub fn flush_pending(&mut self) -> Result<Option<PathBuf>> {
        if self.buffer.is_empty() {
            return Ok(None);
        }

        let path = self.writer.write(&self.buffer)?;
        self.buffer.clear();
        Ok(Some(path))
    }

    /// Records fetched but not yet written to an artifact
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn state(&self) -> &ProcessingState<S> {
        &self.state
    }

    async fn crawl(&mut self, ids: &[u64], exclusion: Exclusion) -> Result<CrawlSummary> {
        let mut summary = CrawlSummary::new(self.dataset);
        summary.universe = ids.len();

        let mut seen = HashSet::with_capacity(ids.len());
        let targets: Vec<u64> = ids
            .iter()
            .copied()
            .filter(|id| seen.insert(*id) && !exclusion.excludes(&self.state, *id))
            .collect();
        summary.skipped = ids.len() - targets.len();

        tracing::info!(
            "{} {} items to fetch ({} of {} already processed or duplicated)",
            targets.len(),
            self.dataset,
            summary.skipped,
            summary.universe
        );

        let start_time = Instant::now();
        let total = targets.len();

        for (position, id) in targets.into_iter().enumerate() {
            // The list was filtered up front, but the state is the authority
            if exclusion.excludes(&self.state, id) {
                summary.skipped += 1;
                continue;
            }

            summary.targeted += 1;
            let report = self.client.fetch_with_report(self.dataset, id).await;
            summary.http_attempts += u64::from(report.attempts);

            match report.record {
                RawRecord::Success(element) => {
                    self.buffer.push(element);
                    self.state.mark_succeeded(id)?;
                    summary.succeeded += 1;
                    tracing::debug!("Fetched {} {}", self.dataset, id);

                    if self.buffer.len() >= self.batch_size {
                        if let Some(path) = self.flush_pending()? {
                            summary.artifacts.push(path);
                        }
                    }
                }
                other => {
                    tracing::info!("{} {}: {}", self.dataset, id, other);
                    self.state.mark_failed(id)?;
                    summary.record_failure(other.kind());
                }
            }

            let done = position + 1;
            if done % PROGRESS_INTERVAL == 0 {
                let rate = done as f64 / start_time.elapsed().as_secs_f64();
                tracing::info!(
                    "Progress: {}/{} {} items, {} succeeded, {} failed, {:.2} items/sec",
                    done,
                    total,
                    self.dataset,
                    summary.succeeded,
                    summary.failed(),
                    rate
                );
            }
        }

        if let Some(path) = self.flush_pending()? {
            summary.artifacts.push(path);
        }

        tracing::info!(
            "Crawl of {} completed: {} succeeded, {} failed, {} artifacts in {:?}",
            self.dataset,
            summary.succeeded,
            summary.failed(),
            summary.artifacts.len(),
            start_time.elapsed()
        );

        Ok(summary)
    }
}
