use crate::record::Dataset;
use crate::state::id_log::{DurableIdSet, IdLog};
use crate::state::outcome::ProcessingOutcome;
use crate::{HarvestError, Result};
use std::path::{Path, PathBuf};

/// Durable record of which work items were attempted, and how they ended
///
/// Succeeded and failed ids live in separate stores so that failures can be
/// cleared for a retry without touching the succeeded store. Every mark is
/// durable before it becomes visible to [`has_been_processed`].
///
/// [`has_been_processed`]: ProcessingState::has_been_processed
pub struct ProcessingState<S: DurableIdSet = IdLog> {
    succeeded: S,
    failed: S,
}

impl ProcessingState<IdLog> {
    /// Opens the two append-only logs for `dataset` inside `state_dir`
    pub fn open(state_dir: &Path, dataset: Dataset) -> Result<Self> {
        let succeeded = open_log(&log_path(
            state_dir,
            dataset,
            ProcessingOutcome::Succeeded,
        ))?;
        let failed = open_log(&log_path(
            state_dir,
            dataset,
            ProcessingOutcome::PermanentlyFailed,
        ))?;

        tracing::info!(
            "Loaded {} succeeded and {} failed {} ids from state files",
            succeeded.len(),
            failed.len(),
            dataset
        );

        Ok(Self::from_stores(succeeded, failed))
    }
}

impl<S: DurableIdSet> ProcessingState<S> {
    pub fn from_stores(succeeded: S, failed: S) -> Self {
        Self { succeeded, failed }
    }

    /// True if the id has any recorded outcome
    pub fn has_been_processed(&self, id: u64) -> bool {
        self.succeeded.contains(id) || self.failed.contains(id)
    }

    pub fn has_succeeded(&self, id: u64) -> bool {
        self.succeeded.contains(id)
    }

    pub fn mark_succeeded(&mut self, id: u64) -> Result<()> {
        self.mark(id, ProcessingOutcome::Succeeded)
    }

    pub fn mark_failed(&mut self, id: u64) -> Result<()> {
        self.mark(id, ProcessingOutcome::PermanentlyFailed)
    }

    /// Durably records `outcome` for `id`
    pub fn mark(&mut self, id: u64, outcome: ProcessingOutcome) -> Result<()> {
        let store = match outcome {
            ProcessingOutcome::Succeeded => &mut self.succeeded,
            ProcessingOutcome::PermanentlyFailed => &mut self.failed,
        };
        store.insert(id).map_err(|source| HarvestError::State {
            path: store.location(),
            source,
        })
    }

    pub fn succeeded_count(&self) -> usize {
        self.succeeded.len()
    }

    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }
}

/// Path of the log holding `outcome` for `dataset`
pub fn log_path(state_dir: &Path, dataset: Dataset, outcome: ProcessingOutcome) -> PathBuf {
    state_dir.join(format!("{}_{}.txt", outcome.log_stem(), dataset.as_str()))
}

fn open_log(path: &Path) -> Result<IdLog> {
    IdLog::open(path).map_err(|source| HarvestError::State {
        path: path.to_path_buf(),
        source,
    })
}
