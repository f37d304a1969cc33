//! Gap detection between the review and application datasets

use crate::decode::decode_file;
use crate::storage::SqliteStore;
use crate::{HarvestError, Phase, Result};
use serde_json::Value;
use std::collections::BTreeSet;
use std::path::PathBuf;

/// Appids that have review records but no `applications` row, ascending
pub fn find_missing_app_ids(store: &SqliteStore, review_artifacts: &[PathBuf]) -> Result<BTreeSet<u64>> {
    collect_missing(store, review_artifacts).map_err(|e| HarvestError::in_phase(Phase::GapDetection, e))
}

fn collect_missing(store: &SqliteStore, review_artifacts: &[PathBuf]) -> Result<BTreeSet<u64>> {
    let existing = store.existing_app_ids()?;
    tracing::info!("Found {} existing applications", existing.len());

    let mut reviewed = BTreeSet::new();
    for path in review_artifacts {
        tracing::info!("Scanning {} for appids", path.display());
        for element in decode_file::<Value>(path)? {
            if let Some(appid) = element?.get("appid").and_then(Value::as_u64) {
                if appid > 0 {
                    reviewed.insert(appid);
                }
            }
        }
    }
    tracing::info!("Found {} distinct appids in review artifacts", reviewed.len());

    Ok(reviewed
        .into_iter()
        .filter(|appid| !existing.contains(appid))
        .collect())
}
