//! Two-pass application load
//!
//! 1. Lookup extraction: stream every artifact, collecting lookup names
//! 2. Lookup population: insert missing names, read back name → id maps
//! 3. Fact insertion: stream again, bulk-inserting `applications` rows and
//!    their junction rows in one transaction
//!
//! Each database phase commits on its own; an error rolls back the phase in
//! flight and is reported with its [`Phase`].

use crate::config::LoaderConfig;
use crate::decode::decode_file;
use crate::loader::bulk::{insert_rows, BulkTable};
use crate::loader::resolver::{upsert_and_map, LookupMaps, LookupTable, LookupValues};
use crate::loader::rows::{classify_element, AppElement, ApplicationRow, APPLICATION_COLUMNS};
use crate::output::LoadSummary;
use crate::storage::SqliteStore;
use crate::{HarvestError, Phase, Result};
use rusqlite::types::Value as SqlValue;
use rusqlite::Connection;
use serde_json::Value;
use std::collections::HashSet;
use std::path::PathBuf;

const APPLICATIONS: BulkTable = BulkTable {
    table: "applications",
    columns: APPLICATION_COLUMNS,
    conflict_target: "(appid)",
};

/// Loads application artifacts into the store
pub fn load_applications(
    store: &mut SqliteStore,
    artifacts: &[PathBuf],
    config: &LoaderConfig,
) -> Result<LoadSummary> {
    let mut summary = LoadSummary {
        artifacts: artifacts.len(),
        ..LoadSummary::default()
    };

    if artifacts.is_empty() {
        tracing::warn!("No application artifacts to load");
        return Ok(summary);
    }

    tracing::info!("--- Phase 1: Extracting lookup values ---");
    let values = extract_lookup_values(artifacts)
        .map_err(|e| HarvestError::in_phase(Phase::LookupExtraction, e))?;

    tracing::info!("--- Phase 2: Populating lookup tables ---");
    let (maps, inserted) = upsert_and_map(store.conn_mut(), &values)
        .map_err(|e| HarvestError::in_phase(Phase::LookupPopulation, e))?;
    summary.lookups_inserted = inserted;

    tracing::info!("--- Phase 3: Inserting application and relational data ---");
    let stored = store
        .existing_app_ids()
        .map_err(|e| HarvestError::in_phase(Phase::FactInsertion, e))?;
    insert_facts(
        store.conn_mut(),
        artifacts,
        &maps,
        stored,
        config.batch_size,
        &mut summary,
    )
    .map_err(|e| HarvestError::in_phase(Phase::FactInsertion, e))?;

    tracing::info!(
        "Finished loading applications: {} inserted, {} skipped ({} unsuccessful, {} malformed, {} already stored)",
        summary.facts_inserted,
        summary.skipped_unsuccessful + summary.skipped_malformed + summary.skipped_duplicates,
        summary.skipped_unsuccessful,
        summary.skipped_malformed,
        summary.skipped_duplicates
    );
    if summary.unresolved_relations > 0 {
        tracing::warn!(
            "{} relations dropped because their name had no lookup id",
            summary.unresolved_relations
        );
    }

    Ok(summary)
}

/// Collects the distinct lookup names of every valid record
pub fn extract_lookup_values(artifacts: &[PathBuf]) -> Result<LookupValues> {
    let mut values = LookupValues::default();

    for path in artifacts {
        tracing::info!("Scanning {} for unique entities", path.display());
        for element in decode_file::<Value>(path)? {
            if let AppElement::Valid { data, .. } = classify_element(&element?) {
                values.collect_from(data);
            }
        }
    }

    for table in LookupTable::ALL {
        tracing::debug!("Found {} distinct {}", values.len(table), table.table_name());
    }
    Ok(values)
}

/// Rows accumulated for one bulk flush
struct PendingBatch {
    facts: Vec<Vec<SqlValue>>,
    junctions: Vec<(LookupTable, Vec<Vec<SqlValue>>)>,
}

impl PendingBatch {
    fn new() -> Self {
        Self {
            facts: Vec::new(),
            junctions: LookupTable::ALL.iter().map(|t| (*t, Vec::new())).collect(),
        }
    }

    fn push_relation(&mut self, table: LookupTable, appid: u64, id: i64) {
        if let Some((_, rows)) = self.junctions.iter_mut().find(|(t, _)| *t == table) {
            rows.push(vec![SqlValue::Integer(appid as i64), SqlValue::Integer(id)]);
        }
    }

    /// Facts first, so junction rows always find their application
    fn flush(&mut self, conn: &Connection, summary: &mut LoadSummary) -> Result<()> {
        if self.facts.is_empty() {
            return Ok(());
        }

        summary.facts_inserted += insert_rows(conn, &APPLICATIONS, &self.facts)?;
        for (table, rows) in &self.junctions {
            summary.junctions_inserted += insert_rows(conn, &table.junction(), rows)?;
        }

        self.facts.clear();
        for (_, rows) in &mut self.junctions {
            rows.clear();
        }
        Ok(())
    }
}

/// Inserts one fact row per appid not in `stored`, with its relations
///
/// The first record of an appid wins; later copies (a backfill re-fetch, or
/// an app loaded by an earlier run) are skipped along with their relations,
/// so a stored application never mixes two versions' developers or genres.
fn insert_facts(
    conn: &mut Connection,
    artifacts: &[PathBuf],
    maps: &LookupMaps,
    mut stored: HashSet<u64>,
    batch_size: usize,
    summary: &mut LoadSummary,
) -> Result<()> {
    let tx = conn.transaction()?;
    let mut batch = PendingBatch::new();

    for path in artifacts {
        tracing::info!("Loading {}", path.display());

        for element in decode_file::<Value>(path)? {
            let element = element?;
            summary.records += 1;

            let (appid, name, data, fetched_at) = match classify_element(&element) {
                AppElement::Valid {
                    appid,
                    name,
                    data,
                    fetched_at,
                } => (appid, name, data, fetched_at),
                AppElement::Unsuccessful => {
                    summary.skipped_unsuccessful += 1;
                    continue;
                }
                AppElement::Malformed(reason) => {
                    tracing::debug!("Skipping malformed record in {}: {}", path.display(), reason);
                    summary.skipped_malformed += 1;
                    continue;
                }
            };

            if !stored.insert(appid) {
                summary.skipped_duplicates += 1;
                continue;
            }

            batch
                .facts
                .push(ApplicationRow::derive(appid, name, data, fetched_at).into_values());

            for table in LookupTable::ALL {
                for entity in table.names(data) {
                    match maps.resolve(table, entity) {
                        Some(id) => batch.push_relation(table, appid, id),
                        None => summary.unresolved_relations += 1,
                    }
                }
            }

            if batch.facts.len() >= batch_size {
                batch.flush(&tx, summary)?;
            }
        }
    }

    batch.flush(&tx, summary)?;
    tx.commit()?;
    Ok(())
}
