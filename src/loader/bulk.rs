//! Multi-row conflict-skipping inserts
//!
//! A batch becomes one `INSERT ... VALUES (..), (..) ON CONFLICT DO NOTHING`
//! statement, split only when it would exceed SQLite's bound-parameter limit.

use crate::Result;
use rusqlite::types::Value as SqlValue;
use rusqlite::{params_from_iter, Connection};

/// Highest number of bound parameters SQLite accepts in one statement
pub const MAX_BOUND_PARAMETERS: usize = 32_766;

/// Target of a bulk insert
#[derive(Debug, Clone, Copy)]
pub struct BulkTable {
    pub table: &'static str,
    pub columns: &'static [&'static str],
    /// Conflict target, e.g. `(appid)`; empty for any constraint
    pub conflict_target: &'static str,
}

impl BulkTable {
    /// Rows that fit in one statement
    pub fn rows_per_statement(&self) -> usize {
        (MAX_BOUND_PARAMETERS / self.columns.len().max(1)).max(1)
    }

    fn statement(&self, rows: usize) -> String {
        let placeholder = format!("({})", vec!["?"; self.columns.len()].join(", "));
        let values = vec![placeholder.as_str(); rows].join(", ");
        format!(
            "INSERT INTO {} ({}) VALUES {} ON CONFLICT {} DO NOTHING",
            self.table,
            self.columns.join(", "),
            values,
            self.conflict_target
        )
    }
}

/// Inserts `rows`, skipping those that violate a uniqueness constraint
///
/// Returns the number of rows actually inserted.
pub fn insert_rows(conn: &Connection, target: &BulkTable, rows: &[Vec<SqlValue>]) -> Result<u64> {
    let mut inserted = 0u64;

    for chunk in rows.chunks(target.rows_per_statement()) {
        debug_assert!(chunk.iter().all(|row| row.len() == target.columns.len()));

        let mut stmt = conn.prepare_cached(&target.statement(chunk.len()))?;
        let changed = stmt.execute(params_from_iter(chunk.iter().flatten()))?;
        inserted += changed as u64;
    }

    if !rows.is_empty() {
        tracing::debug!(
            "Inserted {} of {} rows into {}",
            inserted,
            rows.len(),
            target.table
        );
    }

    Ok(inserted)
}
