//! SQLite connection management
//!
//! This module opens the relational store with the pragmas the loaders rely
//! on, and answers the handful of whole-table questions the loaders and the
//! `stats` command ask.

use crate::storage::schema::{initialize_schema, REPORTED_TABLES};
use crate::Result;
use rusqlite::Connection;
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

/// The relational store
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Opens (creating if needed) the database at `path` and applies the schema
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    /// * `busy_timeout` - How long a statement waits on a locked database
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStore)` - Successfully opened/created database
    /// * `Err(HarvestError)` - Failed to open database
    pub fn open(path: &Path, busy_timeout: Duration) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.busy_timeout(busy_timeout)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;
        tracing::debug!("Opened database {}", path.display());

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    pub fn conn_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }

    /// Every `applications.appid` currently stored
    pub fn existing_app_ids(&self) -> Result<HashSet<u64>> {
        let mut stmt = self.conn.prepare("SELECT appid FROM applications")?;
        let ids = stmt
            .query_map([], |row| row.get::<_, i64>(0))?
            .map(|id| id.map(|id| id as u64))
            .collect::<std::result::Result<HashSet<_>, _>>()?;
        Ok(ids)
    }

    /// Number of rows in `table`
    pub fn count_rows(&self, table: &str) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
                row.get(0)
            })?;
        Ok(count as u64)
    }

    /// Row counts of every table in the schema, in display order
    pub fn table_counts(&self) -> Result<Vec<(&'static str, u64)>> {
        REPORTED_TABLES
            .iter()
            .map(|table| Ok((*table, self.count_rows(table)?)))
            .collect()
    }
}
