//! Storage module for the relational catalog store
//!
//! This module handles:
//! - SQLite database initialization and schema management
//! - Connection pragmas (WAL, foreign keys, busy timeout)
//! - Whole-table queries used by the loaders and reports

mod schema;
mod sqlite;

pub use schema::{initialize_schema, REPORTED_TABLES, SCHEMA_SQL};
pub use sqlite::SqliteStore;

use crate::config::LoaderConfig;
use crate::Result;

/// Opens the store configured in `[loader]`
pub fn open_store(config: &LoaderConfig) -> Result<SqliteStore> {
    SqliteStore::open(&config.database_path, config.busy_timeout())
}
