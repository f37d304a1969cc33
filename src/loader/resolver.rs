//! Lookup entity resolution
//!
//! Pass one of the application load: collect every distinct developer,
//! publisher, genre and category name, insert the missing ones, and read
//! back a name → id map per table so pass two never queries per relation.

use crate::loader::bulk::{insert_rows, BulkTable};
use crate::Result;
use rusqlite::types::Value as SqlValue;
use rusqlite::Connection;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// The deduplicated entity tables referenced by applications
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LookupTable {
    Developers,
    Publishers,
    Genres,
    Categories,
}

impl LookupTable {
    pub const ALL: [LookupTable; 4] = [
        Self::Developers,
        Self::Publishers,
        Self::Genres,
        Self::Categories,
    ];

    pub fn table_name(&self) -> &'static str {
        match self {
            Self::Developers => "developers",
            Self::Publishers => "publishers",
            Self::Genres => "genres",
            Self::Categories => "categories",
        }
    }

    /// Junction table linking applications to this table
    pub fn junction(&self) -> BulkTable {
        let (table, columns): (&'static str, &'static [&'static str]) = match self {
            Self::Developers => ("application_developers", &["appid", "developer_id"]),
            Self::Publishers => ("application_publishers", &["appid", "publisher_id"]),
            Self::Genres => ("application_genres", &["appid", "genre_id"]),
            Self::Categories => ("application_categories", &["appid", "category_id"]),
        };
        BulkTable {
            table,
            columns,
            conflict_target: "",
        }
    }

    fn lookup(&self) -> BulkTable {
        BulkTable {
            table: self.table_name(),
            columns: &["name"],
            conflict_target: "(name)",
        }
    }

    /// Names this table holds for one application's `data` object
    ///
    /// Developers and publishers are plain strings; genres and categories
    /// are objects named by their `description`. Empty names are dropped.
    pub fn names<'a>(&self, data: &'a Value) -> Vec<&'a str> {
        let (key, field) = match self {
            Self::Developers => ("developers", None),
            Self::Publishers => ("publishers", None),
            Self::Genres => ("genres", Some("description")),
            Self::Categories => ("categories", Some("description")),
        };

        let entries = match data.get(key).and_then(Value::as_array) {
            Some(entries) => entries,
            None => return Vec::new(),
        };

        entries
            .iter()
            .filter_map(|entry| match field {
                Some(field) => entry.get(field).and_then(Value::as_str),
                None => entry.as_str(),
            })
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .collect()
    }
}

/// Distinct names per lookup table
#[derive(Debug, Clone, Default)]
pub struct LookupValues {
    values: BTreeMap<LookupTable, BTreeSet<String>>,
}

impl LookupValues {
    /// Adds every lookup name referenced by one application's `data`
    pub fn collect_from(&mut self, data: &Value) {
        for table in LookupTable::ALL {
            let names = table.names(data);
            if names.is_empty() {
                continue;
            }
            let set = self.values.entry(table).or_default();
            for name in names {
                if !set.contains(name) {
                    set.insert(name.to_string());
                }
            }
        }
    }

    pub fn get(&self, table: LookupTable) -> Option<&BTreeSet<String>> {
        self.values.get(&table)
    }

    pub fn len(&self, table: LookupTable) -> usize {
        self.values.get(&table).map(BTreeSet::len).unwrap_or(0)
    }
}

/// Name → surrogate id, per lookup table
#[derive(Debug, Clone, Default)]
pub struct LookupMaps {
    maps: HashMap<LookupTable, HashMap<String, i64>>,
}

impl LookupMaps {
    pub fn resolve(&self, table: LookupTable, name: &str) -> Option<i64> {
        self.maps.get(&table).and_then(|map| map.get(name)).copied()
    }

    pub fn len(&self, table: LookupTable) -> usize {
        self.maps.get(&table).map(HashMap::len).unwrap_or(0)
    }

    /// Reads the complete map of every lookup table
    pub fn fetch(conn: &Connection) -> Result<Self> {
        let mut maps = HashMap::new();
        for table in LookupTable::ALL {
            let mut stmt = conn.prepare(&format!("SELECT name, id FROM {}", table.table_name()))?;
            let map = stmt
                .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
                .collect::<std::result::Result<HashMap<_, _>, _>>()?;
            maps.insert(table, map);
        }
        Ok(Self { maps })
    }
}

/// Inserts every value that is not stored yet, in one transaction, then
/// reads back the maps
///
/// Returns the maps and the number of new rows per table.
pub fn upsert_and_map(
    conn: &mut Connection,
    values: &LookupValues,
) -> Result<(LookupMaps, BTreeMap<&'static str, u64>)> {
    let mut inserted = BTreeMap::new();

    let tx = conn.transaction()?;
    for table in LookupTable::ALL {
        let rows: Vec<Vec<SqlValue>> = values
            .get(table)
            .map(|names| {
                names
                    .iter()
                    .map(|name| vec![SqlValue::Text(name.clone())])
                    .collect()
            })
            .unwrap_or_default();

        let count = insert_rows(&tx, &table.lookup(), &rows)?;
        tracing::info!("Populated {} new records into '{}'", count, table.table_name());
        inserted.insert(table.table_name(), count);
    }
    tx.commit()?;

    let maps = LookupMaps::fetch(conn)?;
    Ok((maps, inserted))
}
