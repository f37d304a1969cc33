//! Loader module: batch artifacts into the relational store
//!
//! - `resolver`: lookup entity extraction and name → id maps
//! - `rows`: validation and row derivation for application records
//! - `bulk`: multi-row conflict-skipping inserts
//! - `applications`: the two-pass application load
//! - `reviews`: the dependent review load
//! - `gaps`: appids referenced by reviews but missing from the store

mod applications;
mod bulk;
mod gaps;
mod resolver;
mod reviews;
mod rows;

pub use applications::{extract_lookup_values, load_applications};
pub use bulk::{insert_rows, BulkTable, MAX_BOUND_PARAMETERS};
pub use gaps::find_missing_app_ids;
pub use resolver::{upsert_and_map, LookupMaps, LookupTable, LookupValues};
pub use reviews::load_reviews;
pub use rows::{classify_element, parse_release_date, AppElement, ApplicationRow};
