//! Integration tests for the loader
//!
//! Artifacts are written to a temporary data directory the same way the
//! crawler writes them, then loaded into a file-backed SQLite database.

use catalog_harvest::config::LoaderConfig;
use catalog_harvest::crawler::{list_artifacts, BatchWriter};
use catalog_harvest::loader::{find_missing_app_ids, load_applications, load_reviews};
use catalog_harvest::storage::SqliteStore;
use catalog_harvest::{Dataset, HarvestError, Phase};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::{tempdir, TempDir};

/// Creates a loader configuration with small batches
fn create_test_config(dir: &Path) -> LoaderConfig {
    LoaderConfig {
        database_path: dir.join("catalog.db"),
        batch_size: 2,
        review_batch_size: 3,
        busy_timeout_secs: 5,
    }
}

fn open_store(config: &LoaderConfig) -> SqliteStore {
    SqliteStore::open(&config.database_path, Duration::from_secs(5)).unwrap()
}

fn app(appid: u64, name: &str, developers: &[&str], genres: &[&str]) -> Value {
    let genres: Vec<Value> = genres
        .iter()
        .enumerate()
        .map(|(i, g)| json!({"id": i.to_string(), "description": g}))
        .collect();
    json!({
        "success": true,
        "fetched_at": "2025-09-01T12:00:00+00:00",
        "data": {
            "type": "game",
            "steam_appid": appid,
            "name": name,
            "is_free": false,
            "release_date": {"coming_soon": false, "date": "21 Aug, 2012"},
            "developers": developers,
            "publishers": ["Valve"],
            "genres": genres,
            "categories": [{"id": 2, "description": "Single-player"}]
        }
    })
}

fn reviews_record(appid: u64, ids: &[&str]) -> Value {
    let reviews: Vec<Value> = ids
        .iter()
        .map(|id| {
            json!({
                "recommendationid": id,
                "author": {"steamid": "76561198000000000", "playtime_forever": 120},
                "language": "english",
                "review": "Solid",
                "voted_up": true,
                "weighted_vote_score": "0.5"
            })
        })
        .collect();
    json!({
        "appid": appid,
        "fetched_at": "2025-09-01T12:00:00+00:00",
        "reviews": {"success": 1, "reviews": reviews}
    })
}

/// Writes each slice as one artifact of `dataset`
fn write_artifacts(dir: &TempDir, dataset: Dataset, batches: &[Vec<Value>]) -> Vec<PathBuf> {
    let data_dir = dir.path().join("data");
    let mut writer = BatchWriter::open(&data_dir, dataset).unwrap();
    for batch in batches {
        writer.write(batch).unwrap();
    }
    list_artifacts(&data_dir, dataset).unwrap()
}

fn count(store: &SqliteStore, table: &str) -> u64 {
    store.count_rows(table).unwrap()
}

#[test]
fn test_load_applications_and_relations() {
    let dir = tempdir().unwrap();
    let config = create_test_config(dir.path());
    let artifacts = write_artifacts(
        &dir,
        Dataset::Apps,
        &[
            vec![
                app(10, "Alpha", &["Studio A"], &["Action", "Indie"]),
                app(20, "Beta", &["Studio A", "Studio B"], &["Action"]),
            ],
            vec![app(30, "Gamma", &[], &["Strategy"])],
        ],
    );

    let mut store = open_store(&config);
    let summary = load_applications(&mut store, &artifacts, &config).unwrap();

    assert_eq!(summary.records, 3);
    assert_eq!(summary.facts_inserted, 3);
    assert_eq!(summary.lookups_inserted["developers"], 2);
    assert_eq!(summary.lookups_inserted["genres"], 3);
    assert_eq!(summary.unresolved_relations, 0);

    assert_eq!(count(&store, "applications"), 3);
    assert_eq!(count(&store, "developers"), 2);
    assert_eq!(count(&store, "publishers"), 1);
    assert_eq!(count(&store, "application_developers"), 3);
    assert_eq!(count(&store, "application_genres"), 4);
    assert_eq!(count(&store, "application_publishers"), 3);

    let genres: Vec<String> = {
        let mut stmt = store
            .conn()
            .prepare(
                "SELECT g.name FROM genres g
                 JOIN application_genres ag ON ag.genre_id = g.id
                 WHERE ag.appid = 10 ORDER BY g.name",
            )
            .unwrap();
        let names = stmt
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<Vec<String>, _>>()
            .unwrap();
        names
    };
    assert_eq!(genres, vec!["Action".to_string(), "Indie".to_string()]);

    let (name, release_date, fetched_at): (String, String, String) = store
        .conn()
        .query_row(
            "SELECT name, release_date, fetched_at FROM applications WHERE appid = 20",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .unwrap();
    assert_eq!(name, "Beta");
    assert_eq!(release_date, "2012-08-21");
    assert_eq!(fetched_at, "2025-09-01T12:00:00+00:00");
}

#[test]
fn test_reloading_inserts_nothing_new() {
    let dir = tempdir().unwrap();
    let config = create_test_config(dir.path());
    let artifacts = write_artifacts(
        &dir,
        Dataset::Apps,
        &[vec![
            app(10, "Alpha", &["Studio A"], &["Action"]),
            app(20, "Beta", &["Studio B"], &["Action"]),
        ]],
    );

    let mut store = open_store(&config);
    load_applications(&mut store, &artifacts, &config).unwrap();
    let second = load_applications(&mut store, &artifacts, &config).unwrap();

    assert_eq!(second.records, 2);
    assert_eq!(second.facts_inserted, 0);
    assert_eq!(second.junctions_inserted, 0);
    assert!(second.lookups_inserted.values().all(|n| *n == 0));
    assert_eq!(count(&store, "applications"), 2);
    assert_eq!(count(&store, "application_genres"), 2);
    assert_eq!(count(&store, "genres"), 1);
}

#[test]
fn test_duplicate_appid_across_artifacts_keeps_first() {
    let dir = tempdir().unwrap();
    let config = create_test_config(dir.path());
    let artifacts = write_artifacts(
        &dir,
        Dataset::Apps,
        &[
            vec![app(10, "First", &[], &[])],
            vec![app(10, "Second", &[], &[])],
        ],
    );

    let mut store = open_store(&config);
    let summary = load_applications(&mut store, &artifacts, &config).unwrap();

    assert_eq!(summary.records, 2);
    assert_eq!(summary.facts_inserted, 1);
    assert_eq!(summary.skipped_duplicates, 1);
    let name: String = store
        .conn()
        .query_row("SELECT name FROM applications WHERE appid = 10", [], |row| row.get(0))
        .unwrap();
    assert_eq!(name, "First");
}

#[test]
fn test_unsuccessful_and_malformed_records_are_skipped() {
    let dir = tempdir().unwrap();
    let config = create_test_config(dir.path());
    let artifacts = write_artifacts(
        &dir,
        Dataset::Apps,
        &[vec![
            app(10, "Alpha", &["Studio A"], &[]),
            json!({"success": false}),
            json!({"success": true, "data": {"name": "No id"}}),
            json!({"success": true, "data": {"steam_appid": 40}}),
            json!("not an object"),
        ]],
    );

    let mut store = open_store(&config);
    let summary = load_applications(&mut store, &artifacts, &config).unwrap();

    assert_eq!(summary.records, 5);
    assert_eq!(summary.facts_inserted, 1);
    assert_eq!(summary.skipped_unsuccessful, 1);
    assert_eq!(summary.skipped_malformed, 3);
    assert_eq!(count(&store, "applications"), 1);
}

#[test]
fn test_failed_fact_phase_rolls_back() {
    let dir = tempdir().unwrap();
    let config = create_test_config(dir.path());
    let artifacts = write_artifacts(
        &dir,
        Dataset::Apps,
        &[vec![app(10, "Alpha", &["Studio A"], &["Action"])]],
    );

    let mut store = open_store(&config);
    store
        .conn()
        .execute_batch("DROP TABLE application_genres")
        .unwrap();

    let err = load_applications(&mut store, &artifacts, &config).unwrap_err();
    assert_eq!(err.phase(), Some(Phase::FactInsertion));

    // Lookup population committed on its own; the fact phase left nothing
    assert_eq!(count(&store, "genres"), 1);
    assert_eq!(count(&store, "applications"), 0);
    assert_eq!(count(&store, "application_developers"), 0);
}

#[test]
fn test_truncated_artifact_aborts_extraction() {
    let dir = tempdir().unwrap();
    let config = create_test_config(dir.path());
    let mut artifacts = write_artifacts(
        &dir,
        Dataset::Apps,
        &[vec![app(10, "Alpha", &[], &[])]],
    );

    let torn = dir.path().join("data").join("steam_data_batch_00002.json");
    std::fs::write(&torn, "[\n{\"success\": true, \"data\": {\"steam_appid\": 20").unwrap();
    artifacts.push(torn);

    let mut store = open_store(&config);
    let err = load_applications(&mut store, &artifacts, &config).unwrap_err();

    assert_eq!(err.phase(), Some(Phase::LookupExtraction));
    assert!(matches!(
        err,
        HarvestError::InPhase { ref source, .. } if matches!(**source, HarvestError::Decode(_))
    ));
    assert_eq!(count(&store, "applications"), 0);
}

#[test]
fn test_no_artifacts_is_a_no_op() {
    let dir = tempdir().unwrap();
    let config = create_test_config(dir.path());
    let mut store = open_store(&config);

    let apps = load_applications(&mut store, &[], &config).unwrap();
    let reviews = load_reviews(&mut store, &[], &config).unwrap();

    assert_eq!(apps.records, 0);
    assert_eq!(reviews.records, 0);
    assert_eq!(count(&store, "applications"), 0);
}

#[test]
fn test_reviews_of_unknown_applications_are_skipped() {
    let dir = tempdir().unwrap();
    let config = create_test_config(dir.path());
    let apps = write_artifacts(&dir, Dataset::Apps, &[vec![app(10, "Alpha", &[], &[])]]);
    let reviews = write_artifacts(
        &dir,
        Dataset::Reviews,
        &[vec![
            reviews_record(10, &["1", "2", "3", "4"]),
            reviews_record(99, &["5", "6"]),
            reviews_record(77, &["7"]),
            json!({"appid": 10, "reviews": {"success": 2}}),
            json!({"appid": 0, "reviews": {"success": 1, "reviews": []}}),
        ]],
    );

    let mut store = open_store(&config);
    load_applications(&mut store, &apps, &config).unwrap();
    let summary = load_reviews(&mut store, &reviews, &config).unwrap();

    assert_eq!(summary.records, 5);
    assert_eq!(summary.reviews_inserted, 4);
    assert_eq!(summary.skipped_unsuccessful, 1);
    assert_eq!(summary.skipped_malformed, 1);
    assert_eq!(summary.orphaned.get(&99), Some(&1));
    assert_eq!(summary.orphaned.get(&77), Some(&1));
    assert_eq!(count(&store, "reviews"), 4);

    // Reloading the same reviews adds nothing
    let again = load_reviews(&mut store, &reviews, &config).unwrap();
    assert_eq!(again.reviews_inserted, 0);
    assert_eq!(count(&store, "reviews"), 4);
}

#[test]
fn test_reviews_without_recommendation_id_are_counted() {
    let dir = tempdir().unwrap();
    let config = create_test_config(dir.path());
    let apps = write_artifacts(&dir, Dataset::Apps, &[vec![app(10, "Alpha", &[], &[])]]);
    let reviews = write_artifacts(
        &dir,
        Dataset::Reviews,
        &[vec![json!({
            "appid": 10,
            "reviews": {"success": 1, "reviews": [
                {"recommendationid": "1", "review": "ok"},
                {"review": "no id"}
            ]}
        })]],
    );

    let mut store = open_store(&config);
    load_applications(&mut store, &apps, &config).unwrap();
    let summary = load_reviews(&mut store, &reviews, &config).unwrap();

    assert_eq!(summary.reviews_inserted, 1);
    assert_eq!(summary.skipped_reviews, 1);
}

#[test]
fn test_find_missing_app_ids() {
    let dir = tempdir().unwrap();
    let config = create_test_config(dir.path());
    let apps = write_artifacts(&dir, Dataset::Apps, &[vec![app(10, "Alpha", &[], &[])]]);
    let reviews = write_artifacts(
        &dir,
        Dataset::Reviews,
        &[
            vec![reviews_record(30, &["1"]), reviews_record(10, &["2"])],
            vec![reviews_record(20, &["3"]), reviews_record(30, &["4"])],
        ],
    );

    let mut store = open_store(&config);
    load_applications(&mut store, &apps, &config).unwrap();

    let missing = find_missing_app_ids(&store, &reviews).unwrap();
    assert_eq!(missing.into_iter().collect::<Vec<_>>(), vec![20, 30]);
}

#[test]
fn test_find_missing_on_empty_store_lists_every_reviewed_app() {
    let dir = tempdir().unwrap();
    let config = create_test_config(dir.path());
    let reviews = write_artifacts(
        &dir,
        Dataset::Reviews,
        &[vec![reviews_record(5, &["1"]), reviews_record(3, &["2"])]],
    );

    let store = open_store(&config);
    let missing = find_missing_app_ids(&store, &reviews).unwrap();
    assert_eq!(missing.into_iter().collect::<Vec<_>>(), vec![3, 5]);
}
