//! Review load
//!
//! Reviews reference applications, so every stored appid is read up front
//! and reviews of unknown applications are skipped instead of tripping the
//! foreign key.

use crate::config::LoaderConfig;
use crate::decode::decode_file;
use crate::loader::bulk::{insert_rows, BulkTable};
use crate::output::ReviewLoadSummary;
use crate::storage::SqliteStore;
use crate::{HarvestError, Phase, Result};
use rusqlite::types::Value as SqlValue;
use serde_json::Value;
use std::collections::HashSet;
use std::path::PathBuf;

const REVIEWS: BulkTable = BulkTable {
    table: "reviews",
    columns: &[
        "recommendationid",
        "appid",
        "author_steamid",
        "author_num_games_owned",
        "author_num_reviews",
        "author_playtime_forever",
        "author_playtime_last_two_weeks",
        "author_playtime_at_review",
        "author_last_played",
        "language",
        "review_text",
        "timestamp_created",
        "timestamp_updated",
        "voted_up",
        "votes_up",
        "votes_funny",
        "weighted_vote_score",
        "comment_count",
        "steam_purchase",
        "received_for_free",
        "written_during_early_access",
    ],
    conflict_target: "(recommendationid)",
};

/// Loads review artifacts into the store in one transaction
pub fn load_reviews(
    store: &mut SqliteStore,
    artifacts: &[PathBuf],
    config: &LoaderConfig,
) -> Result<ReviewLoadSummary> {
    let mut summary = ReviewLoadSummary {
        artifacts: artifacts.len(),
        ..ReviewLoadSummary::default()
    };

    if artifacts.is_empty() {
        tracing::warn!("No review artifacts to load");
        return Ok(summary);
    }

    insert_reviews(store, artifacts, config.review_batch_size, &mut summary)
        .map_err(|e| HarvestError::in_phase(Phase::ReviewInsertion, e))?;

    if !summary.orphaned.is_empty() {
        tracing::warn!(
            "Skipped reviews for {} appids not found in the 'applications' table. Top 3: {:?}",
            summary.orphaned.len(),
            summary.top_orphans(3)
        );
    }
    tracing::info!(
        "Finished loading reviews: {} inserted from {} records",
        summary.reviews_inserted,
        summary.records
    );

    Ok(summary)
}

fn insert_reviews(
    store: &mut SqliteStore,
    artifacts: &[PathBuf],
    batch_size: usize,
    summary: &mut ReviewLoadSummary,
) -> Result<()> {
    tracing::info!("Fetching existing application ids for validation");
    let existing = store.existing_app_ids()?;
    tracing::info!("Found {} existing applications", existing.len());

    let tx = store.conn_mut().transaction()?;
    let mut batch: Vec<Vec<SqlValue>> = Vec::with_capacity(batch_size);

    for path in artifacts {
        tracing::info!("Loading {}", path.display());

        for element in decode_file::<Value>(path)? {
            let element = element?;
            summary.records += 1;

            let appid = match review_record_appid(&element, &existing) {
                Ok(appid) => appid,
                Err(Skip::Malformed) => {
                    summary.skipped_malformed += 1;
                    continue;
                }
                Err(Skip::Unsuccessful) => {
                    summary.skipped_unsuccessful += 1;
                    continue;
                }
                Err(Skip::Orphan(appid)) => {
                    *summary.orphaned.entry(appid).or_insert(0) += 1;
                    continue;
                }
            };

            let reviews = element
                .pointer("/reviews/reviews")
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or_default();

            for review in reviews {
                match review_row(appid, review) {
                    Some(row) => batch.push(row),
                    None => {
                        summary.skipped_reviews += 1;
                        continue;
                    }
                }

                if batch.len() >= batch_size {
                    summary.reviews_inserted += insert_rows(&tx, &REVIEWS, &batch)?;
                    batch.clear();
                }
            }
        }
    }

    summary.reviews_inserted += insert_rows(&tx, &REVIEWS, &batch)?;
    tx.commit()?;
    Ok(())
}

enum Skip {
    /// No usable appid
    Malformed,
    Unsuccessful,
    Orphan(u64),
}

/// The appid of a loadable review record
fn review_record_appid(element: &Value, existing: &HashSet<u64>) -> std::result::Result<u64, Skip> {
    let appid = match element.get("appid").and_then(Value::as_u64) {
        Some(appid) if appid > 0 => appid,
        _ => return Err(Skip::Malformed),
    };

    if element.pointer("/reviews/success").and_then(Value::as_i64) != Some(1) {
        return Err(Skip::Unsuccessful);
    }

    if !existing.contains(&appid) {
        return Err(Skip::Orphan(appid));
    }

    Ok(appid)
}

/// One `reviews` row, or `None` when the review has no recommendation id
fn review_row(appid: u64, review: &Value) -> Option<Vec<SqlValue>> {
    let recommendation_id = match review.get("recommendationid")? {
        Value::String(s) if !s.is_empty() => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    let author = review.get("author");
    let author_field = |key: &str| author.and_then(|a| a.get(key));

    Some(vec![
        SqlValue::Text(recommendation_id),
        SqlValue::Integer(appid as i64),
        text_or_number(author_field("steamid")),
        integer(author_field("num_games_owned")),
        integer(author_field("num_reviews")),
        integer(author_field("playtime_forever")),
        integer(author_field("playtime_last_two_weeks")),
        integer(author_field("playtime_at_review")),
        integer(author_field("last_played")),
        text_or_number(review.get("language")),
        text_or_number(review.get("review")),
        integer(review.get("timestamp_created")),
        integer(review.get("timestamp_updated")),
        boolean(review.get("voted_up")),
        integer(review.get("votes_up")),
        integer(review.get("votes_funny")),
        real(review.get("weighted_vote_score")),
        integer(review.get("comment_count")),
        boolean(review.get("steam_purchase")),
        boolean(review.get("received_for_free")),
        boolean(review.get("written_during_early_access")),
    ])
}

fn text_or_number(value: Option<&Value>) -> SqlValue {
    match value {
        Some(Value::String(s)) => SqlValue::Text(s.clone()),
        Some(Value::Number(n)) => SqlValue::Text(n.to_string()),
        _ => SqlValue::Null,
    }
}

fn integer(value: Option<&Value>) -> SqlValue {
    value
        .and_then(Value::as_i64)
        .map(SqlValue::Integer)
        .unwrap_or(SqlValue::Null)
}

/// The API sends weighted scores as decimal strings
fn real(value: Option<&Value>) -> SqlValue {
    let parsed = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.parse().ok(),
        _ => None,
    };
    parsed.map(SqlValue::Real).unwrap_or(SqlValue::Null)
}

fn boolean(value: Option<&Value>) -> SqlValue {
    value
        .and_then(Value::as_bool)
        .map(|b| SqlValue::Integer(b as i64))
        .unwrap_or(SqlValue::Null)
}
