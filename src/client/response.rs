//! Classification of remote responses into fetch outcomes
//!
//! | Condition | Outcome |
//! |-----------|---------|
//! | 2xx, success flag set, payload present | `Success` |
//! | 2xx, success flag false / no reviews | `NotFound` |
//! | 2xx, unparseable or wrongly shaped body | `Malformed` |
//! | HTTP 401, 403 | `Restricted` |
//! | HTTP 404, other 4xx | `NotFound` |
//! | HTTP 429, 5xx, 3xx, network error | retry |

use crate::record::{Dataset, RawRecord};
use reqwest::StatusCode;
use serde_json::{json, Value};

/// What one HTTP attempt resolved to
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptOutcome {
    /// A final answer; no retry budget is spent on it
    Done(RawRecord),
    /// A recoverable problem, described for the logs
    Retry(String),
}

/// Classifies a response by status code alone, when the status is not 2xx
pub fn classify_status(status: StatusCode) -> Option<AttemptOutcome> {
    if status.is_success() {
        return None;
    }

    let code = status.as_u16();
    let outcome = match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            AttemptOutcome::Done(RawRecord::Restricted { status: code })
        }
        StatusCode::TOO_MANY_REQUESTS => AttemptOutcome::Retry("rate limited (HTTP 429)".to_string()),
        s if s.is_server_error() => AttemptOutcome::Retry(format!("server error (HTTP {})", code)),
        s if s.is_client_error() => AttemptOutcome::Done(RawRecord::NotFound { status: Some(code) }),
        _ => AttemptOutcome::Retry(format!("unexpected HTTP {}", code)),
    };
    Some(outcome)
}

/// Interprets a 2xx body for `dataset` and item `id`
///
/// Successful records are wrapped into the artifact element shape, stamped
/// with `fetched_at`.
pub fn interpret_body(dataset: Dataset, id: u64, body: &[u8], fetched_at: &str) -> RawRecord {
    let value: Value = match serde_json::from_slice(body) {
        Ok(v) => v,
        Err(e) => {
            return RawRecord::Malformed {
                detail: format!("invalid JSON: {}", e),
            }
        }
    };

    match dataset {
        Dataset::Apps => interpret_app_details(id, value, fetched_at),
        Dataset::Reviews => interpret_reviews(id, value, fetched_at),
    }
}

/// `{"<id>": {"success": bool, "data": {...}}}`
fn interpret_app_details(id: u64, mut value: Value, fetched_at: &str) -> RawRecord {
    let node = match value.get_mut(id.to_string()) {
        Some(node) => node.take(),
        None => {
            return RawRecord::Malformed {
                detail: format!("response has no entry for {}", id),
            }
        }
    };

    match node.get("success").and_then(Value::as_bool) {
        Some(true) => match node.get("data") {
            Some(data) if data.is_object() => RawRecord::Success(json!({
                "success": true,
                "data": data,
                "fetched_at": fetched_at,
            })),
            _ => RawRecord::Malformed {
                detail: "success flag set but data object missing".to_string(),
            },
        },
        Some(false) => RawRecord::NotFound { status: None },
        None => RawRecord::Malformed {
            detail: "missing success flag".to_string(),
        },
    }
}

/// `{"success": 1, "query_summary": {...}, "reviews": [...]}`
fn interpret_reviews(id: u64, value: Value, fetched_at: &str) -> RawRecord {
    match value.get("success").and_then(Value::as_i64) {
        Some(1) => {
            let has_reviews = value
                .get("reviews")
                .and_then(Value::as_array)
                .map(|reviews| !reviews.is_empty())
                .unwrap_or(false);
            if has_reviews {
                RawRecord::Success(json!({
                    "appid": id,
                    "reviews": value,
                    "fetched_at": fetched_at,
                }))
            } else {
                RawRecord::NotFound { status: None }
            }
        }
        Some(_) => RawRecord::NotFound { status: None },
        None => RawRecord::Malformed {
            detail: "missing success flag".to_string(),
        },
    }
}
