//! Client module for talking to the remote catalog API
//!
//! - `backoff`: exponential backoff with jitter
//! - `response`: status and body classification into fetch outcomes
//! - `throttled`: the rate-limited client itself

mod backoff;
mod response;
mod throttled;

pub use backoff::BackoffPolicy;
pub use response::{classify_status, interpret_body, AttemptOutcome};
pub use throttled::{build_http_client, FetchReport, ThrottledClient};
