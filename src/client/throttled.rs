//! Throttled HTTP client for the remote catalog API
//!
//! This module handles all outbound requests, including:
//! - Building the HTTP client with the configured user agent and timeouts
//! - Enforcing a minimum interval between consecutive requests
//! - Retrying rate-limited, server and network failures with backoff
//! - Classifying every response into a [`RawRecord`]

use crate::client::backoff::BackoffPolicy;
use crate::client::response::{classify_status, interpret_body, AttemptOutcome};
use crate::config::ApiConfig;
use crate::record::{Dataset, RawRecord};
use crate::{HarvestError, Result};
use reqwest::Client;
use serde_json::Value;
use std::time::{Duration, Instant};

/// The record produced by one fetch, plus how it was obtained
#[derive(Debug, Clone)]
pub struct FetchReport {
    pub record: RawRecord,
    /// Number of HTTP attempts made
    pub attempts: u32,
    /// Backoff slept before each retry, in order
    pub backoff_delays: Vec<Duration>,
}

/// Builds an HTTP client with the configured identity and timeouts
pub fn build_http_client(config: &ApiConfig) -> std::result::Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(config.request_timeout())
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// HTTP client wrapper enforcing politeness towards the remote API
pub struct ThrottledClient {
    http: Client,
    store_base_url: String,
    catalog_url: String,
    catalog_timeout: Duration,
    request_delay: Duration,
    backoff: BackoffPolicy,
    /// When the previous call returned
    last_completed: Option<Instant>,
}

impl ThrottledClient {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let http = build_http_client(config)?;
        Ok(Self {
            http,
            store_base_url: config.store_base_url.trim_end_matches('/').to_string(),
            catalog_url: config.catalog_url.clone(),
            catalog_timeout: config.catalog_timeout(),
            request_delay: config.request_delay(),
            backoff: BackoffPolicy::from_config(config),
            last_completed: None,
        })
    }

    /// Fetches one work item of `dataset`
    pub async fn fetch(&mut self, dataset: Dataset, id: u64) -> RawRecord {
        self.fetch_with_report(dataset, id).await.record
    }

    /// Fetches one work item, reporting attempts and backoff delays
    ///
    /// # Retry Logic
    ///
    /// | Condition | Action |
    /// |-----------|--------|
    /// | HTTP 401/403/404, other 4xx | Immediate terminal outcome |
    /// | HTTP 2xx | Immediate outcome from the body |
    /// | HTTP 429, 5xx | Retry with backoff |
    /// | Timeout, connection error | Retry with backoff |
    /// | Attempts exhausted | `TransientFailure` |
    pub async fn fetch_with_report(&mut self, dataset: Dataset, id: u64) -> FetchReport {
        let url = self.detail_url(dataset, id);
        let max_attempts = self.backoff.max_attempts();
        let mut backoff_delays = Vec::new();
        let mut last_problem = String::new();

        for attempt in 0..max_attempts {
            self.throttle().await;
            let outcome = self.attempt(dataset, id, &url).await;
            self.last_completed = Some(Instant::now());

            match outcome {
                AttemptOutcome::Done(record) => {
                    return FetchReport {
                        record,
                        attempts: attempt + 1,
                        backoff_delays,
                    };
                }
                AttemptOutcome::Retry(problem) => {
                    tracing::warn!(
                        "{} for {} {} (attempt {}/{})",
                        problem,
                        dataset,
                        id,
                        attempt + 1,
                        max_attempts
                    );
                    last_problem = problem;

                    if attempt + 1 < max_attempts {
                        let delay = self.backoff.delay(attempt);
                        tokio::time::sleep(delay).await;
                        backoff_delays.push(delay);
                    }
                }
            }
        }

        tracing::error!(
            "Permanent failure for {} {} after {} attempts: {}",
            dataset,
            id,
            max_attempts,
            last_problem
        );

        FetchReport {
            record: RawRecord::TransientFailure {
                detail: last_problem,
            },
            attempts: max_attempts,
            backoff_delays,
        }
    }

    /// Downloads the catalog universe document
    ///
    /// This happens once per state directory, so it is a single attempt with
    /// a longer timeout; failure is fatal for the run.
    pub async fn fetch_catalog(&mut self) -> Result<Value> {
        self.throttle().await;

        let url = self.catalog_url.clone();
        let result = match self
            .http
            .get(&url)
            .timeout(self.catalog_timeout)
            .send()
            .await
            .and_then(|r| r.error_for_status())
        {
            Ok(response) => response.json::<Value>().await,
            Err(e) => Err(e),
        };
        self.last_completed = Some(Instant::now());

        result.map_err(|source| HarvestError::Http { url, source })
    }

    /// Sends one request and classifies the result
    async fn attempt(&self, dataset: Dataset, id: u64, url: &str) -> AttemptOutcome {
        let response = match self.http.get(url).send().await {
            Ok(response) => response,
            Err(e) => return AttemptOutcome::Retry(describe_network_error(&e)),
        };

        if let Some(outcome) = classify_status(response.status()) {
            return outcome;
        }

        match response.bytes().await {
            Ok(body) => {
                let fetched_at = chrono::Utc::now().to_rfc3339();
                AttemptOutcome::Done(interpret_body(dataset, id, &body, &fetched_at))
            }
            Err(e) => AttemptOutcome::Retry(describe_network_error(&e)),
        }
    }

    /// Waits out the request delay, counted from the end of the previous call
    ///
    /// A slow response never eats into the pause before the next request.
    async fn throttle(&self) {
        if let Some(last) = self.last_completed {
            let elapsed = last.elapsed();
            if elapsed < self.request_delay {
                tokio::time::sleep(self.request_delay - elapsed).await;
            }
        }
    }

    fn detail_url(&self, dataset: Dataset, id: u64) -> String {
        match dataset {
            Dataset::Apps => format!("{}/api/appdetails?appids={}", self.store_base_url, id),
            Dataset::Reviews => format!(
                "{}/appreviews/{}?json=1&num_per_page=100&language=all",
                self.store_base_url, id
            ),
        }
    }
}

fn describe_network_error(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        "request timeout".to_string()
    } else if e.is_connect() {
        format!("connection error: {}", e)
    } else {
        format!("network error: {}", e)
    }
}
