use crate::config::ApiConfig;
use rand::Rng;
use std::time::Duration;

/// Exponential backoff with bounded random jitter
///
/// The delay before retry `n` (0-based) is `unit * base^n + uniform(0..=jitter)`.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    max_attempts: u32,
    base: u32,
    unit: Duration,
    jitter: Duration,
}

impl BackoffPolicy {
    pub fn new(max_attempts: u32, base: u32, unit: Duration, jitter: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base,
            unit,
            jitter,
        }
    }

    pub fn from_config(config: &ApiConfig) -> Self {
        Self::new(
            config.max_attempts,
            config.backoff_base,
            Duration::from_millis(config.backoff_unit_ms),
            Duration::from_millis(config.jitter_ms),
        )
    }

    /// Total attempts allowed per item, including the first
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Backoff before retry `attempt`, without jitter
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let factor = self.base.saturating_pow(attempt);
        self.unit.saturating_mul(factor)
    }

    /// Backoff before retry `attempt`, with a fresh random jitter
    pub fn delay(&self, attempt: u32) -> Duration {
        let jitter_ms = self.jitter.as_millis() as u64;
        let jitter = if jitter_ms == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_ms))
        };
        self.base_delay(attempt).saturating_add(jitter)
    }
}
