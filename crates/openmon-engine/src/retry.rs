//! Retry strategy shared by every provider call.
//!
//! Only transient failures (`timeout`, `rate_limited`, `network`) are
//! retried. Delays grow geometrically, are capped, and never shrink.

use std::future::Future;
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{debug, warn};

use openmon_core::config::RetrySettings;
use openmon_core::types::RetryRecord;
use openmon_providers::error::ProviderError;

/// Retry/backoff parameters for one provider.
#[derive(Clone, Debug, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetrySettings::default())
    }
}

impl From<&RetrySettings> for RetryPolicy {
    fn from(settings: &RetrySettings) -> Self {
        Self::new(
            settings.max_retries,
            Duration::from_millis(settings.base_delay_ms),
            Duration::from_millis(settings.max_delay_ms),
            settings.backoff_multiplier,
        )
    }
}

/// Result of running an operation under a [`RetryPolicy`].
#[derive(Debug)]
pub struct RetryOutcome<T> {
    pub result: Result<T, ProviderError>,
    /// Retries performed after the first attempt.
    pub retries: u32,
    /// One record per failed attempt, in order.
    pub history: Vec<RetryRecord>,
}

impl RetryPolicy {
    /// A multiplier below 1.0 (or NaN) is treated as 1.0.
    pub fn new(max_retries: u32, base_delay: Duration, max_delay: Duration, backoff_multiplier: f64) -> Self {
        let backoff_multiplier = if backoff_multiplier.is_finite() {
            backoff_multiplier.max(1.0)
        } else {
            1.0
        };
        Self {
            max_retries,
            base_delay,
            max_delay: max_delay.max(base_delay),
            backoff_multiplier,
        }
    }

    /// Single attempt, no retries.
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO, Duration::ZERO, 1.0)
    }

    pub fn backoff_multiplier(&self) -> f64 {
        self.backoff_multiplier
    }

    /// Delay before retry number `retry` (1-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(i32::MAX as u32) as i32;
        let factor = self.backoff_multiplier.powi(exponent);
        let millis = self.base_delay.as_millis() as f64 * factor;
        let capped = millis.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(capped as u64)
    }

    /// Run `op` until it succeeds, fails permanently, or retries run out.
    ///
    /// `op` receives the 1-based attempt number.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> RetryOutcome<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let mut history = Vec::new();
        let mut attempt = 1;

        loop {
            let started = Instant::now();
            let result = op(attempt).await;
            let latency_ms = started.elapsed().as_millis() as u64;

            let err = match result {
                Ok(value) => {
                    return RetryOutcome {
                        result: Ok(value),
                        retries: attempt - 1,
                        history,
                    }
                }
                Err(e) => e,
            };

            history.push(RetryRecord {
                attempt,
                timestamp: Utc::now(),
                error: err.message.clone(),
                code: err.code,
                latency_ms,
            });

            let retries_done = attempt - 1;
            if !err.is_transient() || retries_done >= self.max_retries {
                debug!(
                    attempt,
                    code = %err.code,
                    transient = err.is_transient(),
                    "Giving up"
                );
                return RetryOutcome {
                    result: Err(err),
                    retries: retries_done,
                    history,
                };
            }

            let delay = self.delay_for(attempt);
            warn!(
                attempt,
                max_retries = self.max_retries,
                code = %err.code,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Transient provider failure, retrying"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
