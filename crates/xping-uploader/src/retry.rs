//! Exponential backoff with full jitter.
//!
//! Grounded on `queue_keeper_service::retry::{RetryPolicy, RetryState}`:
//! same base/multiplier/max-delay/jitter shape, and on
//! `github_bot_sdk::client::retry::parse_retry_after` for honoring a
//! server's `Retry-After` header ahead of the computed backoff.

use std::time::Duration;

/// Exponential backoff policy: `delay = min(max_delay, base *
/// multiplier^attempt)`, then full jitter (`delay *= uniform(0, 1)`).
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 2.0,
        }
    }

    /// Whether `attempt` (0-based: 0 is the first retry after the
    /// original call) is still within the retry budget.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_retries
    }

    /// Compute the delay before `attempt` (0-based), honoring a
    /// server-supplied `retry_after` when present.
    pub fn delay_for(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        if let Some(retry_after) = retry_after {
            return retry_after.min(self.max_delay);
        }

        let exp = self.backoff_multiplier.powi(attempt as i32);
        let uncapped = self.base_delay.as_secs_f64() * exp;
        let capped = uncapped.min(self.max_delay.as_secs_f64());

        use rand::Rng;
        let jitter_factor: f64 = rand::rng().random_range(0.0..1.0);
        Duration::from_secs_f64(capped * jitter_factor)
    }
}

/// Parse an HTTP `Retry-After` header value: either an integer number
/// of seconds, or (unsupported here) an HTTP-date — falls back to
/// `None` for anything else so the caller uses its own backoff.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

/// Classifies an HTTP status/transport outcome into retry behavior,
/// matching spec.md §4.6's condition list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryClassification {
    Retriable,
    NonRetriable,
}

/// Classify an HTTP status code per spec.md §4.6: `>=500` or `429` are
/// retriable; any other 4xx is not.
pub fn classify_status(status: u16) -> RetryClassification {
    if status >= 500 || status == 429 {
        RetryClassification::Retriable
    } else {
        RetryClassification::NonRetriable
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod tests;
