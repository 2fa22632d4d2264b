//! Retry policy for the fetch step of a load.
//!
//! Only fetches are retried: a transient storage hiccup deserves another
//! attempt, a malformed payload does not. The delay starts at the
//! configured value and multiplies after every failed attempt. When the
//! attempt budget is exhausted, the terminal error carries the attempt
//! count and wraps the last underlying cause.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use bytes::Bytes;
use tracing::warn;

use orgmap_core::source::{self, DataSource};

use crate::error::LoadError;

/// Backoff configuration for fetch retries.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt; total attempts are `max_retries + 1`.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Factor applied to the delay after each failed attempt.
    pub backoff_multiplier: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs(1),
            backoff_multiplier: 2,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries, for tests and latency-sensitive callers.
    #[must_use]
    pub const fn no_retries() -> Self {
        Self {
            max_retries: 0,
            initial_delay: Duration::ZERO,
            backoff_multiplier: 1,
        }
    }
}

/// Fetches from an asynchronous source, retrying per `policy`.
pub(crate) async fn fetch_with_retry(
    source: &dyn DataSource,
    policy: &RetryPolicy,
) -> Result<Bytes, LoadError> {
    let descriptor = source.descriptor();
    let mut delay = policy.initial_delay;
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        match source.fetch().await {
            Ok(bytes) => return Ok(bytes),
            Err(cause) => {
                if attempts > policy.max_retries {
                    return Err(LoadError::Fetch {
                        descriptor,
                        attempts,
                        cause,
                    });
                }
                warn!(
                    source = %descriptor,
                    attempt = attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %cause,
                    "fetch failed, retrying"
                );
                tokio::time::sleep(delay).await;
                delay *= policy.backoff_multiplier;
            }
        }
    }
}

/// Fetches from a blocking source, retrying per `policy`.
///
/// `cancel`, when set, aborts the backoff between attempts; the background
/// reload loop passes its shutdown flag here so a stop request is not held
/// up by a full retry schedule.
pub(crate) fn fetch_with_retry_blocking(
    source: &dyn source::blocking::DataSource,
    policy: &RetryPolicy,
    cancel: Option<&AtomicBool>,
) -> Result<Bytes, LoadError> {
    let descriptor = source.descriptor();
    let mut delay = policy.initial_delay;
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        match source.fetch() {
            Ok(bytes) => return Ok(bytes),
            Err(cause) => {
                let cancelled = cancel.is_some_and(|flag| flag.load(Ordering::SeqCst));
                if attempts > policy.max_retries || cancelled {
                    return Err(LoadError::Fetch {
                        descriptor,
                        attempts,
                        cause,
                    });
                }
                warn!(
                    source = %descriptor,
                    attempt = attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %cause,
                    "fetch failed, retrying"
                );
                std::thread::sleep(delay);
                delay *= policy.backoff_multiplier;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orgmap_core::MemorySource;

    #[tokio::test]
    async fn succeeds_within_budget_with_exact_attempt_count() {
        let source = MemorySource::new("payload");
        source.fail_next_fetches(2, "blip");
        let policy = RetryPolicy {
            max_retries: 3,
            initial_delay: Duration::from_millis(1),
            backoff_multiplier: 2,
        };

        let bytes = fetch_with_retry(&source, &policy)
            .await
            .expect("fetch should eventually succeed");
        assert_eq!(bytes, Bytes::from("payload"));
        assert_eq!(source.fetch_count(), 3);
    }

    #[tokio::test]
    async fn exhausted_budget_reports_attempts_and_last_cause() {
        let source = MemorySource::new("payload");
        source.fail_next_fetches(10, "down");
        let policy = RetryPolicy {
            max_retries: 2,
            initial_delay: Duration::from_millis(1),
            backoff_multiplier: 2,
        };

        let err = fetch_with_retry(&source, &policy)
            .await
            .expect_err("fetch should fail");
        // Budget of 2 retries means exactly 3 attempts.
        assert_eq!(source.fetch_count(), 3);
        match err {
            LoadError::Fetch { attempts, cause, .. } => {
                assert_eq!(attempts, 3);
                assert!(cause.to_string().contains("down"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn blocking_retry_matches_async_budget() {
        let source = MemorySource::new("payload");
        source.fail_next_fetches(1, "blip");
        let policy = RetryPolicy {
            max_retries: 1,
            initial_delay: Duration::from_millis(1),
            backoff_multiplier: 2,
        };

        let bytes = fetch_with_retry_blocking(&source, &policy, None)
            .expect("fetch should eventually succeed");
        assert_eq!(bytes, Bytes::from("payload"));
        assert_eq!(source.fetch_count(), 2);
    }

    #[test]
    fn blocking_retry_stops_on_cancel() {
        let source = MemorySource::new("payload");
        source.fail_next_fetches(10, "down");
        let cancel = AtomicBool::new(true);
        let policy = RetryPolicy {
            max_retries: 5,
            initial_delay: Duration::from_secs(30),
            backoff_multiplier: 2,
        };

        let err = fetch_with_retry_blocking(&source, &policy, Some(&cancel))
            .expect_err("fetch should fail fast");
        assert!(matches!(err, LoadError::Fetch { attempts: 1, .. }));
        assert_eq!(source.fetch_count(), 1);
    }
}
