// ABOUTME: Retry with exponential backoff for idempotent network reads
// ABOUTME: Only transient network failures are retried; every other error returns immediately
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

use crate::constants::jwks::{DEFAULT_FETCH_RETRIES, DEFAULT_INITIAL_BACKOFF_MS};
use crate::errors::OAuthError;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Retry behaviour for idempotent reads (key sets, discovery documents)
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry; doubles on each subsequent retry
    pub initial_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_FETCH_RETRIES,
            initial_backoff_ms: DEFAULT_INITIAL_BACKOFF_MS,
        }
    }
}

impl RetryConfig {
    /// No retries at all
    #[must_use]
    pub const fn none() -> Self {
        Self {
            max_retries: 0,
            initial_backoff_ms: 0,
        }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2_u64.saturating_pow(attempt.saturating_sub(1));
        Duration::from_millis(self.initial_backoff_ms.saturating_mul(factor))
    }
}

/// Run `operation` until it succeeds, fails with a non-retryable error, or
/// the retry budget is spent
///
/// # Errors
///
/// Returns the last error produced by `operation`
pub async fn retry_idempotent<T, F, Fut>(
    what: &str,
    config: RetryConfig,
    mut operation: F,
) -> Result<T, OAuthError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, OAuthError>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Err(error) if error.is_retryable() && attempt < config.max_retries => {
                attempt += 1;
                let backoff = config.backoff(attempt);
                warn!(
                    "{what} failed ({error}) - retry {attempt}/{} after {}ms backoff",
                    config.max_retries,
                    backoff.as_millis()
                );
                tokio::time::sleep(backoff).await;
            }
            result => return result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_retries_network_failures_then_succeeds() {
        let calls = AtomicU32::new(0);
        let result = retry_idempotent("fetch", RetryConfig::default(), || async {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(OAuthError::network("connection reset"))
            } else {
                Ok(7)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_does_not_retry_rejections() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = retry_idempotent("fetch", RetryConfig::default(), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(OAuthError::signature("bad"))
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_backoff_doubles() {
        let config = RetryConfig {
            max_retries: 3,
            initial_backoff_ms: 100,
        };
        assert_eq!(config.backoff(1), Duration::from_millis(100));
        assert_eq!(config.backoff(3), Duration::from_millis(400));
    }
}
