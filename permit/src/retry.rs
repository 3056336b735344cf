//! Bounded retry with a fixed delay.

use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Retry settings for chain access and signing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Delay between attempts (ms)
    pub delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            delay_ms: 1000,
        }
    }
}

impl RetryPolicy {
    /// A policy that never waits, for tests.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            delay_ms: 0,
        }
    }

    /// Run `operation` until it succeeds, attempts run out, or it fails with
    /// an error `retryable` rejects.
    ///
    /// Returns the last error when every attempt fails.
    pub async fn run<T, E, F, Fut, R>(&self, label: &str, mut operation: F, retryable: R) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
        R: Fn(&E) -> bool,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < attempts && retryable(&e) => {
                    warn!(operation = label, attempt, error = %e, "Attempt failed, retrying");
                    tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
                    attempt += 1;
                }
                Err(e) => {
                    debug!(operation = label, attempt, "Giving up");
                    return Err(e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_succeeds_after_failures() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, String> = RetryPolicy::immediate(5)
            .run(
                "flaky",
                || async {
                    let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                    if n < 3 {
                        Err(format!("failure {n}"))
                    } else {
                        Ok(n)
                    }
                },
                |_| true,
            )
            .await;

        assert_eq!(result, Ok(3));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<(), String> = RetryPolicy::immediate(5)
            .run(
                "broken",
                || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err("down".to_string())
                },
                |_| true,
            )
            .await;

        assert_eq!(result, Err("down".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_fixed_delay_between_attempts() {
        let start = tokio::time::Instant::now();
        let _: Result<(), &str> = RetryPolicy::default()
            .run("slow", || async { Err("no") }, |_| true)
            .await;

        assert_eq!(start.elapsed(), Duration::from_millis(4000));
    }

    #[tokio::test]
    async fn test_permanent_error_is_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), String> = RetryPolicy::immediate(5)
            .run(
                "decrypt",
                || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err("wrong passphrase".to_string())
                },
                |e| !e.contains("passphrase"),
            )
            .await;

        tokio_test::assert_err!(result);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
