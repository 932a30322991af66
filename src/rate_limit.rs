//! Rate governor for outbound platform calls.
//!
//! Every network-bound call the resolver or a document extractor performs is
//! admitted through a shared [`RateLimiter`]:
//!
//! - a global minimum inter-call interval derived from `calls_per_second`,
//!   serialized fairly across concurrent resolutions (the pacing mutex is
//!   held over the wait, so admissions queue in FIFO order);
//! - exponential-backoff retries on a rate-limit signal: delays start at
//!   `initial_retry_delay`, double per attempt, and cap at
//!   `max_retry_delay`, for up to `max_retries` retries.
//!
//! On exhaustion the last rate-limit error propagates to the caller
//! unchanged. Any non-rate-limit error propagates immediately without
//! retry.

use std::future::Future;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::config::RateLimitConfig;
use crate::error::MinerError;

/// Shared throttle for all outbound calls. One instance serves every
/// concurrent resolution; clone behind an `Arc`.
pub struct RateLimiter {
    config: RateLimitConfig,
    min_interval: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            min_interval: Duration::from_secs_f64(1.0 / config.calls_per_second),
            config,
            last_call: Mutex::new(None),
        }
    }

    /// Wait until the minimum inter-call interval has elapsed, then claim
    /// the slot. Holding the lock across the wait keeps admissions FIFO.
    async fn pace(&self) {
        let mut last = self.last_call.lock().await;
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.min_interval {
                tokio::time::sleep(self.min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }

    /// Admit an operation: pace it, run it, and retry under the backoff
    /// policy when it reports a rate-limit signal.
    pub async fn admit<T, F, Fut>(&self, mut operation: F) -> Result<T, MinerError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, MinerError>>,
    {
        let mut delay = self.config.initial_retry_delay;
        let mut attempt: u32 = 0;

        loop {
            self.pace().await;

            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_rate_limited() && attempt < self.config.max_retries => {
                    // Honor a server-provided Retry-After when it is longer
                    // than our own backoff, still capped at the ceiling.
                    let wait = match &err {
                        MinerError::RateLimited {
                            retry_after: Some(hint),
                            ..
                        } => delay.max(*hint).min(self.config.max_retry_delay),
                        _ => delay,
                    };
                    attempt += 1;
                    eprintln!(
                        "Warning: rate limited, retry {} of {} in {:.1}s",
                        attempt, self.config.max_retries, wait
                    );
                    tokio::time::sleep(Duration::from_secs_f64(wait)).await;
                    delay = (delay * 2.0).min(self.config.max_retry_delay);
                }
                Err(err) => return Err(err),
            }
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn test_config() -> RateLimitConfig {
        RateLimitConfig {
            calls_per_second: 100.0,
            max_retries: 3,
            initial_retry_delay: 0.1,
            max_retry_delay: 1.0,
        }
    }

    fn rate_limited_err() -> MinerError {
        MinerError::RateLimited {
            status: 429,
            retry_after: None,
            message: "too many requests".to_string(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_passes_through() {
        let limiter = RateLimiter::new(test_config());
        let result = limiter.admit(|| async { Ok::<_, MinerError>(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_then_succeeds() {
        let limiter = RateLimiter::new(test_config());
        let calls = Arc::new(AtomicU32::new(0));

        let calls2 = calls.clone();
        let result = limiter
            .admit(move || {
                let calls = calls2.clone();
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(rate_limited_err())
                    } else {
                        Ok("done")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_propagates_original_error() {
        let limiter = RateLimiter::new(test_config());
        let calls = Arc::new(AtomicU32::new(0));

        let calls2 = calls.clone();
        let result: Result<(), _> = limiter
            .admit(move || {
                let calls = calls2.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(MinerError::RateLimited {
                        status: 429,
                        retry_after: Some(0.2),
                        message: "slow down".to_string(),
                    })
                }
            })
            .await;

        // Initial attempt + max_retries retries.
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        match result.unwrap_err() {
            MinerError::RateLimited {
                status,
                retry_after,
                message,
            } => {
                assert_eq!(status, 429);
                assert_eq!(retry_after, Some(0.2));
                assert_eq!(message, "slow down");
            }
            other => panic!("expected RateLimited, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_rate_limit_error_not_retried() {
        let limiter = RateLimiter::new(test_config());
        let calls = Arc::new(AtomicU32::new(0));

        let calls2 = calls.clone();
        let result: Result<(), _> = limiter
            .admit(move || {
                let calls = calls2.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(MinerError::NotFound {
                        id: "PROJ-404".to_string(),
                    })
                }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(result.unwrap_err(), MinerError::NotFound { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_minimum_interval_enforced() {
        let limiter = RateLimiter::new(RateLimitConfig {
            calls_per_second: 2.0,
            ..test_config()
        });

        let start = Instant::now();
        for _ in 0..3 {
            limiter
                .admit(|| async { Ok::<_, MinerError>(()) })
                .await
                .unwrap();
        }
        // Three calls at 2/s: at least two 500ms gaps.
        assert!(start.elapsed() >= Duration::from_millis(1000));
    }
}
