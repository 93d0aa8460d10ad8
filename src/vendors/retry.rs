//! Bounded exponential backoff for vendor lookups.
//!
//! Only transient failures (see [`ResolveError::is_transient`]) are retried.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, warn};

use crate::error::ResolveError;

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retries after the first attempt (default: 2).
    pub max_retries: u32,
    /// Delay before the first retry (default: 500ms).
    pub base_delay: Duration,
    /// Upper bound on any single delay (default: 5s).
    pub max_delay: Duration,
    /// Up to this fraction of the delay is added as random jitter (default: 0.25).
    pub jitter_fraction: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(5),
            jitter_fraction: 0.25,
        }
    }
}

impl RetryConfig {
    /// Single attempt, no waiting.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }
}

/// Delay before retry `attempt` (0-indexed): `min(base * 2^n, max)` plus jitter.
pub fn compute_delay(config: &RetryConfig, attempt: u32) -> Duration {
    let exp = 2u64.saturating_pow(attempt);
    let base_ms = config.base_delay.as_millis() as u64;
    let capped_ms = base_ms
        .saturating_mul(exp)
        .min(config.max_delay.as_millis() as u64);

    let jitter_max_ms = (capped_ms as f64 * config.jitter_fraction) as u64;
    let jitter_ms = if jitter_max_ms > 0 {
        rand::thread_rng().gen_range(0..=jitter_max_ms)
    } else {
        0
    };

    Duration::from_millis(capped_ms + jitter_ms)
}

/// Run `op` until it succeeds, fails permanently, or retries run out.
pub async fn with_retry<T, F, Fut>(
    config: &RetryConfig,
    vendor: &str,
    mut op: F,
) -> Result<T, ResolveError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ResolveError>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => {
                if attempt > 0 {
                    debug!(vendor, attempt, "Lookup succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) if err.is_transient() && attempt < config.max_retries => {
                let delay = compute_delay(config, attempt);
                warn!(
                    vendor,
                    attempt = attempt + 1,
                    max_retries = config.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Transient lookup failure, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    fn fast(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
            jitter_fraction: 0.0,
        }
    }

    fn server_error() -> ResolveError {
        ResolveError::Status {
            vendor: "hpe".into(),
            status: 503,
        }
    }

    #[test]
    fn delay_doubles_until_capped() {
        let config = RetryConfig {
            max_retries: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(350),
            jitter_fraction: 0.0,
        };
        assert_eq!(compute_delay(&config, 0), Duration::from_millis(100));
        assert_eq!(compute_delay(&config, 1), Duration::from_millis(200));
        assert_eq!(compute_delay(&config, 2), Duration::from_millis(350));
        assert_eq!(compute_delay(&config, 40), Duration::from_millis(350));
    }

    #[test]
    fn jitter_stays_within_fraction() {
        let config = RetryConfig {
            base_delay: Duration::from_millis(100),
            jitter_fraction: 0.5,
            ..RetryConfig::default()
        };
        for _ in 0..50 {
            let delay = compute_delay(&config, 0);
            assert!(delay >= Duration::from_millis(100));
            assert!(delay <= Duration::from_millis(150));
        }
    }

    #[tokio::test]
    async fn retries_transient_then_succeeds() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result = with_retry(&fast(2), "hpe", move || async move {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(server_error())
            } else {
                Ok("PART")
            }
        })
        .await;
        assert_eq!(result.unwrap(), "PART");
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<(), _> = with_retry(&fast(2), "hpe", move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(server_error())
        })
        .await;
        assert!(matches!(result, Err(ResolveError::Status { status: 503, .. })));
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_errors_are_not_retried() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<(), _> = with_retry(&fast(3), "lenovo", move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(ResolveError::Status {
                vendor: "lenovo".into(),
                status: 404,
            })
        })
        .await;
        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
