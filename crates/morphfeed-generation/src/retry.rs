//! Retry policy for transient invocation failures.
//!
//! Delay before retry `n` (0-indexed) is `min(base * 2^n, cap)` plus a random
//! jitter of up to `jitter_ratio` of that delay. Jitter is only ever added so
//! concurrent branches of one run spread out without retrying early.

use morphfeed_core::{CorrelationId, GenerationSettings};
use std::future::Future;
use std::time::Duration;

use crate::error::InvocationError;

const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_BASE_DELAY_MS: u64 = 250;
const DEFAULT_CAP_DELAY_MS: u64 = 1000;
const DEFAULT_JITTER_RATIO: f64 = 0.10;

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub base_delay: Duration,
    pub cap_delay: Duration,
    pub jitter_ratio: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: Duration::from_millis(DEFAULT_BASE_DELAY_MS),
            cap_delay: Duration::from_millis(DEFAULT_CAP_DELAY_MS),
            jitter_ratio: DEFAULT_JITTER_RATIO,
        }
    }
}

impl RetryPolicy {
    pub fn from_settings(settings: &GenerationSettings) -> Self {
        Self {
            max_retries: settings.max_retries,
            base_delay: Duration::from_millis(settings.base_delay_ms),
            cap_delay: Duration::from_millis(settings.cap_delay_ms),
            jitter_ratio: settings.jitter_ratio.clamp(0.0, 1.0),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Un-jittered delay before retry `attempt`.
    pub fn base_backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.cap_delay)
    }

    /// Upper bound of any delay produced by this policy.
    pub fn max_delay(&self) -> Duration {
        self.cap_delay + self.cap_delay.mul_f64(self.ratio())
    }

    fn ratio(&self) -> f64 {
        if self.jitter_ratio.is_finite() {
            self.jitter_ratio.clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    fn jittered(&self, attempt: u32) -> Duration {
        let delay = self.base_backoff(attempt);
        let jitter = delay.mul_f64(self.ratio() * rand::random::<f64>());
        delay + jitter
    }

    pub fn backoff(&self) -> Backoff {
        Backoff {
            policy: self.clone(),
            attempt: 0,
            previous: Duration::ZERO,
        }
    }
}

/// Sequence of delays for one branch. Private to that branch.
///
/// Once the cap is reached the jitter alone could make a delay shorter than
/// the one before it, so each delay is floored at its predecessor.
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: RetryPolicy,
    attempt: u32,
    previous: Duration,
}

impl Backoff {
    pub fn next_delay(&mut self) -> Duration {
        let delay = self
            .policy
            .jittered(self.attempt)
            .max(self.previous)
            .min(self.policy.max_delay());
        self.previous = delay;
        self.attempt = self.attempt.saturating_add(1);
        delay
    }
}

impl Iterator for Backoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        Some(self.next_delay())
    }
}

/// Run `op` until it succeeds, fails with a non-retryable error, or the policy
/// runs out of attempts.
///
/// `op` receives the 0-based attempt number. Returns the outcome together with
/// the number of attempts made. Exhausting the policy on a transient error
/// yields [`InvocationError::RetriesExhausted`] naming the last error kind; a
/// non-retryable error after earlier attempts is wrapped in
/// [`InvocationError::AfterRetries`] so the count travels with it.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    correlation_id: CorrelationId,
    operation: &str,
    mut op: F,
) -> (Result<T, InvocationError>, u32)
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, InvocationError>>,
{
    let max_attempts = policy.max_attempts();
    let mut backoff = policy.backoff();
    let mut attempt = 0u32;

    loop {
        let err = match op(attempt).await {
            Ok(value) => return (Ok(value), attempt + 1),
            Err(err) => err,
        };
        let attempts = attempt + 1;

        if !err.is_retryable() {
            return (Err(err.after_attempts(attempts)), attempts);
        }

        if attempts >= max_attempts {
            return (
                Err(InvocationError::RetriesExhausted {
                    last_kind: err.kind(),
                    attempts,
                    message: err.to_string(),
                }),
                attempts,
            );
        }

        let delay = backoff.next_delay();
        tracing::warn!(
            correlation_id = %correlation_id,
            operation = %operation,
            attempt = attempt,
            delay_ms = delay.as_millis() as u64,
            error_kind = %err.kind(),
            error = %err,
            "Transient failure, retrying"
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use morphfeed_core::FailureKind;
    use std::sync::atomic::{AtomicU32, Ordering};
    use uuid::Uuid;

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_millis(1),
            cap_delay: Duration::from_millis(4),
            jitter_ratio: 0.1,
        }
    }

    fn server_error() -> InvocationError {
        InvocationError::Server {
            status: 503,
            message: "unavailable".to_string(),
        }
    }

    #[test]
    fn test_base_backoff_doubles_then_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.base_backoff(0), Duration::from_millis(250));
        assert_eq!(policy.base_backoff(1), Duration::from_millis(500));
        assert_eq!(policy.base_backoff(2), Duration::from_millis(1000));
        assert_eq!(policy.base_backoff(3), Duration::from_millis(1000));
        assert_eq!(policy.base_backoff(40), Duration::from_millis(1000));
        assert_eq!(policy.max_attempts(), 4);
    }

    #[test]
    fn test_jitter_is_additive_and_bounded() {
        let policy = RetryPolicy::default();
        for attempt in 0..5 {
            for _ in 0..50 {
                let delay = policy.jittered(attempt);
                let base = policy.base_backoff(attempt);
                assert!(delay >= base);
                assert!(delay <= base + base.mul_f64(0.1));
            }
        }
    }

    #[test]
    fn test_backoff_is_non_decreasing_and_bounded() {
        let policy = RetryPolicy::default();
        for _ in 0..20 {
            let delays: Vec<Duration> = policy.backoff().take(8).collect();
            for pair in delays.windows(2) {
                assert!(pair[1] >= pair[0]);
            }
            assert!(delays.iter().all(|d| *d <= policy.max_delay()));
            assert!(delays[0] >= Duration::from_millis(250));
        }
    }

    #[tokio::test]
    async fn test_retryable_errors_stop_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let (result, attempts) =
            with_retry(&fast_policy(), CorrelationId::new(Uuid::nil()), "test", |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(server_error()) }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(attempts, 4);
        match result.unwrap_err() {
            InvocationError::RetriesExhausted {
                last_kind,
                attempts,
                ..
            } => {
                assert_eq!(last_kind, FailureKind::Server);
                assert_eq!(attempts, 4);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_auth_error_is_not_retried() {
        let calls = AtomicU32::new(0);
        let (result, attempts) =
            with_retry(&fast_policy(), CorrelationId::new(Uuid::nil()), "test", |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async {
                    Err::<(), _>(InvocationError::Auth {
                        status: 401,
                        message: "denied".to_string(),
                    })
                }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(attempts, 1);
        assert!(matches!(result, Err(InvocationError::Auth { .. })));
    }

    #[tokio::test]
    async fn test_permanent_error_after_retries_reports_every_attempt() {
        let (result, attempts) =
            with_retry(&fast_policy(), CorrelationId::new(Uuid::nil()), "test", |attempt| async move {
                if attempt < 2 {
                    Err::<(), _>(server_error())
                } else {
                    Err(InvocationError::Protocol {
                        status: Some(400),
                        message: "bad request".to_string(),
                    })
                }
            })
            .await;

        assert_eq!(attempts, 3);
        let err = result.unwrap_err();
        assert_eq!(err.kind(), FailureKind::Protocol);
        assert_eq!(err.attempts(), 3);
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_recovers_after_transient_failures() {
        let (result, attempts) =
            with_retry(&fast_policy(), CorrelationId::new(Uuid::nil()), "test", |attempt| async move {
                if attempt < 2 {
                    Err(InvocationError::RateLimited {
                        message: "slow down".to_string(),
                    })
                } else {
                    Ok(attempt)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(attempts, 3);
    }

    #[tokio::test]
    async fn test_zero_retries_makes_one_attempt() {
        let policy = RetryPolicy {
            max_retries: 0,
            ..fast_policy()
        };
        let (result, attempts) = with_retry(&policy, CorrelationId::new(Uuid::nil()), "test", |_| async {
            Err::<(), _>(InvocationError::Timeout {
                after: Duration::from_millis(5),
            })
        })
        .await;

        assert_eq!(attempts, 1);
        assert_eq!(result.unwrap_err().kind(), FailureKind::Timeout);
    }
}
