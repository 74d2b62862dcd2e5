//! Retry/backoff wrapper: one visible call, one logical operation

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tracing::warn;

use crate::rate::RateLimiter;

use super::error::{ExchangeError, ExchangeResult};
use super::types::ApiResponse;

/// Retry behavior as data, consumed by the executor: the per-class floors
/// and ceilings are tunable and testable without touching control flow.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// A rate-limited attempt never retries sooner than this.
    pub rate_limit_floor: Duration,
    /// A 5xx attempt never retries sooner than this.
    pub server_error_floor: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            rate_limit_floor: Duration::from_secs(10),
            server_error_floor: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Exponential backoff capped at `max_delay`, raised to the floor for
    /// the failure class.
    pub fn delay_for(&self, error: &ExchangeError, attempt: u32) -> Duration {
        let exponential = self
            .base_delay
            .saturating_mul(1u32 << attempt.min(16))
            .min(self.max_delay);
        let floor = match error {
            ExchangeError::RateLimited { .. } => self.rate_limit_floor,
            ExchangeError::Server { .. } => self.server_error_floor,
            _ => Duration::ZERO,
        };
        exponential.max(floor)
    }
}

/// Issues one logical API operation through the rate limiter, retrying
/// transient failures and surfacing terminal ones as typed errors.
pub struct RequestExecutor {
    limiter: Arc<RateLimiter>,
    policy: RetryPolicy,
}

impl RequestExecutor {
    pub fn new(limiter: Arc<RateLimiter>, policy: RetryPolicy) -> Self {
        Self { limiter, policy }
    }

    /// Run `call` until it succeeds, its failure is non-retryable, or
    /// attempts are exhausted. Every attempt pays the limiter first and
    /// reports its outcome back to it.
    pub async fn execute<T, F, Fut>(&self, weight_cost: u32, call: F) -> ExchangeResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = ExchangeResult<ApiResponse<T>>>,
    {
        let mut attempt = 1;
        loop {
            self.limiter.acquire(weight_cost).await;
            match call().await {
                Ok(reply) => {
                    self.limiter.report_success(reply.used_weight).await;
                    return Ok(reply.value);
                }
                Err(error) => {
                    self.limiter.report_failure(&error).await;
                    if !error.is_retryable() || attempt >= self.policy.max_attempts {
                        return Err(error);
                    }
                    let delay = self.policy.delay_for(&error, attempt);
                    warn!(attempt, "request failed ({}), retrying in {:?}", error, delay);
                    sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rate::RateLimits;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    fn executor(policy: RetryPolicy) -> RequestExecutor {
        let limits = RateLimits {
            max_requests_per_second: 1000,
            max_requests_per_minute: 100_000,
            max_weight_per_minute: 1_000_000,
            base_interval: Duration::ZERO,
        };
        RequestExecutor::new(RateLimiter::start(limits), policy)
    }

    fn ok_reply() -> ExchangeResult<ApiResponse<u32>> {
        Ok(ApiResponse { value: 7, used_weight: None })
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limit_on_attempt_two_waits_the_floor_then_succeeds() {
        let executor = executor(RetryPolicy::default());
        let calls = AtomicU32::new(0);
        let begin = Instant::now();
        let result = executor
            .execute(1, || {
                let attempt = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    match attempt {
                        1 => Err(ExchangeError::Network("connection reset".into())),
                        2 => Err(ExchangeError::RateLimited { retry_after: None }),
                        _ => ok_reply(),
                    }
                }
            })
            .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // 2s network backoff, then >=10s rate-limit floor, then the limiter's
        // own 60s cooldown before attempt 3 is admitted.
        assert!(begin.elapsed() >= Duration::from_secs(12));
    }

    #[tokio::test(start_paused = true)]
    async fn bad_request_is_not_retried() {
        let executor = executor(RetryPolicy::default());
        let calls = AtomicU32::new(0);
        let result: ExchangeResult<u32> = executor
            .execute(1, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(ExchangeError::BadRequest { status: 400, message: "Invalid symbol.".into() }) }
            })
            .await;
        assert!(matches!(result, Err(ExchangeError::BadRequest { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn retryable_failures_exhaust_after_max_attempts() {
        let executor = executor(RetryPolicy { max_attempts: 3, ..Default::default() });
        let calls = AtomicU32::new(0);
        let result: ExchangeResult<u32> = executor
            .execute(1, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(ExchangeError::Server { status: 503, message: "down".into() }) }
            })
            .await;
        assert!(matches!(result, Err(ExchangeError::Server { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn delay_respects_class_floors_and_ceiling() {
        let policy = RetryPolicy::default();
        let network = ExchangeError::Network("reset".into());
        let rate = ExchangeError::RateLimited { retry_after: None };
        let server = ExchangeError::Server { status: 500, message: String::new() };

        assert_eq!(policy.delay_for(&network, 1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(&rate, 1), Duration::from_secs(10));
        assert_eq!(policy.delay_for(&server, 1), Duration::from_secs(5));
        // 2^6 = 64s, capped at 30s.
        assert_eq!(policy.delay_for(&network, 6), Duration::from_secs(30));
    }
}
