//! Serialized front door to the shared [`RateBudget`].

use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tokio::time::{interval_at, sleep, Instant};
use tracing::warn;

use crate::exchange::error::ExchangeError;

use super::budget::{Gate, RateBudget, RateLimits};

/// Cooldown applied after a rate-limit response when the exchange does not
/// say how long to wait.
const DEFAULT_COOLDOWN: Duration = Duration::from_secs(60);

/// Gatekeeper consulted before every outbound call. The budget is the only
/// mutable state shared between workers and is touched exclusively through
/// these methods.
pub struct RateLimiter {
    limits: RateLimits,
    budget: Mutex<RateBudget>,
    reset_notify: Notify,
}

impl RateLimiter {
    /// Create the limiter and spawn its second/minute reset timers. The
    /// timers run on fixed wall-clock boundaries independent of request
    /// activity and exit once the limiter is dropped.
    pub fn start(limits: RateLimits) -> Arc<Self> {
        let limiter = Arc::new(Self {
            limits,
            budget: Mutex::new(RateBudget::new()),
            reset_notify: Notify::new(),
        });
        Self::spawn_reset_timers(Arc::downgrade(&limiter));
        limiter
    }

    fn spawn_reset_timers(weak: Weak<Self>) {
        tokio::spawn(async move {
            let start = Instant::now();
            let mut second = interval_at(start + Duration::from_secs(1), Duration::from_secs(1));
            let mut minute = interval_at(start + Duration::from_secs(60), Duration::from_secs(60));
            loop {
                tokio::select! {
                    _ = second.tick() => {
                        let Some(limiter) = weak.upgrade() else { return };
                        limiter.budget.lock().await.reset_second();
                        limiter.reset_notify.notify_waiters();
                    }
                    _ = minute.tick() => {
                        let Some(limiter) = weak.upgrade() else { return };
                        limiter.budget.lock().await.reset_minute();
                        limiter.reset_notify.notify_waiters();
                    }
                }
            }
        });
    }

    /// Suspend until the request fits every quota gate, then charge it.
    pub async fn acquire(&self, weight_cost: u32) {
        loop {
            let gate = {
                let mut budget = self.budget.lock().await;
                let now = Instant::now();
                match budget.check(weight_cost, &self.limits, now) {
                    Gate::Ready => {
                        budget.commit(weight_cost, now);
                        return;
                    }
                    gate => gate,
                }
            };
            match gate {
                Gate::Ready => unreachable!("handled above"),
                Gate::Defer(wait) => sleep(wait).await,
                // A reset between the check and this await only delays the
                // wakeup until the next tick, at most one second.
                Gate::AwaitReset => self.reset_notify.notified().await,
            }
        }
    }

    /// Feed a successful response back into the budget.
    pub async fn report_success(&self, used_weight: Option<u32>) {
        let mut budget = self.budget.lock().await;
        if let Some(weight) = used_weight {
            budget.adopt_used_weight(weight);
        }
        budget.observe_utilization(&self.limits);
    }

    /// Feed a failed call back into the budget. Only rate-limit failures
    /// carry quota information; everything else is the executor's problem.
    pub async fn report_failure(&self, error: &ExchangeError) {
        if let ExchangeError::RateLimited { retry_after } = error {
            let cooldown = retry_after.unwrap_or(DEFAULT_COOLDOWN);
            let mut budget = self.budget.lock().await;
            budget.penalize(cooldown, Instant::now());
            warn!(
                "exchange rate limit hit, cooling down {:?} (backoff x{:.2})",
                cooldown,
                budget.backoff_multiplier()
            );
        }
    }

    pub async fn current_backoff_multiplier(&self) -> f64 {
        self.budget.lock().await.backoff_multiplier()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits(per_second: u32, weight: u32, base_interval_ms: u64) -> RateLimits {
        RateLimits {
            max_requests_per_second: per_second,
            max_requests_per_minute: 10_000,
            max_weight_per_minute: weight,
            base_interval: Duration::from_millis(base_interval_ms),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn never_more_than_the_per_second_ceiling_in_any_window() {
        let limiter = RateLimiter::start(limits(2, 100_000, 0));
        let mut completions = Vec::new();
        for _ in 0..6 {
            limiter.acquire(1).await;
            completions.push(Instant::now());
        }
        for window_start in &completions {
            let in_window = completions
                .iter()
                .filter(|t| **t >= *window_start && **t < *window_start + Duration::from_secs(1))
                .count();
            assert!(in_window <= 2, "{} acquisitions in one second", in_window);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn weight_ceiling_holds_until_the_minute_resets() {
        let limiter = RateLimiter::start(limits(100, 10, 0));
        let begin = Instant::now();
        limiter.acquire(6).await;
        limiter.acquire(4).await;
        // Budget exhausted; the next acquire must park until the minute timer.
        limiter.acquire(6).await;
        assert!(begin.elapsed() >= Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limit_failure_imposes_a_cooldown() {
        let limiter = RateLimiter::start(limits(100, 100_000, 0));
        limiter
            .report_failure(&ExchangeError::RateLimited {
                retry_after: Some(Duration::from_secs(30)),
            })
            .await;
        let begin = Instant::now();
        limiter.acquire(1).await;
        assert!(begin.elapsed() >= Duration::from_secs(30));
        assert!((limiter.current_backoff_multiplier().await - 2.0).abs() < f64::EPSILON);
    }

    #[tokio::test(start_paused = true)]
    async fn high_utilization_stretches_request_spacing() {
        let limiter = RateLimiter::start(limits(100, 100, 100));
        limiter.acquire(1).await;
        limiter.report_success(Some(90)).await;
        let begin = Instant::now();
        limiter.acquire(1).await;
        // Spacing is base_interval * multiplier, stretched to 120ms.
        assert!(begin.elapsed() >= Duration::from_millis(120));
    }
}
