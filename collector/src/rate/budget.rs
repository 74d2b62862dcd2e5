//! Quota accounting for outbound API calls. Pure state, no I/O.

use std::time::Duration;
use tokio::time::Instant;

const BACKOFF_GROWTH: f64 = 1.2;
const BACKOFF_DECAY: f64 = 0.95;
const BACKOFF_MAX: f64 = 5.0;
const HIGH_UTILIZATION: f64 = 0.8;
const LOW_UTILIZATION: f64 = 0.5;

/// Externally imposed quota ceilings.
#[derive(Debug, Clone)]
pub struct RateLimits {
    pub max_requests_per_second: u32,
    pub max_requests_per_minute: u32,
    pub max_weight_per_minute: u32,
    /// Minimum spacing between requests before the backoff multiplier is
    /// applied.
    pub base_interval: Duration,
}

impl Default for RateLimits {
    fn default() -> Self {
        Self {
            max_requests_per_second: 10,
            max_requests_per_minute: 1000,
            max_weight_per_minute: 5000,
            base_interval: Duration::from_millis(100),
        }
    }
}

/// What a caller must do before its request may proceed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    Ready,
    /// Request spacing or an explicit cooldown; wait this long and re-check.
    Defer(Duration),
    /// A counter ceiling is hit; wait for the next wall-clock reset.
    AwaitReset,
}

/// Rolling counters plus the adaptive backoff multiplier.
///
/// The second/minute counters are reset by external timers on fixed
/// wall-clock boundaries, not a sliding window. Worst case this permits a
/// burst of 2x the nominal rate across a boundary crossing; the ceilings are
/// configured with enough headroom that this stays inside the provider's
/// enforcement.
#[derive(Debug)]
pub struct RateBudget {
    weight_used: u32,
    requests_this_second: u32,
    requests_this_minute: u32,
    backoff_multiplier: f64,
    last_request_at: Option<Instant>,
    cooldown_until: Option<Instant>,
}

impl RateBudget {
    pub fn new() -> Self {
        Self {
            weight_used: 0,
            requests_this_second: 0,
            requests_this_minute: 0,
            backoff_multiplier: 1.0,
            last_request_at: None,
            cooldown_until: None,
        }
    }

    /// Check every gate for a request of the given weight.
    pub fn check(&self, weight_cost: u32, limits: &RateLimits, now: Instant) -> Gate {
        if let Some(until) = self.cooldown_until {
            if until > now {
                return Gate::Defer(until - now);
            }
        }
        if self.weight_used + weight_cost > limits.max_weight_per_minute
            || self.requests_this_second >= limits.max_requests_per_second
            || self.requests_this_minute >= limits.max_requests_per_minute
        {
            return Gate::AwaitReset;
        }
        let spacing = limits.base_interval.mul_f64(self.backoff_multiplier);
        if let Some(last) = self.last_request_at {
            let next_allowed = last + spacing;
            if next_allowed > now {
                return Gate::Defer(next_allowed - now);
            }
        }
        Gate::Ready
    }

    /// Charge one request against every counter.
    pub fn commit(&mut self, weight_cost: u32, now: Instant) {
        self.weight_used += weight_cost;
        self.requests_this_second += 1;
        self.requests_this_minute += 1;
        self.last_request_at = Some(now);
    }

    /// The header-reported counter is authoritative when present.
    pub fn adopt_used_weight(&mut self, weight: u32) {
        self.weight_used = weight;
    }

    /// Stretch the inter-request spacing under load, relax it when idle.
    pub fn observe_utilization(&mut self, limits: &RateLimits) {
        let utilization = f64::from(self.weight_used) / f64::from(limits.max_weight_per_minute);
        if utilization > HIGH_UTILIZATION {
            self.backoff_multiplier = (self.backoff_multiplier * BACKOFF_GROWTH).min(BACKOFF_MAX);
        } else if utilization < LOW_UTILIZATION && self.backoff_multiplier > 1.0 {
            self.backoff_multiplier = (self.backoff_multiplier * BACKOFF_DECAY).max(1.0);
        }
    }

    /// The exchange said we are over quota: double the spacing and hold every
    /// caller until the cooldown deadline passes.
    pub fn penalize(&mut self, cooldown: Duration, now: Instant) {
        self.backoff_multiplier = (self.backoff_multiplier * 2.0).min(BACKOFF_MAX);
        let until = now + cooldown;
        match self.cooldown_until {
            Some(existing) if existing >= until => {}
            _ => self.cooldown_until = Some(until),
        }
    }

    pub fn reset_second(&mut self) {
        self.requests_this_second = 0;
    }

    pub fn reset_minute(&mut self) {
        self.requests_this_minute = 0;
        self.weight_used = 0;
    }

    pub fn backoff_multiplier(&self) -> f64 {
        self.backoff_multiplier
    }

    pub fn weight_used(&self) -> u32 {
        self.weight_used
    }
}

impl Default for RateBudget {
    fn default() -> Self {
        Self::new()
    }
}
