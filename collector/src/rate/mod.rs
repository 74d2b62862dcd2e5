//! Adaptive rate limiting shared by all API consumers

mod budget;
mod limiter;

pub use budget::{Gate, RateBudget, RateLimits};
pub use limiter::RateLimiter;
