//! Failure taxonomy for exchange API calls

use std::time::Duration;
use thiserror::Error;

/// Every failed call is classified into exactly one of these. The first
/// three are retryable; the rest surface immediately.
#[derive(Debug, Error)]
pub enum ExchangeError {
    /// HTTP 429/418 or the provider's too-many-requests error code.
    #[error("rate limited by exchange")]
    RateLimited { retry_after: Option<Duration> },

    /// HTTP 5xx.
    #[error("server error {status}: {message}")]
    Server { status: u16, message: String },

    /// Connection reset, timeout, DNS failure.
    #[error("network error: {0}")]
    Network(String),

    /// Any other 4xx: malformed params, unknown symbol.
    #[error("bad request {status}: {message}")]
    BadRequest { status: u16, message: String },

    /// The exchange answered 200 with a body we cannot use.
    #[error("malformed response: {0}")]
    Parse(String),
}

impl ExchangeError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. } | Self::Server { .. } | Self::Network(_)
        )
    }

    pub(crate) fn from_transport(err: reqwest::Error) -> Self {
        Self::Network(err.to_string())
    }
}

pub type ExchangeResult<T> = Result<T, ExchangeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryability_follows_the_taxonomy() {
        assert!(ExchangeError::RateLimited { retry_after: None }.is_retryable());
        assert!(ExchangeError::Server { status: 502, message: String::new() }.is_retryable());
        assert!(ExchangeError::Network("reset".into()).is_retryable());
        assert!(!ExchangeError::BadRequest { status: 400, message: String::new() }.is_retryable());
        assert!(!ExchangeError::Parse("truncated".into()).is_retryable());
    }
}
