//! Failures of the positions API, and how they surface to the engine.

use fight_exposure_core::ExposureError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExchangeError {
    /// Non-2xx response other than 429.
    #[error("exchange returned HTTP {status}: {body}")]
    Api { status: u16, body: String },

    /// 2xx response with `success: false`.
    #[error("exchange rejected positions request: {0}")]
    Rejected(String),

    /// HTTP 429. `retry_after_secs` comes from the `Retry-After` header.
    #[error("exchange throttled the request (retry after {retry_after_secs}s)")]
    RateLimit { retry_after_secs: u64 },

    #[error("exchange unreachable: {0}")]
    Network(String),

    #[error("positions request timed out: {0}")]
    Timeout(String),

    #[error("account cannot be queried: {0}")]
    InvalidAccount(String),

    #[error("exchange client misconfigured: {0}")]
    Configuration(String),

    /// The body did not match the positions envelope.
    #[error("unexpected positions payload: {0}")]
    Serialization(String),
}

impl ExchangeError {
    pub fn api(status: u16, body: impl Into<String>) -> Self {
        Self::Api {
            status,
            body: body.into(),
        }
    }

    /// Throttling, dropped connections and timeouts. Safe to repeat as-is.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimit { .. } | Self::Network(_) | Self::Timeout(_)
        )
    }

    /// Retryable errors plus 5xx responses: the exchange may recover on its own.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        self.is_retryable() || matches!(self, Self::Api { status, .. } if *status >= 500)
    }
}

impl From<reqwest::Error> for ExchangeError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_decode() {
            Self::Serialization(err.to_string())
        } else if err.is_connect() {
            Self::Network(format!("connect: {err}"))
        } else {
            Self::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ExchangeError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// The engine only distinguishes "positions unavailable".
impl From<ExchangeError> for ExposureError {
    fn from(err: ExchangeError) -> Self {
        Self::ExchangeUnavailable(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ExchangeError>;
