//! Fetcher trait and fetch error classification

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{Map, Value};
use thiserror::Error;

/// Field map produced by a fetch and accumulated across tiers
pub type Fields = Map<String, Value>;

/// Errors returned by a [`Fetcher`]
///
/// The split decides retry behaviour: transient failures are retried with
/// backoff, permanent ones are returned at once.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("Transient failure for {target}: {reason}")]
    Transient { target: String, reason: String },

    #[error("Permanent failure for {target}: {reason}")]
    Permanent { target: String, reason: String },
}

impl FetchError {
    pub fn transient(target: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Transient {
            target: target.into(),
            reason: reason.into(),
        }
    }

    pub fn permanent(target: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Permanent {
            target: target.into(),
            reason: reason.into(),
        }
    }

    /// Returns true if retrying the same request may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }

    /// Classifies a non-success HTTP status
    ///
    /// | Status | Class |
    /// |--------|-------|
    /// | 408, 425, 429 | Transient |
    /// | 5xx | Transient |
    /// | other 4xx (404, 410, 401, 403, ...) | Permanent |
    pub fn from_status(target: &str, status: StatusCode) -> Self {
        let reason = format!("HTTP {}", status.as_u16());
        if status == StatusCode::TOO_MANY_REQUESTS
            || status == StatusCode::REQUEST_TIMEOUT
            || status.as_u16() == 425
            || status.is_server_error()
        {
            Self::transient(target, reason)
        } else {
            Self::permanent(target, reason)
        }
    }

    /// Classifies a client-side request failure
    ///
    /// Timeouts and connection failures are transient; malformed requests,
    /// redirect errors and body decoding failures are permanent.
    pub fn from_reqwest(target: &str, error: &reqwest::Error) -> Self {
        if let Some(status) = error.status() {
            return Self::from_status(target, status);
        }
        if error.is_timeout() {
            Self::transient(target, "Request timeout")
        } else if error.is_connect() {
            Self::transient(target, format!("Connection failed: {}", error))
        } else if error.is_request() && !error.is_builder() {
            Self::transient(target, error.to_string())
        } else {
            Self::permanent(target, error.to_string())
        }
    }
}

/// One acquisition method, e.g. a plain HTTP GET or a rendering service
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetches whatever fields this method can produce for `target`
    async fn fetch(&self, target: &str) -> Result<Fields, FetchError>;

    /// Short label for logs
    fn name(&self) -> &str {
        "fetcher"
    }
}
