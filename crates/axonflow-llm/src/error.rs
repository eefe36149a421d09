//! Adapter error taxonomy.

use std::time::Duration;

use thiserror::Error;

/// Errors produced by a provider adapter call.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The upstream rejected the request (4xx other than auth/rate-limit).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Authentication or authorization failure (401/403).
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The upstream throttled the request (429).
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// The upstream returned a 5xx or the transport failed.
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// The upstream response could not be parsed into the canonical shape.
    #[error("failed to decode upstream response: {0}")]
    DecodeFailure(String),

    /// The per-call deadline expired before the upstream answered.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// The model identifier does not resolve to a supported model family.
    #[error("unsupported model: {0}")]
    UnsupportedModel(String),

    /// Required credentials were missing at construction time.
    #[error("missing credentials: {0}")]
    MissingCredentials(String),
}

impl ProviderError {
    /// Map an upstream HTTP status to the error taxonomy.
    pub fn from_status(status: u16, detail: impl Into<String>) -> Self {
        let detail = detail.into();
        match status {
            401 | 403 => ProviderError::Unauthorized(format!("status {status}: {detail}")),
            429 => ProviderError::RateLimited(format!("status {status}: {detail}")),
            400..=499 => ProviderError::BadRequest(format!("status {status}: {detail}")),
            _ => ProviderError::UpstreamUnavailable(format!("status {status}: {detail}")),
        }
    }

    /// Map a reqwest transport error, distinguishing deadline expiry.
    pub fn from_transport(err: reqwest::Error, deadline: Duration) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout(deadline)
        } else {
            ProviderError::UpstreamUnavailable(err.to_string())
        }
    }

    /// Short machine-readable kind, used in structured log records.
    pub fn kind(&self) -> &'static str {
        match self {
            ProviderError::BadRequest(_) => "bad_request",
            ProviderError::Unauthorized(_) => "unauthorized",
            ProviderError::RateLimited(_) => "rate_limited",
            ProviderError::UpstreamUnavailable(_) => "upstream_unavailable",
            ProviderError::DecodeFailure(_) => "decode_failure",
            ProviderError::Timeout(_) => "timeout",
            ProviderError::UnsupportedModel(_) => "unsupported_model",
            ProviderError::MissingCredentials(_) => "missing_credentials",
        }
    }

    /// Whether this error is a deadline expiry. Timeouts are never retried
    /// on a fallback provider.
    pub fn is_timeout(&self) -> bool {
        matches!(self, ProviderError::Timeout(_))
    }
}

/// Adapter result type alias.
pub type ProviderResult<T> = Result<T, ProviderError>;
