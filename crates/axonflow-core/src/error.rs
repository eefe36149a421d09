//! Router error types surfaced to callers.

use thiserror::Error;

/// Errors that can occur when routing a completion request.
///
/// Callers only ever see these enumerated kinds; upstream secrets and raw
/// provider payloads are never echoed.
#[derive(Debug, Error)]
pub enum RouterError {
    /// No healthy provider was available at dispatch time.
    #[error("no providers available")]
    NoProviders,

    /// Both the primary and (if any) fallback provider failed.
    #[error("upstream failure via {provider}: {message}")]
    UpstreamFailure { provider: String, message: String },

    /// Caller-visible input validation failed. Never retried.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// A weight update was rejected; the previous weights are retained.
    #[error("invalid weights: {0}")]
    InvalidWeights(String),

    /// The per-call deadline expired. No fallback is attempted.
    #[error("request to {provider} timed out")]
    Timeout { provider: String },

    /// Post-processor content validation failed; the original content is
    /// withheld.
    #[error("response validation rejected: {0}")]
    ValidationRejected(String),
}

impl RouterError {
    /// Short machine-readable kind, used in structured log records.
    pub fn kind(&self) -> &'static str {
        match self {
            RouterError::NoProviders => "no_providers",
            RouterError::UpstreamFailure { .. } => "upstream_failure",
            RouterError::InvalidRequest(_) => "invalid_request",
            RouterError::InvalidWeights(_) => "invalid_weights",
            RouterError::Timeout { .. } => "timeout",
            RouterError::ValidationRejected(_) => "validation_rejected",
        }
    }
}

/// Router result type alias.
pub type RouterResult<T> = Result<T, RouterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(RouterError::NoProviders.kind(), "no_providers");
        assert_eq!(
            RouterError::Timeout {
                provider: "openai".into()
            }
            .kind(),
            "timeout"
        );
        assert_eq!(
            RouterError::InvalidWeights("sum out of range".into()).kind(),
            "invalid_weights"
        );
    }
}
