//! Post-redaction response validation.

use thiserror::Error;

/// Maximum accepted response content size.
pub const MAX_CONTENT_BYTES: usize = 1024 * 1024;

/// Substrings that indicate an upstream error leaked into content.
const ERROR_MARKERS: [&str; 4] = ["error:", "exception:", "failed:", "denied:"];

/// A violated validation rule.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("content is empty")]
    Empty,

    #[error("content is {0} bytes, limit is {MAX_CONTENT_BYTES}")]
    TooLarge(usize),

    #[error("content contains error marker {0:?}")]
    ErrorMarker(&'static str),
}

/// Apply the three default rules: non-empty, bounded size, no error-like
/// substrings. Marker matching is case-insensitive.
pub fn validate_content(content: &str) -> Result<(), ValidationError> {
    if content.trim().is_empty() {
        return Err(ValidationError::Empty);
    }
    if content.len() > MAX_CONTENT_BYTES {
        return Err(ValidationError::TooLarge(content.len()));
    }
    let lowered = content.to_lowercase();
    for marker in ERROR_MARKERS {
        if lowered.contains(marker) {
            return Err(ValidationError::ErrorMarker(marker));
        }
    }
    Ok(())
}
