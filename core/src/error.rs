//! Error types for the transform stage.

use thiserror::Error;

/// Failures that reject a whole input document.
///
/// Problems confined to one sub-record are not errors; they are reported as
/// [`RecordIssue`](crate::RecordIssue)s and the record is dropped.
#[derive(Debug, Error)]
pub enum TransformError {
    /// The document is not valid JSON.
    #[error("malformed input: invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The document parsed but does not have the expected top-level shape.
    #[error("malformed input: {0}")]
    Malformed(String),
}

/// Convenience alias for results with [`TransformError`].
pub type Result<T> = std::result::Result<T, TransformError>;
