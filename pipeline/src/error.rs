//! Error types for ingestion runs.

use mlb_stats_core::TransformError;
use mlb_stats_sqlite::SqliteError;
use thiserror::Error;

/// Errors that can occur while configuring or running the pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Invalid configuration or an unusable store; fatal for the run.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// File I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing or serialization failure.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// The input document could not be turned into rows.
    #[error(transparent)]
    Malformed(#[from] TransformError),

    /// The store rejected or failed a write.
    #[error(transparent)]
    Store(#[from] SqliteError),
}

/// Coarse classification recorded on failed files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    MalformedInput,
    DuplicateKey,
    Io,
    Store,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Configuration => "ConfigurationError",
            ErrorKind::MalformedInput => "MalformedInputError",
            ErrorKind::DuplicateKey => "DuplicateKeyError",
            ErrorKind::Io => "IOError",
            ErrorKind::Store => "StoreError",
        }
    }

    /// Whether a file failing this way stays failed until an operator
    /// clears it. Other kinds are retried on the next run.
    pub fn requires_review(self) -> bool {
        matches!(self, ErrorKind::MalformedInput | ErrorKind::DuplicateKey)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::Configuration(_) | PipelineError::Yaml(_) => ErrorKind::Configuration,
            PipelineError::Io(_) => ErrorKind::Io,
            PipelineError::Malformed(_) => ErrorKind::MalformedInput,
            PipelineError::Store(err) => match err {
                SqliteError::DuplicateKey { .. } | SqliteError::OverlappingRange { .. } => {
                    ErrorKind::DuplicateKey
                }
                SqliteError::Configuration(_) | SqliteError::InvalidPrefix(_) => {
                    ErrorKind::Configuration
                }
                SqliteError::DatabaseError(_) | SqliteError::ForeignKey { .. } => ErrorKind::Store,
            },
        }
    }
}

/// Convenience alias for results with [`PipelineError`].
pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        let malformed = PipelineError::from(TransformError::Malformed("not an object".into()));
        assert_eq!(malformed.kind().as_str(), "MalformedInputError");
        assert!(malformed.kind().requires_review());

        let duplicate = PipelineError::from(SqliteError::DuplicateKey {
            table: "mlb_games".into(),
            detail: "UNIQUE constraint failed".into(),
        });
        assert_eq!(duplicate.kind(), ErrorKind::DuplicateKey);

        let io = PipelineError::from(std::io::Error::other("disk gone"));
        assert_eq!(io.kind().to_string(), "IOError");
        assert!(!io.kind().requires_review());
    }

    #[test]
    fn test_malformed_message_is_not_repeated() {
        let err = PipelineError::from(TransformError::Malformed("top level is not an object".into()));
        assert_eq!(err.to_string(), "malformed input: top level is not an object");
    }

    #[test]
    fn test_store_errors_display_transparently() {
        let err = PipelineError::from(SqliteError::InvalidPrefix("x-".into()));
        assert!(err.to_string().starts_with("invalid prefix 'x-'"));
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }
}
