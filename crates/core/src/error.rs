//! Error types for s3up-core
//!
//! Every failure in the sync engine is fatal to the run. Errors are grouped
//! into configuration, resolution and transfer kinds so the binary can map
//! them onto distinct exit codes.

use thiserror::Error;

/// Result type alias for s3up-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Broad classification of an [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input detected before any transfer starts
    Configuration,
    /// A matched path cannot be turned into an object key
    Resolution,
    /// The storage backend or local I/O failed mid-batch
    Transfer,
}

/// Error types for s3up-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid or incomplete configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// A rule, exclude or removal pattern failed to compile
    #[error("Invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// Strip prefix failed validation
    #[error("Invalid strip prefix: {0}")]
    InvalidStripPrefix(String),

    /// A matched path could not be resolved into an object key
    #[error("Resolution error: {0}")]
    Resolution(String),

    /// Configured bucket is not visible with the given credentials
    #[error("Could not find bucket: {0}")]
    BucketNotFound(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parsing error
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Authentication error
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Network error
    #[error("Network error: {0}")]
    Network(String),

    /// General error
    #[error("{0}")]
    General(String),
}

impl Error {
    /// Create an [`Error::InvalidPattern`]
    pub fn invalid_pattern(pattern: impl Into<String>, reason: impl ToString) -> Self {
        Error::InvalidPattern {
            pattern: pattern.into(),
            reason: reason.to_string(),
        }
    }

    /// Classify this error
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Error::Config(_)
            | Error::InvalidPattern { .. }
            | Error::InvalidStripPrefix(_)
            | Error::TomlParse(_)
            | Error::Json(_)
            | Error::InvalidUrl(_) => ErrorKind::Configuration,
            Error::Resolution(_) => ErrorKind::Resolution,
            Error::BucketNotFound(_)
            | Error::Io(_)
            | Error::Auth(_)
            | Error::NotFound(_)
            | Error::Network(_)
            | Error::General(_) => ErrorKind::Transfer,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(Error::Config("x".into()).kind(), ErrorKind::Configuration);
        assert_eq!(
            Error::invalid_pattern("(", "unclosed group").kind(),
            ErrorKind::Configuration
        );
        assert_eq!(
            Error::InvalidStripPrefix("x".into()).kind(),
            ErrorKind::Configuration
        );
        assert_eq!(Error::Resolution("x".into()).kind(), ErrorKind::Resolution);
        assert_eq!(Error::Network("x".into()).kind(), ErrorKind::Transfer);
        assert_eq!(Error::BucketNotFound("b".into()).kind(), ErrorKind::Transfer);
    }

    #[test]
    fn test_error_display() {
        let err = Error::BucketNotFound("artifacts".into());
        assert_eq!(err.to_string(), "Could not find bucket: artifacts");

        let err = Error::invalid_pattern("[a", "unterminated class");
        assert_eq!(err.to_string(), "Invalid pattern '[a': unterminated class");
    }
}
