//! Exit code definitions for s3up
//!
//! CI systems only look at whether a step failed, but scripts wrapping the
//! plugin can use the code to tell bad configuration from a flaky backend.

use s3up_core::{Error, ErrorKind};

/// Exit codes for the s3up binary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Run completed successfully
    Success = 0,

    /// General/unspecified error
    GeneralError = 1,

    /// Invalid settings, patterns or arguments
    ConfigError = 2,

    /// A path could not be mapped to a key: bare directory, over-eager strip prefix
    ResolutionError = 3,

    /// Backend or local I/O failure while transferring
    TransferError = 4,

    /// Bucket or object does not exist
    NotFound = 5,
}

impl ExitCode {
    /// Convert exit code to i32 for use with std::process::exit
    #[inline]
    pub const fn as_i32(self) -> i32 {
        self as i32
    }

    /// Get a human-readable description of the exit code
    pub const fn description(self) -> &'static str {
        match self {
            Self::Success => "Run completed successfully",
            Self::GeneralError => "General error",
            Self::ConfigError => "Invalid configuration",
            Self::ResolutionError => "Could not resolve files to keys",
            Self::TransferError => "Transfer failed",
            Self::NotFound => "Bucket or object not found",
        }
    }
}

impl From<&Error> for ExitCode {
    fn from(error: &Error) -> Self {
        match error {
            Error::BucketNotFound(_) | Error::NotFound(_) => Self::NotFound,
            Error::General(_) => Self::GeneralError,
            other => match other.kind() {
                ErrorKind::Configuration => Self::ConfigError,
                ErrorKind::Resolution => Self::ResolutionError,
                ErrorKind::Transfer => Self::TransferError,
            },
        }
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code.as_i32()
    }
}

impl std::fmt::Display for ExitCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.description(), self.as_i32())
    }
}
