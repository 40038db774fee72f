//! Storage Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use std::io::Error as IoError;

/// A storage error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for storage operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Nothing exists at the locator
    #[display("not found: {_0}")]
    NotFound(#[error(not(source))] String),
    /// Access denied (permissions or credentials)
    #[display("permission denied: {_0}")]
    PermissionDenied(#[error(not(source))] String),
    /// Underlying I/O error
    #[display("I/O error: {_0}")]
    Io(IoError),
    /// Network-related error (HTTP, S3, FTP connections, etc.)
    #[display("network error: {_0}")]
    Network(#[error(not(source))] String),
    /// The origin kind cannot be opened for writing (HTTP, in-memory)
    #[display("not writable: {_0}")]
    NotWritable(#[error(not(source))] String),
    /// Locator could not be parsed for the requested origin kind
    #[display("invalid locator: {_0}")]
    InvalidLocator(#[error(not(source))] String),
    /// A sink was written to after being closed
    #[display("sink already closed: {_0}")]
    Closed(#[error(not(source))] String),
    /// Backend-specific error
    #[display("backend error: {_0}")]
    BackendError(#[error(not(source))] String),
}
impl From<IoError> for ErrorKind {
    fn from(err: IoError) -> Self {
        Self::Io(err)
    }
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Network(_) | Self::BackendError(_))
    }

    /// Map an I/O error against the locator it happened on.
    pub fn from_io(err: IoError, locator: &str) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(locator.to_string()),
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(locator.to_string()),
            _ => Self::Io(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(std::io::ErrorKind::NotFound, "not found: /tmp/x")]
    #[case(std::io::ErrorKind::PermissionDenied, "permission denied: /tmp/x")]
    fn test_from_io(#[case] kind: std::io::ErrorKind, #[case] expected: &str) {
        let mapped = ErrorKind::from_io(IoError::from(kind), "/tmp/x");
        assert_eq!(mapped.to_string(), expected);
        assert!(!mapped.is_retryable());
    }

    #[test]
    fn test_other_io_errors_are_retryable() {
        let mapped = ErrorKind::from_io(IoError::other("disk on fire"), "/tmp/x");
        assert!(matches!(mapped, ErrorKind::Io(_)));
        assert!(mapped.is_retryable());
    }
}
