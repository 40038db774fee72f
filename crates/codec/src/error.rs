//! Codec Error Types
//!
//! Structured errors using `exn` for automatic location tracking and error
//! tree construction.

use derive_more::{Display, Error};

/// A codec error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for codec operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The compression stream for an entry could not be driven forward.
    Encoder,
    /// The requested compression method is not supported.
    #[display("unsupported compression method: {_0}")]
    UnsupportedMethod(#[error(not(source))] String),
    /// A value does not fit into its 32-bit (or 16-bit) record field; the
    /// archive must be written with Zip64 extensions enabled.
    #[display("{_0} does not fit without Zip64 extensions")]
    Overflow(#[error(not(source))] &'static str),
    /// A variable-length record field (name, comment) exceeds 65535 bytes.
    #[display("{_0} is longer than 65535 bytes")]
    FieldTooLong(#[error(not(source))] &'static str),
    /// An I/O operation failed while encoding.
    #[display("I/O error")]
    Io,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::Io)
    }

    /// Returns `true` if enabling Zip64 would make the failing record
    /// representable.
    pub fn needs_zip64(&self) -> bool {
        matches!(self, ErrorKind::Overflow(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exn::ResultExt;

    #[test]
    fn error_kind_display() {
        assert_eq!(
            ErrorKind::UnsupportedMethod("bzip2".to_string()).to_string(),
            "unsupported compression method: bzip2"
        );
        assert_eq!(
            ErrorKind::Overflow("central directory offset").to_string(),
            "central directory offset does not fit without Zip64 extensions"
        );
        assert_eq!(ErrorKind::Io.to_string(), "I/O error");
    }

    #[test]
    fn error_kind_retryable() {
        assert!(!ErrorKind::Overflow("entry count").is_retryable());
        assert!(!ErrorKind::Encoder.is_retryable());
        assert!(ErrorKind::Io.is_retryable());
    }

    #[test]
    fn error_kind_needs_zip64() {
        assert!(ErrorKind::Overflow("entry count").needs_zip64());
        assert!(!ErrorKind::FieldTooLong("file name").needs_zip64());
    }

    #[test]
    fn error_from_result() {
        let result: std::result::Result<(), std::io::Error> = Err(std::io::Error::other("deflate stream broke"));
        let err: Result<()> = result.or_raise(|| ErrorKind::Encoder);
        let exn = err.unwrap_err();
        assert_eq!(*exn, ErrorKind::Encoder);
    }
}
