//! Archive Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// An archive error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for archive operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// A size was required (calculate pass) but the origin could not report one.
    #[display("size of {_0} cannot be resolved")]
    UnresolvableSize(#[error(not(source))] String),
    /// A cache or output target cannot be written to.
    #[display("{_0} is not writable")]
    NotWritable(#[error(not(source))] String),
    /// The origin has no natural file name and none was given.
    #[display("{_0} needs an explicit archive path")]
    MissingArchivePath(#[error(not(source))] String),
    /// Reading a source failed mid-assembly.
    #[display("could not read source {_0}")]
    SourceRead(#[error(not(source))] String),
    /// The output (or its cache copy) refused bytes.
    #[display("could not write archive output")]
    SinkWrite,
    /// A value overflowed its 32-bit field; set `zip64 = true`.
    #[display("archive exceeds classic ZIP limits, enable Zip64")]
    Zip64Required,
    /// Entry name or comment cannot be encoded.
    #[display("invalid entry: {_0}")]
    InvalidEntry(#[error(not(source))] String),
    /// Locator kind is compiled out or names an unknown disk.
    #[display("unsupported origin: {_0}")]
    UnsupportedOrigin(#[error(not(source))] String),
    #[display("storage error")]
    Storage,
    #[display("ZIP encoding error")]
    Codec,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::SourceRead(_) | Self::SinkWrite | Self::Storage)
    }
}
