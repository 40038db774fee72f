use derive_more::Display;
use time::OffsetDateTime;

/// Metadata probe result for an origin.
///
/// A `None` size means the origin cannot report its length without
/// transferring the payload (e.g. an HTTP response without a length header).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Stat {
    pub size: Option<u64>,
    pub modified: Option<OffsetDateTime>,
}

impl Stat {
    #[must_use]
    pub fn sized(size: u64) -> Self {
        Self { size: Some(size), modified: None }
    }

    #[must_use]
    pub fn with_modified(mut self, modified: Option<OffsetDateTime>) -> Self {
        self.modified = modified;
        self
    }
}

/// Which adapter backs an origin; used for logging and dispatch decisions.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Hash)]
pub enum OriginKind {
    #[display("local")]
    Local,
    #[display("memory")]
    Memory,
    #[display("s3")]
    S3,
    #[display("http")]
    Http,
    #[display("ftp")]
    Ftp,
    #[display("mock")]
    Mock,
}
