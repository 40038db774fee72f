//! Origin trait and implementations.
//!
//! One [`Origin`] per source locator. The archive engine only ever calls
//! [`Origin::stat`] during size prediction and [`Origin::reader`] during the
//! write pass, so implementations may make both as lazy as they like.

#[cfg(feature = "ftp")]
mod ftp;
#[cfg(feature = "http")]
mod http;
mod local;
mod memory;
#[cfg(feature = "mock")]
mod mock;
#[cfg(feature = "s3")]
mod s3;

#[cfg(feature = "ftp")]
pub use self::ftp::{DEFAULT_PORT as FTP_DEFAULT_PORT, FtpOrigin, FtpTarget};
#[cfg(feature = "http")]
pub use self::http::HttpOrigin;
#[cfg(feature = "s3")]
pub use aws_sdk_s3::Client as S3Client;
#[cfg(feature = "http")]
pub use reqwest::Client as HttpClient;
pub use self::local::LocalOrigin;
pub use self::memory::MemoryOrigin;
#[cfg(feature = "mock")]
pub use self::mock::MockOrigin;
#[cfg(feature = "s3")]
pub use self::s3::{S3Origin, S3Target};
use crate::error::{ErrorKind, Result};
use crate::sink::BoxSink;
use crate::{OriginKind, Stat};
use async_trait::async_trait;
use std::pin::Pin;
use tokio::io::AsyncRead;

pub type BoxRead = Pin<Box<dyn AsyncRead + Send>>;

/// Uniform access to one source of bytes.
///
/// # Examples
///
/// ```
/// use zipstream_storage::{Origin, origin::MemoryOrigin};
/// use tokio::io::AsyncReadExt;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let origin = MemoryOrigin::new("hello");
/// assert_eq!(origin.stat().await?.size, Some(5));
///
/// let mut contents = String::new();
/// origin.reader().await?.read_to_string(&mut contents).await?;
/// assert_eq!(contents, "hello");
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait Origin: Send + Sync {
    fn kind(&self) -> OriginKind;

    /// Opaque identity of the payload; feeds fingerprints.
    fn locator(&self) -> &str;

    /// Archive path used when the caller gives none.
    ///
    /// `None` means the caller must always supply one.
    fn default_archive_path(&self) -> Option<String>;

    /// Probe metadata without transferring the payload.
    async fn stat(&self) -> Result<Stat>;

    /// Open the payload for reading.
    async fn reader(&self) -> Result<BoxRead>;

    /// Open a sink that replaces the payload.
    async fn writer(&self) -> Result<BoxSink> {
        exn::bail!(ErrorKind::NotWritable(self.locator().to_string()))
    }
}

/// Final segment of a `/`-separated path, ignoring any query or fragment.
///
/// ```
/// use zipstream_storage::basename;
///
/// assert_eq!(basename("https://example.com/a/report.pdf?sig=1"), Some("report.pdf"));
/// assert_eq!(basename("bucket/dir/"), None);
/// ```
pub fn basename(path: &str) -> Option<&str> {
    let path = path.split(['?', '#']).next().unwrap_or(path);
    path.rsplit('/').next().filter(|name| !name.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("/var/data/file.txt", Some("file.txt"))]
    #[case("file.txt", Some("file.txt"))]
    #[case("s3://bucket/nested/key.bin", Some("key.bin"))]
    #[case("https://host/download#frag", Some("download"))]
    #[case("ftp://host/dir/", None)]
    #[case("", None)]
    fn test_basename(#[case] input: &str, #[case] expected: Option<&str>) {
        assert_eq!(basename(input), expected);
    }
}
