//! File sources: one queued entry and everything needed to write it.

use crate::error::{ErrorKind, Result};
use crate::path::normalize;
use exn::{OptionExt, ResultExt};
use std::fmt;
use time::OffsetDateTime;
use tokio::sync::OnceCell;
use zipstream_codec::Method;
use zipstream_storage::error::Result as StorageResult;
use zipstream_storage::{BoxRead, BoxSink, OriginHandle, Stat};

/// A named, fingerprintable, streamable unit of input.
///
/// The metadata probe runs at most once; its result (or failure, which is
/// remembered as "unknown") is shared by prediction and the write pass.
pub struct FileSource {
    origin: OriginHandle,
    archive_path: String,
    comment: String,
    size: Option<u64>,
    method: Option<Method>,
    stat: OnceCell<Stat>,
}

impl FileSource {
    /// Wrap an origin, falling back to its default archive path.
    pub fn new(origin: OriginHandle, archive_path: Option<&str>) -> Result<Self> {
        let archive_path = archive_path
            .map(str::to_string)
            .or_else(|| origin.default_archive_path())
            .filter(|path| !normalize(path, false).is_empty())
            .ok_or_raise(|| ErrorKind::MissingArchivePath(origin.locator().to_string()))?;
        Ok(Self {
            origin,
            archive_path,
            comment: String::new(),
            size: None,
            method: None,
            stat: OnceCell::new(),
        })
    }

    #[must_use]
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    /// Override whatever the origin would report.
    #[must_use]
    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    #[must_use]
    pub fn with_method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    pub fn origin(&self) -> &OriginHandle {
        &self.origin
    }

    pub fn locator(&self) -> &str {
        self.origin.locator()
    }

    /// The path as given, before normalization.
    pub fn raw_archive_path(&self) -> &str {
        &self.archive_path
    }

    /// The in-archive path; normalized on every read.
    pub fn archive_path(&self, ascii: bool) -> String {
        normalize(&self.archive_path, ascii)
    }

    pub fn set_archive_path(&mut self, path: impl Into<String>) {
        self.archive_path = path.into();
    }

    pub fn comment(&self) -> &str {
        &self.comment
    }

    /// Per-entry override; `None` means "use the archive's method".
    pub fn method(&self) -> Option<Method> {
        self.method
    }

    async fn stat(&self) -> &Stat {
        self.stat
            .get_or_init(|| async {
                match self.origin.stat().await {
                    Ok(stat) => stat,
                    Err(e) => {
                        tracing::warn!(locator = %self.locator(), error = ?e, "metadata probe failed, size unknown");
                        Stat::default()
                    },
                }
            })
            .await
    }

    /// Byte length of the payload, if it can be known without reading it.
    pub async fn resolve_size(&self) -> Option<u64> {
        match self.size {
            Some(size) => Some(size),
            None => self.stat().await.size,
        }
    }

    /// Like [`resolve_size`](Self::resolve_size), but a missing size is an error.
    pub async fn require_size(&self) -> Result<u64> {
        self.resolve_size()
            .await
            .ok_or_raise(|| ErrorKind::UnresolvableSize(self.locator().to_string()))
    }

    pub async fn is_size_predictable(&self) -> bool {
        self.resolve_size().await.is_some()
    }

    pub async fn modified(&self) -> Option<OffsetDateTime> {
        self.stat().await.modified
    }

    /// Stable identity of this entry: locator, archive path, size and comment.
    pub async fn fingerprint(&self, ascii: bool) -> String {
        let mut hasher = blake3::Hasher::new();
        hash_field(&mut hasher, self.locator().as_bytes());
        hash_field(&mut hasher, self.archive_path(ascii).as_bytes());
        match self.resolve_size().await {
            Some(size) => hash_field(&mut hasher, &size.to_le_bytes()),
            None => hash_field(&mut hasher, b"unknown"),
        }
        hash_field(&mut hasher, self.comment.as_bytes());
        hasher.finalize().to_hex().to_string()
    }

    /// Open the payload. Called once per write pass.
    pub async fn open_read(&self) -> StorageResult<BoxRead> {
        self.origin.reader().await
    }

    pub async fn open_write(&self) -> Result<BoxSink> {
        self.origin
            .writer()
            .await
            .or_raise(|| ErrorKind::NotWritable(self.locator().to_string()))
    }
}

impl fmt::Debug for FileSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileSource")
            .field("locator", &self.locator())
            .field("archive_path", &self.archive_path)
            .field("comment", &self.comment)
            .field("size", &self.size)
            .field("method", &self.method)
            .finish_non_exhaustive()
    }
}

/// Length-prefixed so adjacent fields can't run into each other.
pub(crate) fn hash_field(hasher: &mut blake3::Hasher, bytes: &[u8]) {
    hasher.update(&(bytes.len() as u64).to_le_bytes());
    hasher.update(bytes);
}
