//! Scriptable origin for tests.

use crate::error::{ErrorKind, Result};
use crate::origin::{BoxRead, Origin, basename};
use crate::sink::{BoxSink, MemorySink};
use crate::{OriginKind, Stat};
use async_trait::async_trait;
use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use time::OffsetDateTime;

/// In-memory origin whose behaviour can be bent for tests.
///
/// The reported size can be overridden independently of the payload, which
/// lets size prediction be exercised against multi-gigabyte entries without
/// allocating them.
///
/// # Examples
///
/// ```
/// use zipstream_storage::{Origin, origin::MockOrigin};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let origin = MockOrigin::new("mock://huge.bin", b"tiny").with_reported_size(Some(5 << 30));
/// assert_eq!(origin.stat().await?.size, Some(5 << 30));
/// assert_eq!(origin.stat_calls(), 1);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct MockOrigin {
    locator: String,
    data: Arc<[u8]>,
    reported_size: Option<Option<u64>>,
    modified: Option<OffsetDateTime>,
    fail_stat: bool,
    fail_reads: bool,
    written: Option<MemorySink>,
    stat_calls: Arc<AtomicUsize>,
    read_calls: Arc<AtomicUsize>,
}

impl MockOrigin {
    pub fn new(locator: impl Into<String>, data: impl AsRef<[u8]>) -> Self {
        Self {
            locator: locator.into(),
            data: Arc::from(data.as_ref()),
            reported_size: None,
            modified: None,
            fail_stat: false,
            fail_reads: false,
            written: None,
            stat_calls: Arc::default(),
            read_calls: Arc::default(),
        }
    }

    /// Report this size from `stat` instead of the payload length.
    /// `None` reports an unknown size.
    #[must_use]
    pub fn with_reported_size(mut self, size: Option<u64>) -> Self {
        self.reported_size = Some(size);
        self
    }

    #[must_use]
    pub fn with_modified(mut self, modified: OffsetDateTime) -> Self {
        self.modified = Some(modified);
        self
    }

    #[must_use]
    pub fn failing_stat(mut self) -> Self {
        self.fail_stat = true;
        self
    }

    #[must_use]
    pub fn failing_reads(mut self) -> Self {
        self.fail_reads = true;
        self
    }

    /// Accept writes into the given sink.
    #[must_use]
    pub fn writable(mut self, sink: MemorySink) -> Self {
        self.written = Some(sink);
        self
    }

    pub fn stat_calls(&self) -> usize {
        self.stat_calls.load(Ordering::Acquire)
    }

    pub fn read_calls(&self) -> usize {
        self.read_calls.load(Ordering::Acquire)
    }
}

#[async_trait]
impl Origin for MockOrigin {
    fn kind(&self) -> OriginKind {
        OriginKind::Mock
    }

    fn locator(&self) -> &str {
        &self.locator
    }

    fn default_archive_path(&self) -> Option<String> {
        basename(&self.locator).map(str::to_string)
    }

    async fn stat(&self) -> Result<Stat> {
        self.stat_calls.fetch_add(1, Ordering::AcqRel);
        if self.fail_stat {
            exn::bail!(ErrorKind::Network(format!("{}: stat refused", self.locator)));
        }
        let size = self.reported_size.unwrap_or(Some(self.data.len() as u64));
        Ok(Stat { size, modified: self.modified })
    }

    async fn reader(&self) -> Result<BoxRead> {
        self.read_calls.fetch_add(1, Ordering::AcqRel);
        if self.fail_reads {
            exn::bail!(ErrorKind::Network(format!("{}: connection reset", self.locator)));
        }
        Ok(Box::pin(Cursor::new(Arc::clone(&self.data))))
    }

    async fn writer(&self) -> Result<BoxSink> {
        match &self.written {
            Some(sink) => Ok(Box::new(sink.clone())),
            None => exn::bail!(ErrorKind::NotWritable(self.locator.clone())),
        }
    }
}
