//! Byte sinks.
//!
//! A [`Sink`] accepts ordered writes and is closed exactly once by whoever
//! opened it. Closing twice is a no-op; writing after close is an error.

use crate::error::{ErrorKind, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::io::{AsyncWrite, AsyncWriteExt};

pub type BoxSink = Box<dyn Sink>;

#[async_trait]
pub trait Sink: Send {
    /// Write every byte of `bytes`, returning how many were accepted.
    async fn write(&mut self, bytes: &[u8]) -> Result<usize>;

    /// Flush and release the destination.
    async fn close(&mut self) -> Result<()>;
}

/// Sink over any [`AsyncWrite`]; used for local files.
pub struct WriterSink<W> {
    locator: String,
    inner: Option<W>,
}

impl<W> WriterSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(locator: impl Into<String>, inner: W) -> Self {
        Self {
            locator: locator.into(),
            inner: Some(inner),
        }
    }
}

#[async_trait]
impl<W> Sink for WriterSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn write(&mut self, bytes: &[u8]) -> Result<usize> {
        let Some(inner) = self.inner.as_mut() else {
            exn::bail!(ErrorKind::Closed(self.locator.clone()));
        };
        inner
            .write_all(bytes)
            .await
            .map_err(|e| ErrorKind::from_io(e, &self.locator))?;
        Ok(bytes.len())
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(mut inner) = self.inner.take() {
            inner.flush().await.map_err(|e| ErrorKind::from_io(e, &self.locator))?;
            inner.shutdown().await.map_err(|e| ErrorKind::from_io(e, &self.locator))?;
            tracing::debug!(locator = %self.locator, "closed writer sink");
        }
        Ok(())
    }
}

/// Sink collecting into a shared buffer.
///
/// Clones share the same buffer, so a test can hand one clone to the engine
/// and inspect the other afterwards.
#[derive(Clone, Debug, Default)]
pub struct MemorySink {
    buffer: Arc<Mutex<Vec<u8>>>,
    closed: Arc<AtomicBool>,
    close_calls: Arc<AtomicUsize>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> Vec<u8> {
        self.buffer.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// How many times `close` was called, including no-op repeats.
    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::Acquire)
    }
}

#[async_trait]
impl Sink for MemorySink {
    async fn write(&mut self, bytes: &[u8]) -> Result<usize> {
        if self.is_closed() {
            exn::bail!(ErrorKind::Closed("memory".to_string()));
        }
        self.buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(bytes);
        Ok(bytes.len())
    }

    async fn close(&mut self) -> Result<()> {
        self.close_calls.fetch_add(1, Ordering::AcqRel);
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

#[cfg(any(feature = "s3", feature = "ftp"))]
pub(crate) use self::upload::UploadSink;

#[cfg(any(feature = "s3", feature = "ftp"))]
mod upload {
    use super::*;
    use futures::future::BoxFuture;

    type Upload = Box<dyn FnOnce(Vec<u8>) -> BoxFuture<'static, Result<()>> + Send>;

    /// Buffers every write and hands the whole payload to `upload` on close.
    pub(crate) struct UploadSink {
        locator: String,
        buffer: Vec<u8>,
        upload: Option<Upload>,
    }

    impl UploadSink {
        pub(crate) fn new<F>(locator: impl Into<String>, upload: F) -> Self
        where
            F: FnOnce(Vec<u8>) -> BoxFuture<'static, Result<()>> + Send + 'static,
        {
            Self {
                locator: locator.into(),
                buffer: Vec::new(),
                upload: Some(Box::new(upload)),
            }
        }
    }

    #[async_trait]
    impl Sink for UploadSink {
        async fn write(&mut self, bytes: &[u8]) -> Result<usize> {
            if self.upload.is_none() {
                exn::bail!(ErrorKind::Closed(self.locator.clone()));
            }
            self.buffer.extend_from_slice(bytes);
            Ok(bytes.len())
        }

        async fn close(&mut self) -> Result<()> {
            let Some(upload) = self.upload.take() else {
                return Ok(());
            };
            let body = std::mem::take(&mut self.buffer);
            tracing::debug!(locator = %self.locator, size = body.len(), "uploading buffered sink");
            upload(body).await
        }
    }
}
