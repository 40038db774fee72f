//! Output sinks owned by the engine.

use async_trait::async_trait;
use zipstream_asyncutils::ChunkSender;
use zipstream_storage::error::{ErrorKind as StorageErrorKind, Result as StorageResult};
use zipstream_storage::{BoxSink, Sink};

/// Duplicates every write to an optional secondary (cache) sink.
///
/// Both destinations see the same writes in the same order. Closing closes
/// the primary and then always attempts the secondary, and only the first
/// close does anything.
pub struct TeeSink {
    primary: BoxSink,
    secondary: Option<BoxSink>,
    closed: bool,
}

impl TeeSink {
    pub fn new(primary: BoxSink, secondary: Option<BoxSink>) -> Self {
        Self {
            primary,
            secondary,
            closed: false,
        }
    }
}

#[async_trait]
impl Sink for TeeSink {
    async fn write(&mut self, bytes: &[u8]) -> StorageResult<usize> {
        let accepted = self.primary.write(bytes).await?;
        if let Some(secondary) = self.secondary.as_mut() {
            secondary.write(bytes).await?;
        }
        Ok(accepted)
    }

    async fn close(&mut self) -> StorageResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let primary = self.primary.close().await;
        let secondary = match self.secondary.as_mut() {
            Some(secondary) => secondary.close().await,
            None => Ok(()),
        };
        if let Err(e) = &secondary {
            tracing::warn!(error = ?e, "closing cache sink failed");
        }
        primary.and(secondary)
    }
}

/// Feeds a pull-based body; each write becomes one chunk.
pub struct ChannelSink {
    sender: ChunkSender,
}

impl ChannelSink {
    pub fn new(sender: ChunkSender) -> Self {
        Self { sender }
    }
}

#[async_trait]
impl Sink for ChannelSink {
    async fn write(&mut self, bytes: &[u8]) -> StorageResult<usize> {
        if self.sender.send(bytes.to_vec()).await.is_err() {
            exn::bail!(StorageErrorKind::Closed("archive body consumer".to_string()));
        }
        Ok(bytes.len())
    }

    async fn close(&mut self) -> StorageResult<()> {
        self.sender.disconnect();
        Ok(())
    }
}
