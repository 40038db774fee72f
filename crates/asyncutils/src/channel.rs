use futures::channel::mpsc::{self, Receiver, SendError, Sender};
use futures::{SinkExt, Stream};
use pin_project_lite::pin_project;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

type Item = io::Result<Vec<u8>>;

/// Create a bounded chunk channel.
///
/// At most `capacity` chunks (plus one per live sender) are buffered before
/// [`ChunkSender::send`] starts waiting for the consumer.
///
/// # Examples
///
/// ```
/// use futures::StreamExt;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let (mut tx, mut rx) = zipstream_asyncutils::channel(4);
/// tx.send(b"PK".to_vec()).await.unwrap();
/// drop(tx);
/// assert_eq!(rx.next().await.unwrap().unwrap(), b"PK");
/// assert!(rx.next().await.is_none());
/// assert_eq!(rx.received(), 2);
/// # }
/// ```
pub fn channel(capacity: usize) -> (ChunkSender, ChunkStream) {
    let (tx, rx) = mpsc::channel(capacity);
    (ChunkSender { inner: tx }, ChunkStream { inner: rx, received: 0 })
}

/// Producing half of a [`channel`].
#[derive(Clone, Debug)]
pub struct ChunkSender {
    inner: Sender<Item>,
}

impl ChunkSender {
    /// Send one chunk, waiting while the channel is full.
    ///
    /// Fails once the consumer has been dropped.
    pub async fn send(&mut self, chunk: Vec<u8>) -> Result<(), SendError> {
        self.inner.send(Ok(chunk)).await
    }

    /// Terminate the stream with an error item so the consumer can tell a
    /// failed run apart from a finished one.
    pub async fn abort(mut self, error: io::Error) {
        // Nothing to report to if the consumer is already gone.
        let _ = self.inner.send(Err(error)).await;
    }

    /// Drop this sender's claim on the channel without closing it for other
    /// senders.
    pub fn disconnect(&mut self) {
        self.inner.disconnect();
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }
}

pin_project! {
    /// Consuming half of a [`channel`].
    ///
    /// Ends once every [`ChunkSender`] has been dropped or disconnected.
    #[derive(Debug)]
    pub struct ChunkStream {
        #[pin]
        inner: Receiver<Item>,
        received: u64,
    }
}

impl ChunkStream {
    /// Total bytes yielded so far.
    #[must_use]
    pub fn received(&self) -> u64 {
        self.received
    }
}

impl Stream for ChunkStream {
    type Item = Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();
        let polled = this.inner.poll_next(cx);
        if let Poll::Ready(Some(Ok(chunk))) = &polled {
            *this.received += chunk.len() as u64;
        }
        polled
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}
