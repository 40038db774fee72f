//! Async glue between an archive producer and whatever drains it.
//!
//! The producer pushes owned chunks into a bounded [`channel`]; the consumer
//! (usually an HTTP response body) pulls them as a [`Stream`](futures::Stream).
//! A full channel suspends the producer, and a dropped consumer turns the
//! next send into an error so the producer unwinds.

mod channel;

pub use crate::channel::{ChunkSender, ChunkStream, channel};
pub use futures::channel::mpsc::SendError;
