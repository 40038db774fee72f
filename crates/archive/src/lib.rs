//! Archive assembly for zipstream.
//!
//! An [`Archive`] collects [`FileSource`]s from any origin, resolves path
//! conflicts as they are added, can predict its exact final size before a
//! single payload byte is read, and writes itself exactly once to a
//! [`Sink`](zipstream_storage::Sink) or a pull-based [`ArchiveStream`].

pub mod error;
pub mod headers;
pub mod path;

mod archive;
mod event;
mod factory;
mod predict;
mod queue;
mod sink;
mod source;
mod writer;

pub use crate::archive::{Archive, ArchiveStream, DEFAULT_NAME, Streamed, ZipStream, output_name};
pub use crate::event::ArchiveEvent;
pub use crate::factory::{LocatorKind, Origins};
pub use crate::predict::Prediction;
pub use crate::queue::{ArchiveQueue, Insertion, QueueOptions};
pub use crate::sink::{ChannelSink, TeeSink};
pub use crate::source::FileSource;
