//! Origins and sinks.
//!
//! An [`Origin`] is the I/O adapter behind one source locator: it can probe
//! metadata ([`Origin::stat`]), open the payload for reading and, for some
//! kinds, open a [`Sink`] for writing. A [`Sink`] is an async byte
//! destination with an explicit, idempotent [`close`](Sink::close).

pub mod error;
mod models;
pub mod origin;
pub mod sink;

pub use crate::models::{OriginKind, Stat};
pub use crate::origin::{BoxRead, Origin, basename};
pub use crate::sink::{BoxSink, MemorySink, Sink, WriterSink};
use std::sync::Arc;

pub type OriginHandle = Arc<dyn Origin>;
