//! ZIP archive primitives.
//!
//! This crate owns the byte-level parts of writing a ZIP archive:
//!
//! - **Compression methods** behind the [`Method`] enum (STORE and DEFLATE),
//!   parsed from configuration strings ([`Method::from_str`](std::str::FromStr))
//! - **Entry encoding** via [`EntryEncoder`], which pipes payload chunks
//!   through the entry's method while computing the CRC32 and both sizes
//! - **Record serialization** for local file headers, data descriptors,
//!   central directory records and the (Zip64) end of central directory
//!   records, see [`records`]
//! - **DOS timestamps** via [`DosDateTime`]
//!
//! Every record knows its exact encoded length before anything is written,
//! which is what makes byte-exact size prediction possible upstream.

#[cfg(feature = "cli")]
pub mod cli;
mod construct;
mod dos;
mod encoder;
pub mod error;
pub mod records;
mod util;

pub use crate::dos::DosDateTime;
pub use crate::encoder::{Checksum, EntryEncoder};

/// Largest value a 16-bit record field holds natively. Equal-or-above means
/// Zip64 (the value itself is the "see Zip64 record" sentinel).
pub const ZIP64_ENTRY_THRESHOLD: u64 = 0xFFFF;
/// Largest value a 32-bit record field holds natively. Equal-or-above means
/// Zip64 (the value itself is the "see Zip64 record" sentinel).
pub const ZIP64_SIZE_THRESHOLD: u64 = 0xFFFF_FFFF;

/// A supported entry compression method.
///
/// Defaults to [`Store`](Self::Store), the only method for which compressed
/// sizes are known without doing the compression.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Method {
    /// No compression (method 0)
    #[default]
    Store,
    /// Raw DEFLATE (method 8)
    Deflate,
}
