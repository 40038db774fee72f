//! Entry payload encoding.

use crate::Method;
use crate::error::{ErrorKind, Result};
use crc32fast::Hasher;
use exn::ResultExt;
use flate2::{Compression as DeflateLevel, write::DeflateEncoder};
use std::io::Write;
use tracing::instrument;

// Archives are streamed to clients while being built; favour throughput over
// the last few percent of compression ratio.
const DEFLATE_LEVEL: DeflateLevel = DeflateLevel::new(6);

/// Values written to the data descriptor and central directory once an
/// entry's payload has been fully consumed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Checksum {
    pub crc32: u32,
    pub compressed: u64,
    pub uncompressed: u64,
}

enum Inner {
    Store,
    Deflate(DeflateEncoder<Vec<u8>>),
}

/// Incremental encoder for one entry's payload.
///
/// Feed payload chunks to [`update`](Self::update) and flush the remainder
/// with [`finish`](Self::finish). Output bytes are appended to a caller-owned
/// buffer so the caller decides when (and where) they are emitted.
///
/// # Examples
///
/// ```
/// use zipstream_codec::{EntryEncoder, Method};
///
/// let mut out = Vec::new();
/// let mut encoder = EntryEncoder::new(Method::Store);
/// encoder.update(b"Hello, ", &mut out).unwrap();
/// encoder.update(b"world!", &mut out).unwrap();
/// let checksum = encoder.finish(&mut out).unwrap();
/// assert_eq!(out, b"Hello, world!");
/// assert_eq!(checksum.crc32, crc32fast::hash(b"Hello, world!"));
/// assert_eq!(checksum.compressed, 13);
/// ```
pub struct EntryEncoder {
    method: Method,
    inner: Inner,
    hasher: Hasher,
    uncompressed: u64,
    compressed: u64,
}

impl EntryEncoder {
    #[must_use]
    pub fn new(method: Method) -> Self {
        let inner = match method {
            Method::Store => Inner::Store,
            Method::Deflate => Inner::Deflate(DeflateEncoder::new(Vec::new(), DEFLATE_LEVEL)),
        };
        Self {
            method,
            inner,
            hasher: Hasher::new(),
            uncompressed: 0,
            compressed: 0,
        }
    }

    #[must_use]
    pub fn method(&self) -> Method {
        self.method
    }

    /// Encode one payload chunk, appending any produced bytes to `out`.
    ///
    /// DEFLATE buffers internally, so a call may append nothing at all.
    pub fn update(&mut self, chunk: &[u8], out: &mut Vec<u8>) -> Result<()> {
        self.hasher.update(chunk);
        self.uncompressed += chunk.len() as u64;
        let before = out.len();
        match &mut self.inner {
            Inner::Store => out.extend_from_slice(chunk),
            Inner::Deflate(encoder) => {
                encoder.write_all(chunk).or_raise(|| ErrorKind::Encoder)?;
                out.append(encoder.get_mut());
            },
        }
        self.compressed += (out.len() - before) as u64;
        Ok(())
    }

    /// Flush the remaining compressed bytes into `out` and return the
    /// entry's checksum and sizes.
    #[instrument(skip(self, out), fields(method = %self.method, uncompressed = self.uncompressed, compressed))]
    pub fn finish(self, out: &mut Vec<u8>) -> Result<Checksum> {
        let mut compressed = self.compressed;
        if let Inner::Deflate(encoder) = self.inner {
            let mut tail = encoder.finish().or_raise(|| ErrorKind::Encoder)?;
            compressed += tail.len() as u64;
            out.append(&mut tail);
        }
        tracing::Span::current().record("compressed", compressed);
        Ok(Checksum {
            crc32: self.hasher.finalize(),
            compressed,
            uncompressed: self.uncompressed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::DeflateDecoder;
    use rstest::rstest;
    use std::io::Read;

    fn encode(method: Method, chunks: &[&[u8]]) -> (Vec<u8>, Checksum) {
        let mut out = Vec::new();
        let mut encoder = EntryEncoder::new(method);
        for chunk in chunks {
            encoder.update(chunk, &mut out).unwrap();
        }
        let checksum = encoder.finish(&mut out).unwrap();
        (out, checksum)
    }

    #[rstest]
    #[case(&[])]
    #[case(&[""])]
    #[case(&["one chunk"])]
    #[case(&["several ", "small ", "chunks"])]
    fn test_store_is_passthrough(#[case] chunks: &[&str]) {
        let chunks: Vec<&[u8]> = chunks.iter().map(|c| c.as_bytes()).collect();
        let expected: Vec<u8> = chunks.concat();
        let (out, checksum) = encode(Method::Store, &chunks);
        assert_eq!(out, expected);
        assert_eq!(checksum.crc32, crc32fast::hash(&expected));
        assert_eq!(checksum.compressed, expected.len() as u64);
        assert_eq!(checksum.uncompressed, expected.len() as u64);
    }

    #[test]
    fn test_deflate_decodes_back() {
        let payload = "All work and no play makes Jack a dull boy. ".repeat(500);
        let halves = payload.as_bytes().split_at(payload.len() / 2);
        let (out, checksum) = encode(Method::Deflate, &[halves.0, halves.1]);

        assert_eq!(checksum.compressed, out.len() as u64);
        assert_eq!(checksum.uncompressed, payload.len() as u64);
        assert_eq!(checksum.crc32, crc32fast::hash(payload.as_bytes()));
        assert!(out.len() < payload.len());

        let mut decoded = String::new();
        DeflateDecoder::new(out.as_slice()).read_to_string(&mut decoded).unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn test_deflate_empty_payload() {
        let (out, checksum) = encode(Method::Deflate, &[]);
        // An empty DEFLATE stream is still a (tiny) final block.
        assert!(!out.is_empty());
        assert_eq!(checksum.uncompressed, 0);
        assert_eq!(checksum.crc32, 0);
    }
}
