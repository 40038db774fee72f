//! The archive traversal.
//!
//! A single routine serves both passes. In [`Mode::Calculate`] every record
//! is serialized exactly as it would be written and only counted, while
//! payloads contribute their resolved size unread. In [`Mode::Stream`] the
//! same bytes go to a sink and payloads are read, encoded and checksummed.

use crate::error::{ErrorKind, Result};
use crate::source::FileSource;
use exn::ResultExt;
use tokio::io::AsyncReadExt;
use tracing::instrument;
use zipstream_codec::error::{Error as CodecError, ErrorKind as CodecErrorKind};
use zipstream_codec::records::{
    CentralDirectoryHeader, DataDescriptor, EndOfCentralDirectory, LocalFileHeader, Record, Zip64EndOfCentralDirectory,
    Zip64EndOfCentralDirectoryLocator, general_purpose_flags,
};
use zipstream_codec::{Checksum, DosDateTime, EntryEncoder, Method};
use zipstream_storage::Sink;

/// Archive-level layout decisions shared by both passes.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Layout<'a> {
    pub comment: &'a str,
    pub method: Method,
    pub ascii: bool,
    pub zip64: bool,
    pub chunk_size: usize,
}

pub(crate) enum Mode<'s> {
    Calculate,
    Stream(&'s mut dyn Sink),
}

/// What the central directory needs to remember about a written entry.
struct Written {
    name: String,
    comment: String,
    method: Method,
    modified: DosDateTime,
    flags: u16,
    checksum: Checksum,
    offset: u64,
}

/// Counts every byte and forwards it when there's somewhere to forward to.
struct Emitter<'s> {
    sink: Option<&'s mut dyn Sink>,
    written: u64,
    scratch: Vec<u8>,
}

impl Emitter<'_> {
    async fn record(&mut self, record: &impl Record) -> Result<()> {
        let mut scratch = std::mem::take(&mut self.scratch);
        scratch.clear();
        if let Err(e) = record.encode(&mut scratch) {
            let kind = codec_kind(&e);
            return Err(e).or_raise(|| kind);
        }
        let emitted = self.bytes(&scratch).await;
        self.scratch = scratch;
        emitted
    }

    async fn bytes(&mut self, bytes: &[u8]) -> Result<()> {
        if let Some(sink) = self.sink.as_deref_mut() {
            sink.write(bytes).await.or_raise(|| ErrorKind::SinkWrite)?;
        }
        self.written += bytes.len() as u64;
        Ok(())
    }

    /// Account for payload bytes that are not materialized.
    fn skip(&mut self, len: u64) {
        self.written += len;
    }
}

fn codec_kind(err: &CodecError) -> ErrorKind {
    match &**err {
        CodecErrorKind::Overflow(_) => ErrorKind::Zip64Required,
        CodecErrorKind::FieldTooLong(field) => ErrorKind::InvalidEntry(format!("{field} is too long")),
        _ => ErrorKind::Codec,
    }
}

/// Walk every entry and the trailing directory, returning the total byte
/// count.
#[instrument(level = "debug", skip_all, fields(entries = entries.len(), zip64 = layout.zip64, calculate, size))]
pub(crate) async fn traverse(entries: &[FileSource], layout: Layout<'_>, mode: Mode<'_>) -> Result<u64> {
    let sink = match mode {
        Mode::Calculate => None,
        Mode::Stream(sink) => Some(sink),
    };
    tracing::Span::current().record("calculate", sink.is_none());
    let mut emitter = Emitter { sink, written: 0, scratch: Vec::with_capacity(256) };
    let mut directory = Vec::with_capacity(entries.len());

    for entry in entries {
        directory.push(write_entry(&mut emitter, entry, &layout).await?);
    }

    let directory_offset = emitter.written;
    for written in &directory {
        let record = CentralDirectoryHeader {
            name: written.name.as_bytes(),
            comment: written.comment.as_bytes(),
            method: written.method,
            modified: written.modified,
            flags: written.flags,
            checksum: written.checksum,
            offset: written.offset,
            zip64: layout.zip64,
        };
        emitter.record(&record).await?;
    }
    let directory_size = emitter.written - directory_offset;
    let entry_count = directory.len() as u64;

    if layout.zip64 {
        let zip64_offset = emitter.written;
        emitter
            .record(&Zip64EndOfCentralDirectory {
                entries: entry_count,
                size: directory_size,
                offset: directory_offset,
            })
            .await?;
        emitter.record(&Zip64EndOfCentralDirectoryLocator { offset: zip64_offset }).await?;
    }
    emitter
        .record(&EndOfCentralDirectory {
            entries: entry_count,
            size: directory_size,
            offset: directory_offset,
            comment: layout.comment.as_bytes(),
            zip64: layout.zip64,
        })
        .await?;

    tracing::Span::current().record("size", emitter.written);
    Ok(emitter.written)
}

async fn write_entry(emitter: &mut Emitter<'_>, entry: &FileSource, layout: &Layout<'_>) -> Result<Written> {
    let name = entry.archive_path(layout.ascii);
    let comment = entry.comment().to_string();
    let method = entry.method().unwrap_or(layout.method);
    let modified = entry.modified().await.map(DosDateTime::from).unwrap_or(DosDateTime::EPOCH);
    let flags = general_purpose_flags(name.as_bytes(), comment.as_bytes());
    let offset = emitter.written;

    emitter
        .record(&LocalFileHeader {
            name: name.as_bytes(),
            method,
            modified,
            flags,
            zip64: layout.zip64,
        })
        .await?;

    let checksum = match emitter.sink.is_some() {
        true => copy_payload(emitter, entry, &name, method, layout.chunk_size).await?,
        false => {
            let size = entry.require_size().await?;
            emitter.skip(size);
            // Only sizes matter for the count; STORE keeps them equal.
            Checksum { crc32: 0, compressed: size, uncompressed: size }
        },
    };

    emitter.record(&DataDescriptor { checksum, zip64: layout.zip64 }).await?;
    Ok(Written { name, comment, method, modified, flags, checksum, offset })
}

#[instrument(level = "trace", skip(emitter, entry, method, chunk_size), fields(locator = %entry.locator()))]
async fn copy_payload(
    emitter: &mut Emitter<'_>,
    entry: &FileSource,
    name: &str,
    method: Method,
    chunk_size: usize,
) -> Result<Checksum> {
    let mut reader = entry
        .open_read()
        .await
        .or_raise(|| ErrorKind::SourceRead(name.to_string()))?;
    let mut encoder = EntryEncoder::new(method);
    let mut chunk = vec![0u8; chunk_size.max(1)];
    let mut out = Vec::with_capacity(chunk.len());
    loop {
        let read = reader
            .read(&mut chunk)
            .await
            .or_raise(|| ErrorKind::SourceRead(name.to_string()))?;
        if read == 0 {
            break;
        }
        out.clear();
        encoder.update(&chunk[..read], &mut out).or_raise(|| ErrorKind::Codec)?;
        if !out.is_empty() {
            emitter.bytes(&out).await?;
        }
    }
    drop(reader);

    out.clear();
    let checksum = encoder.finish(&mut out).or_raise(|| ErrorKind::Codec)?;
    if !out.is_empty() {
        emitter.bytes(&out).await?;
    }
    tracing::trace!(
        crc32 = checksum.crc32,
        compressed = checksum.compressed,
        uncompressed = checksum.uncompressed,
        "entry written"
    );
    Ok(checksum)
}
