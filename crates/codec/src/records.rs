//! ZIP record serialization (APPNOTE 6.3).
//!
//! Every record is a plain struct implementing [`Record`]. Encoding appends
//! to a caller-owned buffer and fails with [`Overflow`](ErrorKind::Overflow)
//! when a value needs Zip64 but the record was built without it.
//!
//! All entries are written in streaming ("zero header") form: general purpose
//! bit 3 is always set, local headers carry no CRC or sizes, and a data
//! descriptor follows every payload. This keeps local header sizes identical
//! whether or not the payload size was known in advance.

use crate::error::{ErrorKind, Result};
use crate::{Checksum, DosDateTime, Method, ZIP64_ENTRY_THRESHOLD, ZIP64_SIZE_THRESHOLD};

pub const LOCAL_FILE_HEADER_SIGNATURE: u32 = 0x0403_4b50;
pub const DATA_DESCRIPTOR_SIGNATURE: u32 = 0x0807_4b50;
pub const CENTRAL_DIRECTORY_HEADER_SIGNATURE: u32 = 0x0201_4b50;
pub const ZIP64_END_OF_CENTRAL_DIRECTORY_SIGNATURE: u32 = 0x0606_4b50;
pub const ZIP64_END_OF_CENTRAL_DIRECTORY_LOCATOR_SIGNATURE: u32 = 0x0706_4b50;
pub const END_OF_CENTRAL_DIRECTORY_SIGNATURE: u32 = 0x0605_4b50;

const LOCAL_FILE_HEADER_LEN: usize = 30;
const CENTRAL_DIRECTORY_HEADER_LEN: usize = 46;
const END_OF_CENTRAL_DIRECTORY_LEN: usize = 22;
const ZIP64_END_OF_CENTRAL_DIRECTORY_LEN: usize = 56;
const ZIP64_END_OF_CENTRAL_DIRECTORY_LOCATOR_LEN: usize = 20;
const DATA_DESCRIPTOR_LEN: usize = 16;
const ZIP64_DATA_DESCRIPTOR_LEN: usize = 24;

const ZIP64_EXTRA_ID: u16 = 0x0001;
/// Header (4) + uncompressed (8) + compressed (8).
const ZIP64_LOCAL_EXTRA_LEN: usize = 20;
/// Header (4) + uncompressed (8) + compressed (8) + local header offset (8).
const ZIP64_CENTRAL_EXTRA_LEN: usize = 28;

const VERSION_DEFAULT: u16 = 20;
const VERSION_ZIP64: u16 = 45;
/// Upper byte 3 (Unix), lower byte 63 (APPNOTE 6.3).
const VERSION_MADE_BY: u16 = (3 << 8) | 63;
/// Regular file, `rw-r--r--`.
const EXTERNAL_ATTRIBUTES: u32 = 0o100644 << 16;

pub const FLAG_DATA_DESCRIPTOR: u16 = 1 << 3;
pub const FLAG_UTF8: u16 = 1 << 11;

/// A serializable ZIP record.
pub trait Record {
    /// Exact number of bytes [`encode`](Self::encode) appends.
    fn encoded_len(&self) -> usize;

    fn encode(&self, out: &mut Vec<u8>) -> Result<()>;

    /// Convenience wrapper returning a fresh buffer.
    fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(self.encoded_len());
        self.encode(&mut out)?;
        Ok(out)
    }
}

/// General purpose flags for an entry: streaming always, UTF-8 only when the
/// name or comment actually needs it.
#[must_use]
pub fn general_purpose_flags(name: &[u8], comment: &[u8]) -> u16 {
    match name.is_ascii() && comment.is_ascii() {
        true => FLAG_DATA_DESCRIPTOR,
        false => FLAG_DATA_DESCRIPTOR | FLAG_UTF8,
    }
}

fn version_needed(zip64: bool) -> u16 {
    if zip64 { VERSION_ZIP64 } else { VERSION_DEFAULT }
}

fn put_u16(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn put_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn put_u64(out: &mut Vec<u8>, value: u64) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn narrow_u32(value: u64, field: &'static str) -> Result<u32> {
    if value >= ZIP64_SIZE_THRESHOLD {
        exn::bail!(ErrorKind::Overflow(field));
    }
    // Infallible: checked against the 32-bit threshold above.
    Ok(value as u32)
}

fn narrow_u16(value: u64, field: &'static str) -> Result<u16> {
    if value >= ZIP64_ENTRY_THRESHOLD {
        exn::bail!(ErrorKind::Overflow(field));
    }
    Ok(value as u16)
}

fn field_len(bytes: &[u8], field: &'static str) -> Result<u16> {
    u16::try_from(bytes.len()).map_err(|_| exn::Exn::from(ErrorKind::FieldTooLong(field)))
}

/// Local file header, immediately preceding an entry's payload.
#[derive(Clone, Debug)]
pub struct LocalFileHeader<'a> {
    pub name: &'a [u8],
    pub method: Method,
    pub modified: DosDateTime,
    pub flags: u16,
    pub zip64: bool,
}

impl Record for LocalFileHeader<'_> {
    fn encoded_len(&self) -> usize {
        let extra = if self.zip64 { ZIP64_LOCAL_EXTRA_LEN } else { 0 };
        LOCAL_FILE_HEADER_LEN + self.name.len() + extra
    }

    fn encode(&self, out: &mut Vec<u8>) -> Result<()> {
        let name_len = field_len(self.name, "file name")?;
        // Sizes live in the data descriptor; Zip64 local headers point at the
        // (zeroed) extra field instead.
        let (size_marker, extra_len) = match self.zip64 {
            true => (u32::MAX, ZIP64_LOCAL_EXTRA_LEN as u16),
            false => (0, 0),
        };
        put_u32(out, LOCAL_FILE_HEADER_SIGNATURE);
        put_u16(out, version_needed(self.zip64));
        put_u16(out, self.flags);
        put_u16(out, self.method.code());
        put_u16(out, self.modified.time);
        put_u16(out, self.modified.date);
        put_u32(out, 0);
        put_u32(out, size_marker);
        put_u32(out, size_marker);
        put_u16(out, name_len);
        put_u16(out, extra_len);
        out.extend_from_slice(self.name);
        if self.zip64 {
            put_u16(out, ZIP64_EXTRA_ID);
            put_u16(out, (ZIP64_LOCAL_EXTRA_LEN - 4) as u16);
            put_u64(out, 0);
            put_u64(out, 0);
        }
        Ok(())
    }
}

/// Trailing record carrying the CRC and sizes of the preceding payload.
#[derive(Clone, Debug)]
pub struct DataDescriptor {
    pub checksum: Checksum,
    pub zip64: bool,
}

impl Record for DataDescriptor {
    fn encoded_len(&self) -> usize {
        if self.zip64 { ZIP64_DATA_DESCRIPTOR_LEN } else { DATA_DESCRIPTOR_LEN }
    }

    fn encode(&self, out: &mut Vec<u8>) -> Result<()> {
        put_u32(out, DATA_DESCRIPTOR_SIGNATURE);
        put_u32(out, self.checksum.crc32);
        if self.zip64 {
            put_u64(out, self.checksum.compressed);
            put_u64(out, self.checksum.uncompressed);
        } else {
            put_u32(out, narrow_u32(self.checksum.compressed, "compressed size")?);
            put_u32(out, narrow_u32(self.checksum.uncompressed, "uncompressed size")?);
        }
        Ok(())
    }
}

/// One central directory record per entry, written after all payloads.
#[derive(Clone, Debug)]
pub struct CentralDirectoryHeader<'a> {
    pub name: &'a [u8],
    pub comment: &'a [u8],
    pub method: Method,
    pub modified: DosDateTime,
    pub flags: u16,
    pub checksum: Checksum,
    /// Offset of the entry's local file header from the start of the archive.
    pub offset: u64,
    pub zip64: bool,
}

impl Record for CentralDirectoryHeader<'_> {
    fn encoded_len(&self) -> usize {
        let extra = if self.zip64 { ZIP64_CENTRAL_EXTRA_LEN } else { 0 };
        CENTRAL_DIRECTORY_HEADER_LEN + self.name.len() + extra + self.comment.len()
    }

    fn encode(&self, out: &mut Vec<u8>) -> Result<()> {
        let name_len = field_len(self.name, "file name")?;
        let comment_len = field_len(self.comment, "file comment")?;
        let (compressed, uncompressed, offset, extra_len) = match self.zip64 {
            true => (u32::MAX, u32::MAX, u32::MAX, ZIP64_CENTRAL_EXTRA_LEN as u16),
            false => (
                narrow_u32(self.checksum.compressed, "compressed size")?,
                narrow_u32(self.checksum.uncompressed, "uncompressed size")?,
                narrow_u32(self.offset, "local header offset")?,
                0,
            ),
        };
        put_u32(out, CENTRAL_DIRECTORY_HEADER_SIGNATURE);
        put_u16(out, VERSION_MADE_BY);
        put_u16(out, version_needed(self.zip64));
        put_u16(out, self.flags);
        put_u16(out, self.method.code());
        put_u16(out, self.modified.time);
        put_u16(out, self.modified.date);
        put_u32(out, self.checksum.crc32);
        put_u32(out, compressed);
        put_u32(out, uncompressed);
        put_u16(out, name_len);
        put_u16(out, extra_len);
        put_u16(out, comment_len);
        // Disk number start, internal attributes.
        put_u16(out, 0);
        put_u16(out, 0);
        put_u32(out, EXTERNAL_ATTRIBUTES);
        put_u32(out, offset);
        out.extend_from_slice(self.name);
        if self.zip64 {
            // Field order is fixed: uncompressed, compressed, offset.
            put_u16(out, ZIP64_EXTRA_ID);
            put_u16(out, (ZIP64_CENTRAL_EXTRA_LEN - 4) as u16);
            put_u64(out, self.checksum.uncompressed);
            put_u64(out, self.checksum.compressed);
            put_u64(out, self.offset);
        }
        out.extend_from_slice(self.comment);
        Ok(())
    }
}

/// Zip64 end of central directory record.
#[derive(Clone, Debug)]
pub struct Zip64EndOfCentralDirectory {
    pub entries: u64,
    /// Size of the central directory in bytes.
    pub size: u64,
    /// Offset of the first central directory record.
    pub offset: u64,
}

impl Record for Zip64EndOfCentralDirectory {
    fn encoded_len(&self) -> usize {
        ZIP64_END_OF_CENTRAL_DIRECTORY_LEN
    }

    fn encode(&self, out: &mut Vec<u8>) -> Result<()> {
        put_u32(out, ZIP64_END_OF_CENTRAL_DIRECTORY_SIGNATURE);
        // Size of the remaining record, excluding the leading 12 bytes.
        put_u64(out, (ZIP64_END_OF_CENTRAL_DIRECTORY_LEN - 12) as u64);
        put_u16(out, VERSION_MADE_BY);
        put_u16(out, VERSION_ZIP64);
        put_u32(out, 0);
        put_u32(out, 0);
        put_u64(out, self.entries);
        put_u64(out, self.entries);
        put_u64(out, self.size);
        put_u64(out, self.offset);
        Ok(())
    }
}

/// Locates the [`Zip64EndOfCentralDirectory`] record.
#[derive(Clone, Debug)]
pub struct Zip64EndOfCentralDirectoryLocator {
    /// Offset of the Zip64 end of central directory record.
    pub offset: u64,
}

impl Record for Zip64EndOfCentralDirectoryLocator {
    fn encoded_len(&self) -> usize {
        ZIP64_END_OF_CENTRAL_DIRECTORY_LOCATOR_LEN
    }

    fn encode(&self, out: &mut Vec<u8>) -> Result<()> {
        put_u32(out, ZIP64_END_OF_CENTRAL_DIRECTORY_LOCATOR_SIGNATURE);
        put_u32(out, 0);
        put_u64(out, self.offset);
        put_u32(out, 1);
        Ok(())
    }
}

/// End of central directory record; always the final bytes of an archive.
#[derive(Clone, Debug)]
pub struct EndOfCentralDirectory<'a> {
    pub entries: u64,
    pub size: u64,
    pub offset: u64,
    pub comment: &'a [u8],
    /// When set, every counter is written as its sentinel and readers are
    /// expected to follow the Zip64 locator.
    pub zip64: bool,
}

impl Record for EndOfCentralDirectory<'_> {
    fn encoded_len(&self) -> usize {
        END_OF_CENTRAL_DIRECTORY_LEN + self.comment.len()
    }

    fn encode(&self, out: &mut Vec<u8>) -> Result<()> {
        let comment_len = field_len(self.comment, "archive comment")?;
        let (entries, size, offset) = match self.zip64 {
            true => (u16::MAX, u32::MAX, u32::MAX),
            false => (
                narrow_u16(self.entries, "entry count")?,
                narrow_u32(self.size, "central directory size")?,
                narrow_u32(self.offset, "central directory offset")?,
            ),
        };
        put_u32(out, END_OF_CENTRAL_DIRECTORY_SIGNATURE);
        put_u16(out, 0);
        put_u16(out, 0);
        put_u16(out, entries);
        put_u16(out, entries);
        put_u32(out, size);
        put_u32(out, offset);
        put_u16(out, comment_len);
        out.extend_from_slice(self.comment);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn u16_at(bytes: &[u8], at: usize) -> u16 {
        u16::from_le_bytes([bytes[at], bytes[at + 1]])
    }

    fn u32_at(bytes: &[u8], at: usize) -> u32 {
        u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
    }

    fn local(name: &[u8], zip64: bool) -> LocalFileHeader<'_> {
        LocalFileHeader {
            name,
            method: Method::Store,
            modified: DosDateTime::EPOCH,
            flags: general_purpose_flags(name, b""),
            zip64,
        }
    }

    fn central<'a>(name: &'a [u8], comment: &'a [u8], offset: u64, zip64: bool) -> CentralDirectoryHeader<'a> {
        CentralDirectoryHeader {
            name,
            comment,
            method: Method::Store,
            modified: DosDateTime::EPOCH,
            flags: general_purpose_flags(name, comment),
            checksum: Checksum { crc32: 0xDEAD_BEEF, compressed: 5, uncompressed: 5 },
            offset,
            zip64,
        }
    }

    /// Every record's `encoded_len` must agree with what it actually emits;
    /// size prediction depends on it.
    fn assert_len(record: &impl Record) -> Vec<u8> {
        let bytes = record.to_bytes().unwrap();
        assert_eq!(bytes.len(), record.encoded_len());
        bytes
    }

    #[rstest]
    #[case(b"a.txt", false, 35)]
    #[case(b"a.txt", true, 55)]
    #[case(b"", false, 30)]
    #[case(b"dir/sub/file.bin", true, 66)]
    fn test_local_file_header_len(#[case] name: &[u8], #[case] zip64: bool, #[case] expected: usize) {
        let bytes = assert_len(&local(name, zip64));
        assert_eq!(bytes.len(), expected);
        assert_eq!(u32_at(&bytes, 0), LOCAL_FILE_HEADER_SIGNATURE);
        assert_eq!(u16_at(&bytes, 4), if zip64 { 45 } else { 20 });
        assert_eq!(u16_at(&bytes, 6) & FLAG_DATA_DESCRIPTOR, FLAG_DATA_DESCRIPTOR);
        assert_eq!(&bytes[30..30 + name.len()], name);
    }

    #[rstest]
    #[case(b"a.txt", b"", false, 51)]
    #[case(b"a.txt", b"note", false, 55)]
    #[case(b"a.txt", b"note", true, 83)]
    fn test_central_directory_header_len(
        #[case] name: &[u8],
        #[case] comment: &[u8],
        #[case] zip64: bool,
        #[case] expected: usize,
    ) {
        let bytes = assert_len(&central(name, comment, 1234, zip64));
        assert_eq!(bytes.len(), expected);
        assert_eq!(u32_at(&bytes, 0), CENTRAL_DIRECTORY_HEADER_SIGNATURE);
        assert_eq!(u32_at(&bytes, 16), 0xDEAD_BEEF);
        match zip64 {
            true => assert_eq!(u32_at(&bytes, 42), u32::MAX),
            false => assert_eq!(u32_at(&bytes, 42), 1234),
        }
        assert!(bytes.ends_with(comment));
    }

    #[rstest]
    #[case(false, 16)]
    #[case(true, 24)]
    fn test_data_descriptor_len(#[case] zip64: bool, #[case] expected: usize) {
        let descriptor = DataDescriptor {
            checksum: Checksum { crc32: 1, compressed: 2, uncompressed: 3 },
            zip64,
        };
        let bytes = assert_len(&descriptor);
        assert_eq!(bytes.len(), expected);
        assert_eq!(u32_at(&bytes, 0), DATA_DESCRIPTOR_SIGNATURE);
    }

    #[test]
    fn test_end_records_len() {
        let eocd = EndOfCentralDirectory { entries: 3, size: 150, offset: 900, comment: b"hello", zip64: false };
        let bytes = assert_len(&eocd);
        assert_eq!(bytes.len(), 27);
        assert_eq!(u16_at(&bytes, 10), 3);
        assert_eq!(u32_at(&bytes, 16), 900);

        let zip64 = Zip64EndOfCentralDirectory { entries: 70_000, size: 150, offset: 900 };
        assert_eq!(assert_len(&zip64).len(), 56);
        let locator = Zip64EndOfCentralDirectoryLocator { offset: 1050 };
        assert_eq!(assert_len(&locator).len(), 20);
    }

    #[test]
    fn test_zip64_eocd_uses_sentinels() {
        let eocd = EndOfCentralDirectory { entries: 70_000, size: 150, offset: 1 << 33, comment: b"", zip64: true };
        let bytes = eocd.to_bytes().unwrap();
        assert_eq!(u16_at(&bytes, 10), u16::MAX);
        assert_eq!(u32_at(&bytes, 16), u32::MAX);
    }

    #[rstest]
    #[case(0xFFFF, 0, 0, "entry count")]
    #[case(1, 0xFFFF_FFFF, 0, "central directory size")]
    #[case(1, 0, 1 << 32, "central directory offset")]
    fn test_eocd_overflow(#[case] entries: u64, #[case] size: u64, #[case] offset: u64, #[case] field: &str) {
        let eocd = EndOfCentralDirectory { entries, size, offset, comment: b"", zip64: false };
        let err = eocd.to_bytes().unwrap_err();
        assert!(matches!(&*err, ErrorKind::Overflow(f) if *f == field));
    }

    #[test]
    fn test_data_descriptor_overflow() {
        let descriptor = DataDescriptor {
            checksum: Checksum { crc32: 0, compressed: 1 << 32, uncompressed: 1 << 32 },
            zip64: false,
        };
        assert!(descriptor.to_bytes().unwrap_err().needs_zip64());
    }

    #[test]
    fn test_central_header_offset_overflow() {
        let err = central(b"a", b"", 0xFFFF_FFFF, false).to_bytes().unwrap_err();
        assert_eq!(*err, ErrorKind::Overflow("local header offset"));
        assert!(central(b"a", b"", 0xFFFF_FFFF, true).to_bytes().is_ok());
    }

    #[test]
    fn test_field_too_long() {
        let comment = vec![b'x'; 70_000];
        let eocd = EndOfCentralDirectory { entries: 0, size: 0, offset: 0, comment: &comment, zip64: false };
        assert_eq!(*eocd.to_bytes().unwrap_err(), ErrorKind::FieldTooLong("archive comment"));
    }

    #[rstest]
    #[case(b"plain.txt", b"", FLAG_DATA_DESCRIPTOR)]
    #[case("caf\u{e9}.txt".as_bytes(), b"", FLAG_DATA_DESCRIPTOR | FLAG_UTF8)]
    #[case(b"plain.txt", "\u{2603}".as_bytes(), FLAG_DATA_DESCRIPTOR | FLAG_UTF8)]
    fn test_general_purpose_flags(#[case] name: &[u8], #[case] comment: &[u8], #[case] expected: u16) {
        assert_eq!(general_purpose_flags(name, comment), expected);
    }
}
