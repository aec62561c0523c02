//! PKZIP container writer.
//!
//! Entry names go to disk exactly as the [`EntryName`] bytes say, which is
//! what lets GB18030 names through without the UTF-8 flag. Each local header
//! is written with zeroed CRC and sizes, the data follows, and the header is
//! patched in place once the data is measured, so the sink must be seekable
//! and no data descriptors are needed.
//!
//! [`EntryName`]: crate::encoding::transcode::EntryName

use std::io::{self, Seek, SeekFrom, Write};

use flate2::Compression;
use flate2::write::DeflateEncoder;

use super::header::{CompressionMethod, EntryHeader, VERSION_MADE_BY, VERSION_NEEDED};
use crate::error::{ArchiveError, Result};

const LOCAL_HEADER_SIG: u32 = 0x0403_4b50;
const CENTRAL_HEADER_SIG: u32 = 0x0201_4b50;
const END_OF_CENTRAL_DIR_SIG: u32 = 0x0605_4b50;

const LOCAL_HEADER_LEN: usize = 30;
const CENTRAL_HEADER_LEN: usize = 46;
const END_OF_CENTRAL_DIR_LEN: usize = 22;

// Offset of the CRC-32 field inside a local header.
const LOCAL_CRC_OFFSET: u64 = 14;

const MAX_ENTRIES: usize = u16::MAX as usize;
// 0xFFFFFFFF in a size or offset field means "see the zip64 record".
const MAX_FIELD: u64 = u32::MAX as u64 - 1;

/// What the central directory needs to remember about a written entry.
#[derive(Debug, Clone)]
struct CentralRecord {
    header: EntryHeader,
    crc32: u32,
    compressed_size: u32,
    uncompressed_size: u32,
    local_header_offset: u32,
}

/// Sizes of one finished entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EntrySummary {
    pub uncompressed: u64,
    pub compressed: u64,
    pub crc32: u32,
}

/// Streams entries into a zip archive on `W`.
///
/// The archive is only readable after [`ZipContainer::finish`] has written
/// the central directory.
pub struct ZipContainer<W: Write + Seek> {
    sink: W,
    records: Vec<CentralRecord>,
    level: u32,
}

impl<W: Write + Seek> ZipContainer<W> {
    /// Starts an archive at the sink's current position, using deflate
    /// level 6 for deflated entries.
    pub fn new(sink: W) -> Self {
        Self::with_level(sink, 6)
    }

    pub fn with_level(sink: W, level: u32) -> Self {
        Self {
            sink,
            records: Vec::new(),
            level: level.min(9),
        }
    }

    pub fn entry_count(&self) -> usize {
        self.records.len()
    }

    /// Writes the local header for `header` and returns a stream for its
    /// content. The entry is recorded only when the stream is closed.
    /// Directory headers are always written as stored.
    pub fn create_entry(&mut self, mut header: EntryHeader) -> Result<EntryWriter<'_, W>> {
        if self.records.len() >= MAX_ENTRIES {
            return Err(ArchiveError::TooManyEntries(self.records.len() + 1));
        }
        if header.size > MAX_FIELD {
            return Err(too_large(&header, header.size));
        }
        if header.is_dir {
            header.method = CompressionMethod::Stored;
        }

        let offset = self.sink.stream_position()?;
        if offset > MAX_FIELD {
            return Err(too_large(&header, offset));
        }
        write_local_header(&mut self.sink, &header, 0, 0, 0)?;
        let data_start = self.sink.stream_position()?;

        let Self {
            sink,
            records,
            level,
        } = self;
        let body = match header.method {
            CompressionMethod::Stored => Body::Stored(sink),
            CompressionMethod::Deflated => {
                Body::Deflate(DeflateEncoder::new(sink, Compression::new(*level)))
            }
        };

        Ok(EntryWriter {
            body,
            records,
            header,
            hasher: crc32fast::Hasher::new(),
            written: 0,
            local_header_offset: offset,
            data_start,
        })
    }

    /// Convenience for a directory: header only, no content.
    pub fn add_directory(&mut self, header: EntryHeader) -> Result<EntrySummary> {
        self.create_entry(header)?.close()
    }

    /// Writes the central directory and end record, flushes, and hands the
    /// sink back.
    pub fn finish(mut self) -> Result<W> {
        let cd_start = self.sink.stream_position()?;
        for record in &self.records {
            write_central_header(&mut self.sink, record)?;
        }
        let cd_end = self.sink.stream_position()?;
        if cd_end > MAX_FIELD {
            return Err(ArchiveError::EntryTooLarge {
                name: "central directory".to_string(),
                size: cd_end,
            });
        }

        let count = self.records.len() as u16;
        let mut eocd = Vec::with_capacity(END_OF_CENTRAL_DIR_LEN);
        eocd.extend_from_slice(&END_OF_CENTRAL_DIR_SIG.to_le_bytes());
        eocd.extend_from_slice(&0u16.to_le_bytes()); // this disk
        eocd.extend_from_slice(&0u16.to_le_bytes()); // disk with central directory
        eocd.extend_from_slice(&count.to_le_bytes());
        eocd.extend_from_slice(&count.to_le_bytes());
        eocd.extend_from_slice(&((cd_end - cd_start) as u32).to_le_bytes());
        eocd.extend_from_slice(&(cd_start as u32).to_le_bytes());
        eocd.extend_from_slice(&0u16.to_le_bytes()); // comment length
        self.sink.write_all(&eocd)?;
        self.sink.flush()?;
        Ok(self.sink)
    }
}

enum Body<'a, W: Write> {
    Stored(&'a mut W),
    Deflate(DeflateEncoder<&'a mut W>),
}

/// Content stream for one entry. Call [`EntryWriter::close`] when done; a
/// writer dropped without closing leaves its bytes in the file but no
/// central directory record.
pub struct EntryWriter<'a, W: Write + Seek> {
    body: Body<'a, W>,
    records: &'a mut Vec<CentralRecord>,
    header: EntryHeader,
    hasher: crc32fast::Hasher,
    written: u64,
    local_header_offset: u64,
    data_start: u64,
}

impl<'a, W: Write + Seek> EntryWriter<'a, W> {
    /// Finishes compression, patches the local header and records the entry.
    pub fn close(self) -> Result<EntrySummary> {
        let EntryWriter {
            body,
            records,
            header,
            hasher,
            written,
            local_header_offset,
            data_start,
        } = self;

        let sink = match body {
            Body::Stored(sink) => sink,
            Body::Deflate(encoder) => encoder.finish()?,
        };
        let data_end = sink.stream_position()?;
        let compressed = data_end - data_start;
        let crc32 = hasher.finalize();

        if written > MAX_FIELD {
            return Err(too_large(&header, written));
        }
        if compressed > MAX_FIELD {
            return Err(too_large(&header, compressed));
        }

        sink.seek(SeekFrom::Start(local_header_offset + LOCAL_CRC_OFFSET))?;
        sink.write_all(&crc32.to_le_bytes())?;
        sink.write_all(&(compressed as u32).to_le_bytes())?;
        sink.write_all(&(written as u32).to_le_bytes())?;
        sink.seek(SeekFrom::Start(data_end))?;

        records.push(CentralRecord {
            header,
            crc32,
            compressed_size: compressed as u32,
            uncompressed_size: written as u32,
            local_header_offset: local_header_offset as u32,
        });

        Ok(EntrySummary {
            uncompressed: written,
            compressed,
            crc32,
        })
    }
}

impl<'a, W: Write + Seek> Write for EntryWriter<'a, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.header.is_dir && !buf.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "directory entries carry no content",
            ));
        }
        let n = match &mut self.body {
            Body::Stored(sink) => sink.write(buf)?,
            Body::Deflate(encoder) => encoder.write(buf)?,
        };
        self.hasher.update(&buf[..n]);
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut self.body {
            Body::Stored(sink) => sink.flush(),
            Body::Deflate(encoder) => encoder.flush(),
        }
    }
}

fn too_large(header: &EntryHeader, size: u64) -> ArchiveError {
    ArchiveError::EntryTooLarge {
        name: header.name.display().into_owned(),
        size,
    }
}

fn write_local_header<W: Write>(
    out: &mut W,
    header: &EntryHeader,
    crc32: u32,
    compressed: u32,
    uncompressed: u32,
) -> io::Result<()> {
    let name = header.name.as_bytes();
    let extra = header.extra_field();
    let (time, date) = header.dos_datetime();

    let mut buf = Vec::with_capacity(LOCAL_HEADER_LEN + name.len() + extra.len());
    buf.extend_from_slice(&LOCAL_HEADER_SIG.to_le_bytes());
    buf.extend_from_slice(&VERSION_NEEDED.to_le_bytes());
    buf.extend_from_slice(&header.flags().to_le_bytes());
    buf.extend_from_slice(&header.method.id().to_le_bytes());
    buf.extend_from_slice(&time.to_le_bytes());
    buf.extend_from_slice(&date.to_le_bytes());
    buf.extend_from_slice(&crc32.to_le_bytes());
    buf.extend_from_slice(&compressed.to_le_bytes());
    buf.extend_from_slice(&uncompressed.to_le_bytes());
    buf.extend_from_slice(&(name.len() as u16).to_le_bytes());
    buf.extend_from_slice(&(extra.len() as u16).to_le_bytes());
    buf.extend_from_slice(name);
    buf.extend_from_slice(&extra);
    out.write_all(&buf)
}

fn write_central_header<W: Write>(out: &mut W, record: &CentralRecord) -> io::Result<()> {
    let header = &record.header;
    let name = header.name.as_bytes();
    let extra = header.extra_field();
    let (time, date) = header.dos_datetime();

    let mut buf = Vec::with_capacity(CENTRAL_HEADER_LEN + name.len() + extra.len());
    buf.extend_from_slice(&CENTRAL_HEADER_SIG.to_le_bytes());
    buf.extend_from_slice(&VERSION_MADE_BY.to_le_bytes());
    buf.extend_from_slice(&VERSION_NEEDED.to_le_bytes());
    buf.extend_from_slice(&header.flags().to_le_bytes());
    buf.extend_from_slice(&header.method.id().to_le_bytes());
    buf.extend_from_slice(&time.to_le_bytes());
    buf.extend_from_slice(&date.to_le_bytes());
    buf.extend_from_slice(&record.crc32.to_le_bytes());
    buf.extend_from_slice(&record.compressed_size.to_le_bytes());
    buf.extend_from_slice(&record.uncompressed_size.to_le_bytes());
    buf.extend_from_slice(&(name.len() as u16).to_le_bytes());
    buf.extend_from_slice(&(extra.len() as u16).to_le_bytes());
    buf.extend_from_slice(&0u16.to_le_bytes()); // comment length
    buf.extend_from_slice(&0u16.to_le_bytes()); // disk number start
    buf.extend_from_slice(&0u16.to_le_bytes()); // internal attributes
    buf.extend_from_slice(&header.external_attributes().to_le_bytes());
    buf.extend_from_slice(&record.local_header_offset.to_le_bytes());
    buf.extend_from_slice(name);
    buf.extend_from_slice(&extra);
    out.write_all(&buf)
}
