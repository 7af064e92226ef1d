//! Sequential ZIP writer.

use std::collections::HashSet;
use std::io::{self, Read, Seek, SeekFrom, Write};

use chrono::NaiveDateTime;
use flate2::write::DeflateEncoder;
use flate2::Compression;

use super::crc::{crc32, crc32_stream};
use super::headers::{
    CentralDirectoryHeader, DosDateTime, EndOfCentralDirectory, DOS_DIRECTORY_ATTRIBUTE,
    FLAG_UTF8, VERSION_DEFLATED, VERSION_STORED,
};
use crate::error::{Error, Result};

/// Largest entry count that fits the classic end record without looking like
/// a ZIP64 marker.
pub const MAX_ENTRIES: usize = u16::MAX as usize - 1;

/// Tracks the absolute output position so offsets are known without
/// requiring `Seek` on the sink.
pub(crate) struct CountingWriter<W> {
    inner: W,
    written: u64,
}

impl<W: Write> CountingWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner, written: 0 }
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Writes entries to a ZIP container one after another.
///
/// Every entry's CRC-32 and sizes are known before its local header is
/// written, so no data descriptors are emitted. Entry order is exactly the
/// order of the `write_*` calls; the ODT encoder relies on this to place
/// `mimetype` first.
pub struct ArchiveWriter<W: Write> {
    out: CountingWriter<W>,
    entries: Vec<CentralDirectoryHeader>,
    names: HashSet<String>,
    modified: DosDateTime,
    level: Compression,
}

impl ArchiveWriter<Vec<u8>> {
    /// Writer backed by an in-memory buffer.
    pub fn in_memory() -> Self {
        Self::new(Vec::new())
    }
}

impl<W: Write> ArchiveWriter<W> {
    /// Create a writer over `sink`. Entries are stamped with the current
    /// local time unless [`with_timestamp`](Self::with_timestamp) is used.
    pub fn new(sink: W) -> Self {
        Self {
            out: CountingWriter::new(sink),
            entries: Vec::new(),
            names: HashSet::new(),
            modified: DosDateTime::from_datetime(chrono::Local::now().naive_local()),
            level: Compression::default(),
        }
    }

    /// Stamp subsequent entries with a fixed modification time.
    pub fn with_timestamp(mut self, at: NaiveDateTime) -> Self {
        self.modified = DosDateTime::from_datetime(at);
        self
    }

    /// Set the deflate level (0-9).
    pub fn with_compression_level(mut self, level: u32) -> Self {
        self.level = Compression::new(level.min(9));
        self
    }

    /// Number of entries written so far.
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Bytes written to the sink so far.
    pub fn bytes_written(&self) -> u64 {
        self.out.written()
    }

    /// Store `data` without compression.
    pub fn write_stored(&mut self, name: &str, data: &[u8]) -> Result<()> {
        let size = checked_size(name, data.len() as u64)?;
        let header = self.header(name, 0, crc32(data), size, size)?;
        self.emit(header, data)
    }

    /// Store the contents of a seekable reader without compression.
    ///
    /// The reader is read twice: once for the CRC, once for the data.
    pub fn write_stored_reader<R: Read + Seek>(&mut self, name: &str, mut reader: R) -> Result<()> {
        let start = reader.stream_position()?;
        let (crc, len) = crc32_stream(&mut reader)?;
        let size = checked_size(name, len)?;
        reader.seek(SeekFrom::Start(start))?;

        let header = self.header(name, 0, crc, size, size)?;
        self.begin(header)?;
        let copied = io::copy(&mut reader, &mut self.out)?;
        if copied != len {
            return Err(Error::entry(
                name,
                format!("source changed while writing: {} of {} bytes", copied, len),
            ));
        }
        Ok(())
    }

    /// Compress `data` with deflate.
    pub fn write_deflated(&mut self, name: &str, data: &[u8]) -> Result<()> {
        let mut encoder = DeflateEncoder::new(Vec::with_capacity(data.len() / 2), self.level);
        encoder.write_all(data)?;
        let compressed = encoder.finish()?;

        let uncompressed_size = checked_size(name, data.len() as u64)?;
        let compressed_size = checked_size(name, compressed.len() as u64)?;
        let header = self.header(name, 8, crc32(data), compressed_size, uncompressed_size)?;
        self.emit(header, &compressed)
    }

    /// Add an empty directory entry. A trailing `/` is appended if missing.
    pub fn add_directory(&mut self, name: &str) -> Result<()> {
        let name = if name.ends_with('/') {
            name.to_string()
        } else {
            format!("{}/", name)
        };
        let mut header = self.header(&name, 0, 0, 0, 0)?;
        header.external_attributes = DOS_DIRECTORY_ATTRIBUTE;
        self.emit(header, &[])
    }

    /// Write the central directory and end record, returning the sink.
    pub fn finish(mut self) -> Result<W> {
        let cd_start = self.out.written();
        for header in &self.entries {
            header.write_central(&mut self.out)?;
        }
        let cd_size = self.out.written() - cd_start;

        let count = self.entries.len() as u16;
        EndOfCentralDirectory {
            disk_number: 0,
            central_directory_disk: 0,
            entries_on_disk: count,
            total_entries: count,
            central_directory_size: offset_u32(cd_size)?,
            central_directory_offset: offset_u32(cd_start)?,
            comment_len: 0,
        }
        .write(&mut self.out)?;
        self.out.flush()?;

        log::debug!(
            "Finished archive: {} entries, {} bytes",
            self.entries.len(),
            self.out.written()
        );
        Ok(self.out.into_inner())
    }

    fn header(
        &mut self,
        name: &str,
        method: u16,
        crc: u32,
        compressed_size: u32,
        uncompressed_size: u32,
    ) -> Result<CentralDirectoryHeader> {
        validate_name(name)?;
        if self.entries.len() >= MAX_ENTRIES {
            return Err(Error::Encoding(format!(
                "archive entry limit of {} reached",
                MAX_ENTRIES
            )));
        }
        if !self.names.insert(name.to_string()) {
            return Err(Error::Encoding(format!("duplicate archive entry '{}'", name)));
        }

        Ok(CentralDirectoryHeader {
            version_needed: if method == 8 {
                VERSION_DEFLATED
            } else {
                VERSION_STORED
            },
            flags: if name.is_ascii() { 0 } else { FLAG_UTF8 },
            method,
            modified: self.modified,
            crc32: crc,
            compressed_size,
            uncompressed_size,
            external_attributes: 0,
            local_header_offset: offset_u32(self.out.written())?,
            name: name.to_string(),
        })
    }

    fn begin(&mut self, header: CentralDirectoryHeader) -> Result<()> {
        header.write_local(&mut self.out)?;
        self.entries.push(header);
        Ok(())
    }

    fn emit(&mut self, header: CentralDirectoryHeader, payload: &[u8]) -> Result<()> {
        self.begin(header)?;
        self.out.write_all(payload)?;
        Ok(())
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name == "/" {
        return Err(Error::Encoding("archive entry name is empty".to_string()));
    }
    if name.len() > usize::from(u16::MAX) {
        return Err(Error::Encoding(format!(
            "archive entry name is {} bytes long",
            name.len()
        )));
    }
    if name.starts_with('/') || name.contains('\\') || name.split('/').any(|part| part == "..") {
        return Err(Error::Encoding(format!(
            "archive entry name '{}' is not a relative forward-slash path",
            name
        )));
    }
    Ok(())
}

fn checked_size(name: &str, len: u64) -> Result<u32> {
    u32::try_from(len)
        .ok()
        .filter(|&n| n != u32::MAX)
        .ok_or_else(|| Error::entry(name, format!("{} bytes exceeds the 4 GiB entry limit", len)))
}

fn offset_u32(offset: u64) -> Result<u32> {
    u32::try_from(offset)
        .ok()
        .filter(|&n| n != u32::MAX)
        .ok_or_else(|| Error::Encoding(format!("archive offset {} needs ZIP64", offset)))
}
