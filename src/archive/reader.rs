//! Forward-only ZIP reader.

use std::io::{Read, Seek, SeekFrom};

use flate2::read::DeflateDecoder;

use super::crc::crc32;
use super::headers::{
    CentralDirectoryHeader, EndOfCentralDirectory, LocalFileHeader, END_OF_CENTRAL_DIRECTORY_LEN,
    FLAG_DATA_DESCRIPTOR, FLAG_ENCRYPTED, ZIP64_MARKER_32,
};
use super::{ArchiveEntry, CompressionMethod};
use crate::error::{Error, Result};

/// Largest buffer reserved up front from sizes declared in the headers.
const MAX_PREALLOCATION: u64 = 1 << 20;

/// Forward-only reader over the entries of a ZIP container.
///
/// The central directory is parsed up front; entries are then yielded in
/// archive order (by local header offset), each decompressed and checked
/// against its CRC-32 only when the iterator reaches it. Iteration is not
/// restartable. A bad entry is reported as an `Err` item and iteration can
/// continue past it.
///
/// # Example
///
/// ```no_run
/// use docvert::archive::ArchiveReader;
/// use std::fs::File;
///
/// let file = File::open("report.docx")?;
/// for entry in ArchiveReader::new(file)? {
///     let entry = entry?;
///     println!("{} ({} bytes)", entry.name, entry.size());
/// }
/// # Ok::<(), docvert::Error>(())
/// ```
pub struct ArchiveReader<R: Read + Seek> {
    source: R,
    headers: Vec<CentralDirectoryHeader>,
    next: usize,
}

impl<R: Read + Seek> ArchiveReader<R> {
    /// Open an archive by locating and parsing its central directory.
    pub fn new(mut source: R) -> Result<Self> {
        let len = source.seek(SeekFrom::End(0))?;
        if len < END_OF_CENTRAL_DIRECTORY_LEN as u64 {
            return Err(Error::ArchiveCorrupt(format!(
                "input too short to be a ZIP archive ({} bytes)",
                len
            )));
        }

        let eocd = Self::locate_end_record(&mut source, len)?;
        if eocd.disk_number != 0 || eocd.central_directory_disk != 0 {
            return Err(Error::ArchiveCorrupt(
                "multi-disk archives are not supported".to_string(),
            ));
        }
        if eocd.central_directory_offset == ZIP64_MARKER_32 || eocd.total_entries == u16::MAX {
            return Err(Error::ArchiveCorrupt(
                "ZIP64 archives are not supported".to_string(),
            ));
        }

        let cd_start = u64::from(eocd.central_directory_offset);
        let cd_size = u64::from(eocd.central_directory_size);
        if cd_start + cd_size > len {
            return Err(Error::ArchiveCorrupt(format!(
                "central directory ({} bytes at offset {}) lies outside the {}-byte input",
                cd_size, cd_start, len
            )));
        }

        source.seek(SeekFrom::Start(cd_start))?;
        let mut directory = vec![0u8; cd_size as usize];
        source.read_exact(&mut directory)?;

        let mut cursor = directory.as_slice();
        let mut headers = Vec::with_capacity(usize::from(eocd.total_entries));
        for index in 0..eocd.total_entries {
            match CentralDirectoryHeader::read(&mut cursor) {
                Ok(Some(header)) => headers.push(header),
                Ok(None) => {
                    return Err(Error::ArchiveCorrupt(format!(
                        "central directory record {} has a bad signature",
                        index
                    )))
                }
                Err(e) => {
                    return Err(Error::ArchiveCorrupt(format!(
                        "central directory record {} is truncated: {}",
                        index, e
                    )))
                }
            }
        }

        headers.sort_by_key(|h| h.local_header_offset);
        log::debug!("Opened archive: {} entries, {} bytes", headers.len(), len);

        Ok(Self {
            source,
            headers,
            next: 0,
        })
    }

    /// Scan backwards from the end for the end-of-central-directory record.
    fn locate_end_record(source: &mut R, len: u64) -> Result<EndOfCentralDirectory> {
        let search_len = len.min((END_OF_CENTRAL_DIRECTORY_LEN + usize::from(u16::MAX)) as u64);
        source.seek(SeekFrom::Start(len - search_len))?;
        let mut tail = vec![0u8; search_len as usize];
        source.read_exact(&mut tail)?;

        let last_start = tail.len() - END_OF_CENTRAL_DIRECTORY_LEN;
        for start in (0..=last_start).rev() {
            if &tail[start..start + 4] != b"PK\x05\x06" {
                continue;
            }
            if let Ok(Some(record)) = EndOfCentralDirectory::parse(&tail[start..]) {
                // A real record's comment runs exactly to the end of input.
                let comment_end = start + END_OF_CENTRAL_DIRECTORY_LEN + usize::from(record.comment_len);
                if comment_end == tail.len() {
                    return Ok(record);
                }
            }
        }

        Err(Error::ArchiveCorrupt(
            "end of central directory record not found".to_string(),
        ))
    }

    /// Total number of entries, including those already consumed.
    pub fn len(&self) -> usize {
        self.headers.len()
    }

    /// Check if the archive has no entries.
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    /// Number of entries not yet yielded.
    pub fn remaining(&self) -> usize {
        self.headers.len() - self.next
    }

    /// Names of all entries in archive order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.headers.iter().map(|h| h.name.as_str())
    }

    /// Advance until the entry called `name` and return it.
    ///
    /// Entries passed over are consumed; unreadable ones among them are
    /// skipped. A failure on the requested entry itself is returned.
    pub fn find(&mut self, name: &str) -> Result<Option<ArchiveEntry>> {
        while self.next < self.headers.len() {
            let index = self.next;
            self.next += 1;
            if self.headers[index].name == name {
                return self.read_entry(index).map(Some);
            }
        }
        Ok(None)
    }

    fn read_entry(&mut self, index: usize) -> Result<ArchiveEntry> {
        let header = &self.headers[index];
        let name = header.name.clone();

        if header.flags & FLAG_ENCRYPTED != 0 {
            return Err(Error::entry(name, "encrypted entries are not supported"));
        }
        if header.compressed_size == ZIP64_MARKER_32 || header.uncompressed_size == ZIP64_MARKER_32
        {
            return Err(Error::entry(name, "ZIP64 entries are not supported"));
        }

        let method = CompressionMethod::from_id(header.method);
        let expected_crc = header.crc32;
        let compressed_size = u64::from(header.compressed_size);
        let uncompressed_size = u64::from(header.uncompressed_size);
        let descriptor = header.flags & FLAG_DATA_DESCRIPTOR != 0;
        let is_directory = header.is_directory();

        self.source
            .seek(SeekFrom::Start(u64::from(header.local_header_offset)))?;
        let local = match LocalFileHeader::read(&mut self.source) {
            Ok(Some(local)) => local,
            Ok(None) => return Err(Error::entry(name, "local header signature mismatch")),
            Err(e) => return Err(Error::entry(name, format!("local header truncated: {}", e))),
        };
        if !descriptor
            && (local.crc32 != expected_crc || u64::from(local.compressed_size) != compressed_size)
        {
            return Err(Error::entry(
                name,
                "local header disagrees with central directory",
            ));
        }

        let data_start = u64::from(header.local_header_offset) + local.data_offset();
        self.source.seek(SeekFrom::Start(data_start))?;
        let mut compressed = Vec::with_capacity(compressed_size.min(MAX_PREALLOCATION) as usize);
        (&mut self.source)
            .take(compressed_size)
            .read_to_end(&mut compressed)?;
        if compressed.len() as u64 != compressed_size {
            return Err(Error::entry(
                name,
                format!(
                    "data truncated: expected {} bytes, found {}",
                    compressed_size,
                    compressed.len()
                ),
            ));
        }

        let data = match method {
            CompressionMethod::Stored => compressed,
            CompressionMethod::Deflated => {
                // One byte past the declared size is enough to detect a lie.
                let mut out = Vec::with_capacity(uncompressed_size.min(MAX_PREALLOCATION) as usize);
                DeflateDecoder::new(compressed.as_slice())
                    .take(uncompressed_size + 1)
                    .read_to_end(&mut out)
                    .map_err(|e| Error::entry(&name, format!("deflate stream: {}", e)))?;
                if out.len() as u64 > uncompressed_size {
                    return Err(Error::entry(
                        name,
                        format!("deflate stream exceeds declared size of {} bytes", uncompressed_size),
                    ));
                }
                out
            }
            CompressionMethod::Other(id) => {
                return Err(Error::entry(
                    name,
                    format!("unsupported compression method {}", id),
                ))
            }
        };

        if data.len() as u64 != uncompressed_size {
            return Err(Error::entry(
                name,
                format!(
                    "size mismatch: expected {} bytes, decoded {}",
                    uncompressed_size,
                    data.len()
                ),
            ));
        }
        let actual_crc = crc32(&data);
        if actual_crc != expected_crc {
            return Err(Error::entry(
                name,
                format!(
                    "CRC-32 mismatch: expected {:08x}, computed {:08x}",
                    expected_crc, actual_crc
                ),
            ));
        }

        Ok(ArchiveEntry {
            name,
            is_directory,
            method,
            crc32: actual_crc,
            compressed_size,
            data,
        })
    }

    /// Release the underlying source.
    pub fn into_inner(self) -> R {
        self.source
    }
}

impl<R: Read + Seek> Iterator for ArchiveReader<R> {
    type Item = Result<ArchiveEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.headers.len() {
            return None;
        }
        let index = self.next;
        self.next += 1;
        Some(self.read_entry(index))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.remaining();
        (remaining, Some(remaining))
    }
}

impl<R: Read + Seek> std::fmt::Debug for ArchiveReader<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveReader")
            .field("entries", &self.headers.len())
            .field("next", &self.next)
            .finish()
    }
}
