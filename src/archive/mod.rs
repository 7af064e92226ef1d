//! ZIP container support.
//!
//! DOCX and ODT are both ZIP packages. This module reads them entry by entry
//! ([`ArchiveReader`]) and writes new ones ([`ArchiveWriter`]). Only the
//! stored and deflate methods are handled; ZIP64, encryption and multi-disk
//! archives are rejected.

mod crc;
mod headers;
mod reader;
mod writer;

use std::io::Cursor;

pub use crc::{crc32, crc32_stream};
pub use headers::DosDateTime;
pub use reader::ArchiveReader;
pub use writer::{ArchiveWriter, MAX_ENTRIES};
pub(crate) use writer::CountingWriter;

/// Compression method of an archive entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    /// Method 0
    Stored,
    /// Method 8
    Deflated,
    /// Anything else; reading such an entry fails.
    Other(u16),
}

impl CompressionMethod {
    pub fn from_id(id: u16) -> Self {
        match id {
            0 => CompressionMethod::Stored,
            8 => CompressionMethod::Deflated,
            other => CompressionMethod::Other(other),
        }
    }

    pub fn id(self) -> u16 {
        match self {
            CompressionMethod::Stored => 0,
            CompressionMethod::Deflated => 8,
            CompressionMethod::Other(id) => id,
        }
    }
}

/// A fully decoded archive entry.
#[derive(Debug, Clone)]
pub struct ArchiveEntry {
    /// Path inside the archive, forward-slash separated
    pub name: String,

    /// Directory entries have a trailing `/` and no data
    pub is_directory: bool,

    pub method: CompressionMethod,

    /// CRC-32 of the decompressed data (verified)
    pub crc32: u32,

    /// Size of the data as stored in the archive
    pub compressed_size: u64,

    data: Vec<u8>,
}

impl ArchiveEntry {
    /// Decompressed size.
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    /// Decompressed content.
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// Content as a readable stream.
    pub fn into_reader(self) -> Cursor<Vec<u8>> {
        Cursor::new(self.data)
    }

    /// Content decoded as UTF-8, replacing invalid sequences.
    pub fn text_lossy(&self) -> String {
        String::from_utf8_lossy(&self.data).into_owned()
    }
}
