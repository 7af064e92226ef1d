//! ZIP record layouts: local file header, central directory header and the
//! end-of-central-directory record. No ZIP64, no encryption.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};
use std::io::{self, Read, Write};

pub(crate) const LOCAL_HEADER_SIGNATURE: u32 = 0x04034b50;
pub(crate) const CENTRAL_HEADER_SIGNATURE: u32 = 0x02014b50;
pub(crate) const END_OF_CENTRAL_DIRECTORY_SIGNATURE: u32 = 0x06054b50;

/// Fixed part of a local file header.
pub(crate) const LOCAL_HEADER_LEN: usize = 30;
/// Fixed part of a central directory header.
pub(crate) const CENTRAL_HEADER_LEN: usize = 46;
/// End-of-central-directory record without its comment.
pub(crate) const END_OF_CENTRAL_DIRECTORY_LEN: usize = 22;

/// General purpose flag: sizes and CRC follow the data in a descriptor.
pub(crate) const FLAG_DATA_DESCRIPTOR: u16 = 1 << 3;
/// General purpose flag: name is UTF-8.
pub(crate) const FLAG_UTF8: u16 = 1 << 11;
/// General purpose flag: entry is encrypted.
pub(crate) const FLAG_ENCRYPTED: u16 = 1;

pub(crate) const VERSION_STORED: u16 = 10;
pub(crate) const VERSION_DEFLATED: u16 = 20;

/// MS-DOS directory attribute, stored in the external attributes.
pub(crate) const DOS_DIRECTORY_ATTRIBUTE: u32 = 0x10;

/// Value every ZIP64-extended field is set to.
pub(crate) const ZIP64_MARKER_32: u32 = u32::MAX;

/// Timestamp in MS-DOS format (two-second resolution, 1980-2107).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DosDateTime {
    /// Packed time: hours << 11 | minutes << 5 | seconds / 2
    pub time: u16,
    /// Packed date: (year - 1980) << 9 | month << 5 | day
    pub date: u16,
}

impl DosDateTime {
    /// 1980-01-01 00:00:00, the earliest representable moment.
    pub const EPOCH: DosDateTime = DosDateTime {
        time: 0,
        date: (1 << 5) | 1,
    };

    /// Pack a calendar timestamp, clamping to the representable range.
    pub fn from_datetime(at: NaiveDateTime) -> Self {
        let year = at.year();
        if year < 1980 {
            return Self::EPOCH;
        }
        let year = year.min(2107) as u16;
        let time = ((at.hour() as u16) << 11) | ((at.minute() as u16) << 5) | (at.second() as u16 / 2);
        let date = ((year - 1980) << 9) | ((at.month() as u16) << 5) | at.day() as u16;
        Self { time, date }
    }

    /// Unpack to a calendar timestamp, if the fields are valid.
    pub fn to_datetime(self) -> Option<NaiveDateTime> {
        let year = 1980 + i32::from(self.date >> 9);
        let month = u32::from((self.date >> 5) & 0x0F);
        let day = u32::from(self.date & 0x1F);
        let hour = u32::from(self.time >> 11);
        let minute = u32::from((self.time >> 5) & 0x3F);
        let second = u32::from(self.time & 0x1F) * 2;
        NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, second)
    }
}

/// Local file header, as read before an entry's data.
#[derive(Debug, Clone)]
pub(crate) struct LocalFileHeader {
    pub flags: u16,
    pub method: u16,
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub name_len: u16,
    pub extra_len: u16,
}

impl LocalFileHeader {
    /// Read the fixed part of a local header. Returns `None` when the
    /// signature does not match.
    pub fn read<R: Read>(reader: &mut R) -> io::Result<Option<Self>> {
        if reader.read_u32::<LittleEndian>()? != LOCAL_HEADER_SIGNATURE {
            return Ok(None);
        }
        let _version_needed = reader.read_u16::<LittleEndian>()?;
        let flags = reader.read_u16::<LittleEndian>()?;
        let method = reader.read_u16::<LittleEndian>()?;
        let _time = reader.read_u16::<LittleEndian>()?;
        let _date = reader.read_u16::<LittleEndian>()?;
        let crc32 = reader.read_u32::<LittleEndian>()?;
        let compressed_size = reader.read_u32::<LittleEndian>()?;
        let uncompressed_size = reader.read_u32::<LittleEndian>()?;
        let name_len = reader.read_u16::<LittleEndian>()?;
        let extra_len = reader.read_u16::<LittleEndian>()?;
        Ok(Some(Self {
            flags,
            method,
            crc32,
            compressed_size,
            uncompressed_size,
            name_len,
            extra_len,
        }))
    }

    /// Bytes between the start of the header and the entry data.
    pub fn data_offset(&self) -> u64 {
        LOCAL_HEADER_LEN as u64 + u64::from(self.name_len) + u64::from(self.extra_len)
    }
}

/// Central directory record: the authoritative description of an entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CentralDirectoryHeader {
    pub version_needed: u16,
    pub flags: u16,
    pub method: u16,
    pub modified: DosDateTime,
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub external_attributes: u32,
    pub local_header_offset: u32,
    pub name: String,
}

impl CentralDirectoryHeader {
    /// Read one record. Returns `None` when the signature does not match.
    pub fn read<R: Read>(reader: &mut R) -> io::Result<Option<Self>> {
        if reader.read_u32::<LittleEndian>()? != CENTRAL_HEADER_SIGNATURE {
            return Ok(None);
        }
        let _version_made_by = reader.read_u16::<LittleEndian>()?;
        let version_needed = reader.read_u16::<LittleEndian>()?;
        let flags = reader.read_u16::<LittleEndian>()?;
        let method = reader.read_u16::<LittleEndian>()?;
        let time = reader.read_u16::<LittleEndian>()?;
        let date = reader.read_u16::<LittleEndian>()?;
        let crc32 = reader.read_u32::<LittleEndian>()?;
        let compressed_size = reader.read_u32::<LittleEndian>()?;
        let uncompressed_size = reader.read_u32::<LittleEndian>()?;
        let name_len = reader.read_u16::<LittleEndian>()?;
        let extra_len = reader.read_u16::<LittleEndian>()?;
        let comment_len = reader.read_u16::<LittleEndian>()?;
        let _disk_start = reader.read_u16::<LittleEndian>()?;
        let _internal_attributes = reader.read_u16::<LittleEndian>()?;
        let external_attributes = reader.read_u32::<LittleEndian>()?;
        let local_header_offset = reader.read_u32::<LittleEndian>()?;

        let mut name = vec![0u8; usize::from(name_len)];
        reader.read_exact(&mut name)?;
        let mut skipped = vec![0u8; usize::from(extra_len) + usize::from(comment_len)];
        reader.read_exact(&mut skipped)?;

        Ok(Some(Self {
            version_needed,
            flags,
            method,
            modified: DosDateTime { time, date },
            crc32,
            compressed_size,
            uncompressed_size,
            external_attributes,
            local_header_offset,
            name: String::from_utf8_lossy(&name).into_owned(),
        }))
    }

    /// Write the matching local file header (no extra field).
    pub fn write_local<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_u32::<LittleEndian>(LOCAL_HEADER_SIGNATURE)?;
        writer.write_u16::<LittleEndian>(self.version_needed)?;
        writer.write_u16::<LittleEndian>(self.flags)?;
        writer.write_u16::<LittleEndian>(self.method)?;
        writer.write_u16::<LittleEndian>(self.modified.time)?;
        writer.write_u16::<LittleEndian>(self.modified.date)?;
        writer.write_u32::<LittleEndian>(self.crc32)?;
        writer.write_u32::<LittleEndian>(self.compressed_size)?;
        writer.write_u32::<LittleEndian>(self.uncompressed_size)?;
        writer.write_u16::<LittleEndian>(self.name.len() as u16)?;
        writer.write_u16::<LittleEndian>(0)?;
        writer.write_all(self.name.as_bytes())
    }

    /// Write this central directory record (no extra field, no comment).
    pub fn write_central<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_u32::<LittleEndian>(CENTRAL_HEADER_SIGNATURE)?;
        writer.write_u16::<LittleEndian>(VERSION_DEFLATED)?; // made by: MS-DOS, 2.0
        writer.write_u16::<LittleEndian>(self.version_needed)?;
        writer.write_u16::<LittleEndian>(self.flags)?;
        writer.write_u16::<LittleEndian>(self.method)?;
        writer.write_u16::<LittleEndian>(self.modified.time)?;
        writer.write_u16::<LittleEndian>(self.modified.date)?;
        writer.write_u32::<LittleEndian>(self.crc32)?;
        writer.write_u32::<LittleEndian>(self.compressed_size)?;
        writer.write_u32::<LittleEndian>(self.uncompressed_size)?;
        writer.write_u16::<LittleEndian>(self.name.len() as u16)?;
        writer.write_u16::<LittleEndian>(0)?; // extra
        writer.write_u16::<LittleEndian>(0)?; // comment
        writer.write_u16::<LittleEndian>(0)?; // disk
        writer.write_u16::<LittleEndian>(0)?; // internal attributes
        writer.write_u32::<LittleEndian>(self.external_attributes)?;
        writer.write_u32::<LittleEndian>(self.local_header_offset)?;
        writer.write_all(self.name.as_bytes())
    }

    pub fn is_directory(&self) -> bool {
        self.name.ends_with('/')
    }
}

/// End-of-central-directory record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct EndOfCentralDirectory {
    pub disk_number: u16,
    pub central_directory_disk: u16,
    pub entries_on_disk: u16,
    pub total_entries: u16,
    pub central_directory_size: u32,
    pub central_directory_offset: u32,
    pub comment_len: u16,
}

impl EndOfCentralDirectory {
    /// Parse a record that starts at `data[0]` (signature included).
    pub fn parse(mut data: &[u8]) -> io::Result<Option<Self>> {
        if data.read_u32::<LittleEndian>()? != END_OF_CENTRAL_DIRECTORY_SIGNATURE {
            return Ok(None);
        }
        Ok(Some(Self {
            disk_number: data.read_u16::<LittleEndian>()?,
            central_directory_disk: data.read_u16::<LittleEndian>()?,
            entries_on_disk: data.read_u16::<LittleEndian>()?,
            total_entries: data.read_u16::<LittleEndian>()?,
            central_directory_size: data.read_u32::<LittleEndian>()?,
            central_directory_offset: data.read_u32::<LittleEndian>()?,
            comment_len: data.read_u16::<LittleEndian>()?,
        }))
    }

    pub fn write<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_u32::<LittleEndian>(END_OF_CENTRAL_DIRECTORY_SIGNATURE)?;
        writer.write_u16::<LittleEndian>(self.disk_number)?;
        writer.write_u16::<LittleEndian>(self.central_directory_disk)?;
        writer.write_u16::<LittleEndian>(self.entries_on_disk)?;
        writer.write_u16::<LittleEndian>(self.total_entries)?;
        writer.write_u32::<LittleEndian>(self.central_directory_size)?;
        writer.write_u32::<LittleEndian>(self.central_directory_offset)?;
        writer.write_u16::<LittleEndian>(self.comment_len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dos_datetime_round_trip() {
        let at = NaiveDate::from_ymd_opt(2024, 3, 15)
            .unwrap()
            .and_hms_opt(13, 45, 31)
            .unwrap();
        let dos = DosDateTime::from_datetime(at);
        let back = dos.to_datetime().unwrap();
        // two-second resolution
        assert_eq!(back, at.with_second(30).unwrap());
    }

    #[test]
    fn test_dos_datetime_before_1980_clamps() {
        let at = NaiveDate::from_ymd_opt(1970, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(DosDateTime::from_datetime(at), DosDateTime::EPOCH);
    }

    #[test]
    fn test_central_header_round_trip() {
        let header = CentralDirectoryHeader {
            version_needed: VERSION_STORED,
            flags: 0,
            method: 0,
            modified: DosDateTime::EPOCH,
            crc32: 0xDEADBEEF,
            compressed_size: 5,
            uncompressed_size: 5,
            external_attributes: 0,
            local_header_offset: 42,
            name: "mimetype".to_string(),
        };
        let mut buf = Vec::new();
        header.write_central(&mut buf).unwrap();
        assert_eq!(buf.len(), CENTRAL_HEADER_LEN + "mimetype".len());

        let parsed = CentralDirectoryHeader::read(&mut buf.as_slice())
            .unwrap()
            .unwrap();
        assert_eq!(parsed, header);
    }

    #[test]
    fn test_local_header_layout() {
        let header = CentralDirectoryHeader {
            version_needed: VERSION_DEFLATED,
            flags: FLAG_UTF8,
            method: 8,
            modified: DosDateTime::EPOCH,
            crc32: 1,
            compressed_size: 2,
            uncompressed_size: 3,
            external_attributes: 0,
            local_header_offset: 0,
            name: "a.xml".to_string(),
        };
        let mut buf = Vec::new();
        header.write_local(&mut buf).unwrap();
        assert_eq!(&buf[..4], b"PK\x03\x04");

        let local = LocalFileHeader::read(&mut buf.as_slice()).unwrap().unwrap();
        assert_eq!(local.crc32, 1);
        assert_eq!(local.compressed_size, 2);
        assert_eq!(local.uncompressed_size, 3);
        assert_eq!(local.data_offset(), (LOCAL_HEADER_LEN + 5) as u64);
    }
}
