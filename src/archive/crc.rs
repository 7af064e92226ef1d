//! CRC-32 (IEEE) helpers backed by `crc32fast`.

use std::io::{self, Read};

/// Compute the CRC-32 of a byte slice.
#[inline]
pub fn crc32(data: &[u8]) -> u32 {
    crc32fast::hash(data)
}

/// Stream a reader through a CRC-32 accumulator.
///
/// Returns the checksum and the number of bytes consumed.
pub fn crc32_stream<R: Read>(mut reader: R) -> io::Result<(u32, u64)> {
    let mut hasher = crc32fast::Hasher::new();
    let mut buf = [0u8; 8192];
    let mut total = 0u64;
    loop {
        match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                hasher.update(&buf[..n]);
                total += n as u64;
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok((hasher.finalize(), total))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_value() {
        // Standard check value for CRC-32/ISO-HDLC.
        assert_eq!(crc32(b"123456789"), 0xCBF43926);
        assert_eq!(crc32(b""), 0);
    }

    #[test]
    fn test_stream_matches_one_shot() {
        let data = vec![0x5Au8; 20_000];
        let (crc, len) = crc32_stream(data.as_slice()).unwrap();
        assert_eq!(crc, crc32(&data));
        assert_eq!(len, 20_000);
    }
}
