//! BA2 header parsing.

use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::errors::{Result, ScannerError};

/// Exact byte length of a BA2 header.
pub const BA2_HEADER_LEN: usize = 12;

const MAGIC: &[u8; 4] = b"BTDX";
const TAG_GENERAL: &[u8; 4] = b"GNRL";
const TAG_TEXTURE: &[u8; 4] = b"DX10";

/// Archive content format, from the header tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Ba2Format {
    /// Tag missing or unrecognised.
    #[default]
    Unknown,
    /// `GNRL` — general file archive.
    General,
    /// `DX10` — texture archive.
    Texture,
}

/// Decoded BA2 header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ba2HeaderInfo {
    /// True when magic, version, and format tag all check out.
    pub is_valid: bool,
    /// Decoded format tag.
    pub format: Ba2Format,
    /// Little-endian version field; zero is invalid.
    pub version: u32,
}

impl Ba2HeaderInfo {
    fn invalid() -> Self {
        Self {
            is_valid: false,
            format: Ba2Format::Unknown,
            version: 0,
        }
    }
}

/// Decode a header from raw bytes. Fewer than twelve bytes, a wrong magic,
/// a zero version, or an unknown format tag all yield an invalid header
/// with `format = Unknown`.
pub fn parse_header(bytes: &[u8]) -> Ba2HeaderInfo {
    if bytes.len() < BA2_HEADER_LEN {
        return Ba2HeaderInfo::invalid();
    }
    if &bytes[0..4] != MAGIC {
        return Ba2HeaderInfo::invalid();
    }

    let version = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
    let format = match &bytes[8..12] {
        tag if tag == TAG_GENERAL => Ba2Format::General,
        tag if tag == TAG_TEXTURE => Ba2Format::Texture,
        _ => return Ba2HeaderInfo::invalid(),
    };
    if version == 0 {
        return Ba2HeaderInfo::invalid();
    }

    Ba2HeaderInfo {
        is_valid: true,
        format,
        version,
    }
}

/// Read exactly the header bytes from a file and decode them. A file
/// shorter than the header is an invalid archive, not an error.
pub fn read_header(path: impl AsRef<Path>) -> Result<Ba2HeaderInfo> {
    let path = path.as_ref();
    let mut file = std::fs::File::open(path)
        .map_err(|e| ScannerError::io(format!("failed to open {}", path.display()), e))?;

    let mut buffer = [0u8; BA2_HEADER_LEN];
    let mut filled = 0usize;
    while filled < BA2_HEADER_LEN {
        match file.read(&mut buffer[filled..]) {
            Ok(0) => return Ok(Ba2HeaderInfo::invalid()),
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(ScannerError::io("failed to read archive header", e)),
        }
    }

    Ok(parse_header(&buffer))
}

/// Raw header bytes rendered for issue reports: printable ASCII stays,
/// everything else becomes `\xNN`.
pub fn header_bytes_display(bytes: &[u8]) -> String {
    bytes
        .iter()
        .take(BA2_HEADER_LEN)
        .map(|&b| {
            if (0x20..0x7f).contains(&b) {
                (b as char).to_string()
            } else {
                format!("\\x{b:02x}")
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    fn header(magic: &[u8; 4], version: u32, tag: &[u8; 4]) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(BA2_HEADER_LEN);
        bytes.extend_from_slice(magic);
        bytes.extend_from_slice(&version.to_le_bytes());
        bytes.extend_from_slice(tag);
        bytes
    }

    #[test]
    fn valid_general_header() {
        // 42 54 44 58 | 01 00 00 00 | 47 4E 52 4C
        let info = parse_header(&header(b"BTDX", 1, b"GNRL"));
        assert_eq!(
            info,
            Ba2HeaderInfo {
                is_valid: true,
                format: Ba2Format::General,
                version: 1
            }
        );
    }

    #[test]
    fn valid_texture_header() {
        let info = parse_header(&header(b"BTDX", 8, b"DX10"));
        assert!(info.is_valid);
        assert_eq!(info.format, Ba2Format::Texture);
        assert_eq!(info.version, 8);
    }

    #[test]
    fn wrong_magic_is_invalid() {
        let info = parse_header(&header(b"BSA\0", 1, b"GNRL"));
        assert!(!info.is_valid);
        assert_eq!(info.format, Ba2Format::Unknown);
    }

    #[test]
    fn unknown_tag_is_invalid() {
        let info = parse_header(&header(b"BTDX", 1, b"XXXX"));
        assert!(!info.is_valid);
        assert_eq!(info.format, Ba2Format::Unknown);
    }

    #[test]
    fn zero_version_is_invalid() {
        let info = parse_header(&header(b"BTDX", 0, b"GNRL"));
        assert!(!info.is_valid);
    }

    #[test]
    fn short_input_is_invalid() {
        assert!(!parse_header(b"BTDX").is_valid);
        assert!(!parse_header(&[]).is_valid);
        assert!(!parse_header(&header(b"BTDX", 1, b"GNRL")[..11]).is_valid);
    }

    #[test]
    fn version_is_little_endian() {
        let mut bytes = header(b"BTDX", 0, b"GNRL");
        bytes[4] = 0x02;
        bytes[5] = 0x01;
        let info = parse_header(&bytes);
        assert_eq!(info.version, 0x0102);
    }

    #[test]
    fn read_header_from_exact_size_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp");
        file.write_all(&header(b"BTDX", 1, b"GNRL")).expect("write");
        file.flush().expect("flush");

        let info = read_header(file.path()).expect("read");
        assert!(info.is_valid);
        assert_eq!(info.format, Ba2Format::General);
        assert_eq!(info.version, 1);
    }

    #[test]
    fn read_header_from_zero_byte_file() {
        let file = tempfile::NamedTempFile::new().expect("temp");
        let info = read_header(file.path()).expect("read");
        assert!(!info.is_valid);
    }

    #[test]
    fn read_header_from_short_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp");
        file.write_all(b"BTDX\x01").expect("write");
        file.flush().expect("flush");
        let info = read_header(file.path()).expect("read");
        assert!(!info.is_valid);
    }

    #[test]
    fn display_escapes_non_printable_bytes() {
        let rendered = header_bytes_display(&header(b"BTDX", 1, b"GNRL"));
        assert!(rendered.starts_with("BTDX"));
        assert!(rendered.contains("\\x01"));
        assert!(rendered.ends_with("GNRL"));
    }
}
