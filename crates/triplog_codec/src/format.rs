//! On-disk constants, file header versions and transaction formats.

use crate::error::{CodecError, CodecResult};

/// Magic bytes at the start of every journal file.
pub const JOURNAL_MAGIC: [u8; 6] = *b"trlog\0";

/// Size of the file header: magic (6) + version digits (2).
pub const FILE_HEADER_SIZE: usize = 8;

/// Every integer in the journal is a big-endian 32-bit word.
pub const WORD_SIZE: usize = 4;

/// Offset, from the start of a transaction, of the first CRC-covered byte.
/// size (4) + entry count (4) + crc (4) = 12 bytes
pub const CRC_SPAN_OFFSET: usize = 3 * WORD_SIZE;

/// Transaction header: size, entry count, crc, timestamp, format.
pub const TRANSACTION_HEADER_SIZE: usize = 5 * WORD_SIZE;

/// Transaction footer: the size repeated.
pub const TRANSACTION_FOOTER_SIZE: usize = WORD_SIZE;

/// Smallest valid transaction (no entries).
pub const MIN_TRANSACTION_SIZE: usize = TRANSACTION_HEADER_SIZE + TRANSACTION_FOOTER_SIZE;

/// Journal file format version, stored as two ASCII digits after the magic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum FormatVersion {
    /// Legacy format. Never contains update operations.
    V03,
    /// Current format.
    #[default]
    V04,
}

impl FormatVersion {
    /// The version written to newly created files.
    pub const CURRENT: Self = Self::V04;

    /// Returns the two ASCII version digits.
    #[must_use]
    pub const fn digits(self) -> [u8; 2] {
        match self {
            Self::V03 => *b"03",
            Self::V04 => *b"04",
        }
    }

    /// Returns whether the update bit may appear in files of this version.
    #[must_use]
    pub const fn supports_update(self) -> bool {
        matches!(self, Self::V04)
    }

    /// Returns the complete 8-byte file header for this version.
    #[must_use]
    pub fn file_header(self) -> [u8; FILE_HEADER_SIZE] {
        let mut header = [0u8; FILE_HEADER_SIZE];
        header[..JOURNAL_MAGIC.len()].copy_from_slice(&JOURNAL_MAGIC);
        header[JOURNAL_MAGIC.len()..].copy_from_slice(&self.digits());
        header
    }

    /// Parses a file header, returning the version it declares.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::InvalidHeader`] if the header is short, the
    /// magic is wrong or the version digits are unknown.
    pub fn from_file_header(header: &[u8]) -> CodecResult<Self> {
        if header.len() < FILE_HEADER_SIZE {
            return Err(CodecError::invalid_header(format!(
                "expected {FILE_HEADER_SIZE} header bytes, found {}",
                header.len()
            )));
        }

        if header[..JOURNAL_MAGIC.len()] != JOURNAL_MAGIC {
            return Err(CodecError::invalid_header("bad magic"));
        }

        match &header[JOURNAL_MAGIC.len()..FILE_HEADER_SIZE] {
            b"03" => Ok(Self::V03),
            b"04" => Ok(Self::V04),
            other => Err(CodecError::invalid_header(format!(
                "unknown version {:?}",
                String::from_utf8_lossy(other)
            ))),
        }
    }
}

impl std::fmt::Display for FormatVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let digits = self.digits();
        write!(f, "{}{}", digits[0] as char, digits[1] as char)
    }
}

/// Kind of transaction, stored in the transaction header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum TransactionFormat {
    /// Data changes (resources and statements).
    Data = 1,
    /// Ontology changes. Their entries live in a separate journal stream.
    Ontology = 2,
}

impl TransactionFormat {
    /// Converts a header word to a transaction format.
    #[must_use]
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            1 => Some(Self::Data),
            2 => Some(Self::Ontology),
            _ => None,
        }
    }

    /// Converts the format to its header word.
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self as u32
    }
}

/// Computes the transaction checksum over the span from just after the crc
/// field through the footer inclusive.
#[must_use]
pub fn transaction_crc(span: &[u8]) -> u32 {
    crc32fast::hash(span)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_bytes_are_exact() {
        assert_eq!(&FormatVersion::V04.file_header(), b"trlog\x0004");
        assert_eq!(&FormatVersion::V03.file_header(), b"trlog\x0003");
    }

    #[test]
    fn header_parses_both_versions() {
        assert_eq!(
            FormatVersion::from_file_header(b"trlog\x0003").unwrap(),
            FormatVersion::V03
        );
        assert_eq!(
            FormatVersion::from_file_header(b"trlog\x0004").unwrap(),
            FormatVersion::V04
        );
    }

    #[test]
    fn header_rejects_unknown_version() {
        let result = FormatVersion::from_file_header(b"trlog\x0005");
        assert!(matches!(result, Err(CodecError::InvalidHeader { .. })));
    }

    #[test]
    fn header_rejects_bad_magic() {
        let result = FormatVersion::from_file_header(b"trlox\x0004");
        assert!(matches!(result, Err(CodecError::InvalidHeader { .. })));
    }

    #[test]
    fn header_rejects_short_input() {
        let result = FormatVersion::from_file_header(b"trlog");
        assert!(matches!(result, Err(CodecError::InvalidHeader { .. })));
    }

    #[test]
    fn only_current_version_supports_update() {
        assert!(FormatVersion::V04.supports_update());
        assert!(!FormatVersion::V03.supports_update());
    }

    #[test]
    fn transaction_format_roundtrip() {
        assert_eq!(TransactionFormat::from_u32(1), Some(TransactionFormat::Data));
        assert_eq!(
            TransactionFormat::from_u32(2),
            Some(TransactionFormat::Ontology)
        );
        assert_eq!(TransactionFormat::from_u32(3), None);
        assert_eq!(TransactionFormat::Ontology.as_u32(), 2);
    }

    #[test]
    fn crc_matches_ieee_check_value() {
        assert_eq!(transaction_crc(b"123456789"), 0xCBF4_3926);
    }
}
