//! Golden byte layouts.
//!
//! The expected bytes here are assembled field by field from the format
//! description, independently of the encoder, so that a test comparing
//! them to writer output pins the on-disk layout.

use std::fmt::Write as _;
use triplog_codec::transaction_crc;
use triplog_core::{JournalEntry, StatementOp, Transaction, TransactionFormat};

/// The transaction used by the reference scenario: a resource and a
/// string statement committed at timestamp 1000.
pub fn scenario_transaction() -> Transaction {
    Transaction {
        timestamp: 1000,
        format: TransactionFormat::Data,
        entries: vec![
            JournalEntry::resource(1, "http://example.com/res1"),
            JournalEntry::statement(StatementOp::Insert, None, 1, 2, "hello"),
        ],
    }
}

/// Expected on-disk bytes of [`scenario_transaction`].
pub fn scenario_transaction_bytes() -> Vec<u8> {
    let mut entries = Vec::new();
    // resource: flags, subject, uri
    entries.extend_from_slice(&0x01u32.to_be_bytes());
    entries.extend_from_slice(&1u32.to_be_bytes());
    entries.extend_from_slice(b"http://example.com/res1\0");
    // insert statement: flags, subject, predicate, object
    entries.extend_from_slice(&0x00u32.to_be_bytes());
    entries.extend_from_slice(&1u32.to_be_bytes());
    entries.extend_from_slice(&2u32.to_be_bytes());
    entries.extend_from_slice(b"hello\0");

    frame(2, 1000, 1, &entries)
}

/// Frames raw entry bytes as a transaction.
pub fn frame(count: u32, timestamp: u32, format: u32, entries: &[u8]) -> Vec<u8> {
    let size = (20 + entries.len() + 4) as u32;

    let mut span = Vec::new();
    span.extend_from_slice(&timestamp.to_be_bytes());
    span.extend_from_slice(&format.to_be_bytes());
    span.extend_from_slice(entries);
    span.extend_from_slice(&size.to_be_bytes());

    let mut bytes = Vec::with_capacity(size as usize);
    bytes.extend_from_slice(&size.to_be_bytes());
    bytes.extend_from_slice(&count.to_be_bytes());
    bytes.extend_from_slice(&transaction_crc(&span).to_be_bytes());
    bytes.extend_from_slice(&span);
    bytes
}

/// Encodes bytes as lowercase hex, for readable assertion failures.
pub fn hex_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(out, "{byte:02x}");
    }
    out
}

/// Asserts two byte strings are equal, printing both as hex otherwise.
pub fn assert_bytes_eq(actual: &[u8], expected: &[u8]) {
    assert!(
        actual == expected,
        "byte mismatch\n  expected ({} bytes): {}\n  actual   ({} bytes): {}",
        expected.len(),
        hex_encode(expected),
        actual.len(),
        hex_encode(actual)
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_frame_is_74_bytes() {
        let bytes = scenario_transaction_bytes();
        assert_eq!(bytes.len(), 74);
        assert_eq!(&bytes[..4], &74u32.to_be_bytes());
        assert_eq!(&bytes[70..], &74u32.to_be_bytes());
    }

    #[test]
    fn hex() {
        assert_eq!(hex_encode(&[0x00, 0xab, 0x10]), "00ab10");
    }
}
