//! # Triplog Codec
//!
//! Bit-exact encoding of triple-store journal entries and transaction frames.
//!
//! This crate is stateless: it knows how a single mutation record and a
//! transaction frame look on disk, and nothing about files, rotation or
//! replay order.
//!
//! ## Wire Format
//!
//! All integers are big-endian 32-bit words.
//!
//! ```text
//! file        | "trlog\0" | "04" | transaction* |
//! transaction | size | count | crc | timestamp | format | entry* | size |
//! resource    | flags=0x01 | subject | uri\0 |
//! statement   | flags | [graph] | subject | predicate | object\0 or object id |
//! ```
//!
//! ## Usage
//!
//! ```
//! use triplog_codec::{
//!     decode_entry, FormatVersion, JournalEntry, SliceSource, TransactionEncoder,
//!     TransactionFormat,
//! };
//!
//! let mut txn = TransactionEncoder::new(1000, TransactionFormat::Data, FormatVersion::V04);
//! txn.push(&JournalEntry::resource(1, "http://example.com/res1")).unwrap();
//! let framed = txn.finish().unwrap();
//!
//! // Skip the 20-byte transaction header and decode the entry.
//! let mut source = SliceSource::new(&framed[20..]);
//! let entry = decode_entry(&mut source, FormatVersion::V04).unwrap();
//! assert_eq!(entry, JournalEntry::resource(1, "http://example.com/res1"));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod decoder;
mod encoder;
mod entry;
mod error;
mod format;
mod source;

pub use decoder::{decode_entry, read_cstring, read_u32};
pub use encoder::{encode_entry, encode_resource, encode_statement, TransactionEncoder};
pub use entry::{
    DataFlags, JournalEntry, ObjectRef, Statement, StatementOp, StringOrId, Transaction,
};
pub use error::{CodecError, CodecResult};
pub use format::{
    transaction_crc, FormatVersion, TransactionFormat, CRC_SPAN_OFFSET, FILE_HEADER_SIZE,
    JOURNAL_MAGIC, MIN_TRANSACTION_SIZE, TRANSACTION_FOOTER_SIZE, TRANSACTION_HEADER_SIZE,
    WORD_SIZE,
};
pub use source::{ByteSource, SliceSource, StreamSource};
