//! # Triplog Core
//!
//! Crash-safe transaction journal for an embedded triple store.
//!
//! This crate provides:
//! - [`JournalWriter`]: buffers a transaction's entries and appends the
//!   framed transaction with a single write
//! - [`RotationManager`]: retires the active file into numbered chunks and
//!   gzips them in the background
//! - [`JournalReader`]: replays a file or a whole chunk chain, verifying
//!   every transaction before handing out its entries
//! - [`verify_last`]: a cheap startup probe for a torn final transaction
//!
//! ## Recovery
//!
//! ```no_run
//! use std::path::Path;
//! use triplog_core::{replay, verify_last, JournalReader, JournalWriter, DATA_JOURNAL_FILE};
//!
//! let dir = Path::new("/var/lib/store");
//! let active = dir.join(DATA_JOURNAL_FILE);
//!
//! if !verify_last(dir) {
//!     let mut reader = JournalReader::open(&active).unwrap();
//!     let _ = replay(&mut reader, |_| Ok(()));
//!     let good = reader.size_of_correct();
//!     drop(reader);
//!     JournalWriter::open(&active, false).unwrap().truncate(good).unwrap();
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod layout;
mod reader;
mod replay;
mod rotation;
mod verify;
mod writer;

pub use config::{JournalConfig, RotationConfig, DEFAULT_CHUNK_SIZE};
pub use error::{JournalError, JournalResult};
pub use layout::{JournalLayout, DATA_JOURNAL_FILE, ONTOLOGY_JOURNAL_FILE};
pub use reader::{EntryType, Events, JournalEvent, JournalReader};
pub use replay::{replay, ReplayStats};
pub use rotation::{compress_chunk, RotationManager};
pub use verify::{verify_last, verify_last_transaction};
pub use writer::JournalWriter;

pub use triplog_codec::{
    FormatVersion, JournalEntry, Statement, StatementOp, StringOrId, Transaction,
    TransactionFormat,
};
