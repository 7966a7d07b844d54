//! # Triplog Testkit
//!
//! Test utilities for the triplog journal.
//!
//! This crate provides:
//! - Temporary journal directories and writer/reader helpers
//! - Property-based test generators using proptest
//! - Corruption helpers that flip bytes or cut files short
//! - Golden byte layouts built field by field
//!
//! ## Usage
//!
//! ```rust
//! use triplog_testkit::prelude::*;
//!
//! let journal = TestJournal::new();
//! let mut writer = journal.writer();
//! write_transaction(&mut writer, &scenario_transaction()).unwrap();
//!
//! let events = collect_events(&mut journal.reader()).unwrap();
//! assert_eq!(events, transaction_events(&scenario_transaction()));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod crash;
pub mod fixtures;
pub mod generators;
pub mod golden;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::crash::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::golden::*;
}

pub use crash::*;
pub use fixtures::*;
pub use generators::*;
pub use golden::*;
