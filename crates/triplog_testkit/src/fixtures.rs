//! Test fixtures and journal helpers.
//!
//! Provides temporary journal directories and shortcuts for writing
//! transactions and reading them back as events.

use std::path::{Path, PathBuf};
use tempfile::TempDir;
use triplog_core::{
    JournalConfig, JournalEvent, JournalLayout, JournalReader, JournalResult, JournalWriter,
    Transaction, DATA_JOURNAL_FILE,
};

/// A journal directory with automatic cleanup.
pub struct TestJournal {
    config: JournalConfig,
    _temp_dir: TempDir,
}

impl TestJournal {
    /// Creates an empty journal directory with default configuration.
    pub fn new() -> Self {
        Self::with_config(JournalConfig::default())
    }

    /// Creates an empty journal directory used with `config`.
    pub fn with_config(config: JournalConfig) -> Self {
        Self {
            config,
            _temp_dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Returns the journal directory.
    pub fn dir(&self) -> &Path {
        self._temp_dir.path()
    }

    /// Returns the path of the active data journal.
    pub fn active_path(&self) -> PathBuf {
        self.dir().join(DATA_JOURNAL_FILE)
    }

    /// Returns the configuration writers are opened with.
    pub fn config(&self) -> &JournalConfig {
        &self.config
    }

    /// Returns the layout of the journal, honoring the archive directory.
    pub fn layout(&self) -> JournalLayout {
        JournalLayout::new(self.active_path())
            .with_archive_dir(self.config.rotation.archive_dir.clone())
    }

    /// Opens a writer on the active file.
    pub fn writer(&self) -> JournalWriter {
        JournalWriter::open_with_config(self.active_path(), false, self.config.clone())
            .expect("Failed to open journal writer")
    }

    /// Opens a reader on the active file only.
    pub fn reader(&self) -> JournalReader {
        JournalReader::open(self.active_path()).expect("Failed to open journal reader")
    }

    /// Opens a reader on the whole chunk chain.
    pub fn chain_reader(&self) -> JournalReader {
        JournalReader::open_chain(
            self.active_path(),
            self.config.rotation.archive_dir.clone(),
        )
        .expect("Failed to open journal chain")
    }
}

impl Default for TestJournal {
    fn default() -> Self {
        Self::new()
    }
}

/// Writes `txn` as one committed transaction.
///
/// # Errors
///
/// Returns the first writer error; the transaction is rolled back.
pub fn write_transaction(writer: &mut JournalWriter, txn: &Transaction) -> JournalResult<()> {
    writer.start_transaction(txn.timestamp, txn.format)?;
    for entry in &txn.entries {
        if let Err(e) = writer.append_entry(entry) {
            writer.rollback_transaction()?;
            return Err(e);
        }
    }
    writer.commit_transaction()
}

/// Reads every remaining event.
///
/// # Errors
///
/// Returns the first reader error.
pub fn collect_events(reader: &mut JournalReader) -> JournalResult<Vec<JournalEvent>> {
    reader.events().collect()
}

/// Reads events until the first error, returning both.
pub fn collect_until_error(
    reader: &mut JournalReader,
) -> (Vec<JournalEvent>, Option<triplog_core::JournalError>) {
    let mut events = Vec::new();
    for event in reader.events() {
        match event {
            Ok(event) => events.push(event),
            Err(e) => return (events, Some(e)),
        }
    }
    (events, None)
}

/// Returns the events a reader yields for `txn`.
pub fn transaction_events(txn: &Transaction) -> Vec<JournalEvent> {
    let mut events = vec![JournalEvent::StartTransaction {
        timestamp: txn.timestamp,
        format: txn.format,
    }];
    events.extend(txn.entries.iter().cloned().map(JournalEvent::Entry));
    events.push(JournalEvent::EndTransaction);
    events
}
