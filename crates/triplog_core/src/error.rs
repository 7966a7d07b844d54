//! Error types for the journal.

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use triplog_codec::CodecError;

/// Result type for journal operations.
pub type JournalResult<T> = Result<T, JournalError>;

/// Errors that can occur while writing, rotating or reading the journal.
#[derive(Debug, Error)]
pub enum JournalError {
    /// A transaction failed size, footer, checksum or entry validation.
    ///
    /// Recoverable: truncate the file to the reader's last verified offset.
    #[error("damaged journal entry in {} at offset {offset}: {message}", path.display())]
    DamagedJournalEntry {
        /// File containing the damage.
        path: PathBuf,
        /// Offset at which the damaged transaction or entry begins.
        offset: u64,
        /// Description of the damage.
        message: String,
    },

    /// Appending to the journal failed. The transaction is not committed.
    #[error("could not write journal {}: {source}", path.display())]
    CouldNotWrite {
        /// Journal file.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// Closing or retiring the active file failed.
    #[error("could not close journal {}: {source}", path.display())]
    CouldNotClose {
        /// Journal file.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// The file header is missing or of an unknown version.
    #[error("unreadable journal header in {}: {message}", path.display())]
    BeginOfJournal {
        /// Journal file.
        path: PathBuf,
        /// Description of the header problem.
        message: String,
    },

    /// A journal file could not be opened for reading.
    #[error("could not open journal {}: {source}", path.display())]
    Open {
        /// Journal file.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// The value cannot be represented in the target file's format.
    #[error("unsupported: {message}")]
    Unsupported {
        /// Why the value was refused.
        message: String,
    },

    /// Operation not permitted in the current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why the operation is invalid.
        message: String,
    },

    /// Replay was stopped by the transaction callback.
    #[error("replay aborted: {message}")]
    ReplayAborted {
        /// Reason given by the callback.
        message: String,
    },
}

impl JournalError {
    /// Creates a damaged entry error.
    pub fn damaged(path: impl Into<PathBuf>, offset: u64, message: impl Into<String>) -> Self {
        Self::DamagedJournalEntry {
            path: path.into(),
            offset,
            message: message.into(),
        }
    }

    /// Creates a write error.
    pub fn could_not_write(path: &Path, source: io::Error) -> Self {
        Self::CouldNotWrite {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Creates a close error.
    pub fn could_not_close(path: &Path, source: io::Error) -> Self {
        Self::CouldNotClose {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Creates a header error.
    pub fn begin_of_journal(path: &Path, message: impl Into<String>) -> Self {
        Self::BeginOfJournal {
            path: path.to_path_buf(),
            message: message.into(),
        }
    }

    /// Creates an open error.
    pub fn open(path: &Path, source: io::Error) -> Self {
        Self::Open {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Creates a replay aborted error.
    pub fn replay_aborted(message: impl Into<String>) -> Self {
        Self::ReplayAborted {
            message: message.into(),
        }
    }

    /// Returns whether this is a [`JournalError::DamagedJournalEntry`].
    #[must_use]
    pub fn is_damaged(&self) -> bool {
        matches!(self, Self::DamagedJournalEntry { .. })
    }

    /// Maps an encoder error raised while buffering or framing.
    pub(crate) fn from_encode(path: &Path, error: CodecError) -> Self {
        match error {
            CodecError::UnsupportedOperation { message } => Self::Unsupported { message },
            CodecError::Io(source) => Self::could_not_write(path, source),
            other => Self::Unsupported {
                message: other.to_string(),
            },
        }
    }

    /// Maps a decoder error raised at `offset` in `path`.
    pub(crate) fn from_decode(path: &Path, offset: u64, error: CodecError) -> Self {
        match error {
            CodecError::Damaged { message } => Self::damaged(path, offset, message),
            CodecError::InvalidHeader { message } => Self::begin_of_journal(path, message),
            CodecError::Io(source) => Self::damaged(path, offset, format!("read failed: {source}")),
            CodecError::UnsupportedOperation { message } => Self::damaged(path, offset, message),
        }
    }
}
