//! Error types for the codec crate.

use std::io;
use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors that can occur while encoding or decoding journal bytes.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The bytes do not form a valid entry or frame.
    #[error("damaged journal entry: {message}")]
    Damaged {
        /// Description of the damage.
        message: String,
    },

    /// The 8-byte file header is missing or unrecognized.
    #[error("invalid journal header: {message}")]
    InvalidHeader {
        /// Description of the header problem.
        message: String,
    },

    /// The value cannot be represented in the requested format.
    #[error("unsupported operation: {message}")]
    UnsupportedOperation {
        /// Why the value was refused.
        message: String,
    },

    /// The underlying stream failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl CodecError {
    /// Creates a damaged entry error.
    pub fn damaged(message: impl Into<String>) -> Self {
        Self::Damaged {
            message: message.into(),
        }
    }

    /// Creates an invalid header error.
    pub fn invalid_header(message: impl Into<String>) -> Self {
        Self::InvalidHeader {
            message: message.into(),
        }
    }

    /// Creates an unsupported operation error.
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::UnsupportedOperation {
            message: message.into(),
        }
    }
}
