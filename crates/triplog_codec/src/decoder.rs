//! Entry decoder.

use crate::entry::{DataFlags, JournalEntry, Statement, StatementOp, StringOrId};
use crate::error::{CodecError, CodecResult};
use crate::format::{FormatVersion, WORD_SIZE};
use crate::source::ByteSource;

/// First window scanned for a string terminator; doubled until found.
const STRING_WINDOW: usize = 64;

/// Reads one big-endian word.
///
/// # Errors
///
/// Returns [`CodecError::Damaged`] if fewer than 4 bytes remain.
pub fn read_u32<S: ByteSource + ?Sized>(source: &mut S) -> CodecResult<u32> {
    let bytes = source.peek(WORD_SIZE)?;
    if bytes.len() < WORD_SIZE {
        return Err(CodecError::damaged(format!(
            "truncated word: {} of {WORD_SIZE} bytes available",
            bytes.len()
        )));
    }
    let word = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    source.advance(WORD_SIZE);
    Ok(word)
}

/// Reads a NUL-terminated UTF-8 string.
///
/// # Errors
///
/// Returns [`CodecError::Damaged`] if no terminator is found before the end
/// of the readable bytes, or if the bytes are not valid UTF-8.
pub fn read_cstring<S: ByteSource + ?Sized>(source: &mut S) -> CodecResult<String> {
    let mut window = STRING_WINDOW;
    let mut checked = 0;

    loop {
        let bytes = source.peek(window)?;
        if let Some(offset) = bytes[checked..].iter().position(|&b| b == 0) {
            let len = checked + offset;
            let text = std::str::from_utf8(&bytes[..len])
                .map_err(|e| CodecError::damaged(format!("invalid UTF-8: {e}")))?
                .to_owned();
            source.advance(len + 1);
            return Ok(text);
        }

        if bytes.len() < window {
            return Err(CodecError::damaged("no terminating NUL found"));
        }
        checked = bytes.len();
        window = window.saturating_mul(2);
    }
}

/// Decodes one entry from a file of the given version.
///
/// # Errors
///
/// Returns [`CodecError::Damaged`] for invalid flags, truncated words,
/// unterminated strings or invalid UTF-8.
pub fn decode_entry<S: ByteSource + ?Sized>(
    source: &mut S,
    version: FormatVersion,
) -> CodecResult<JournalEntry> {
    let flags = DataFlags::from_bits(read_u32(source)?, version)?;

    if flags == DataFlags::RESOURCE_INSERT {
        let subject_id = read_u32(source)?;
        let uri = read_cstring(source)?;
        return Ok(JournalEntry::Resource { subject_id, uri });
    }

    let graph_id = if flags.contains(DataFlags::GRAPH) {
        Some(read_u32(source)?)
    } else {
        None
    };
    let subject_id = read_u32(source)?;
    let predicate_id = read_u32(source)?;
    let object = if flags.contains(DataFlags::OBJECT_ID) {
        StringOrId::Id(read_u32(source)?)
    } else {
        StringOrId::Str(read_cstring(source)?)
    };
    let op = if flags.contains(DataFlags::DELETE) {
        StatementOp::Delete
    } else if flags.contains(DataFlags::UPDATE) {
        StatementOp::Update
    } else {
        StatementOp::Insert
    };

    Ok(JournalEntry::Statement(Statement {
        graph_id,
        subject_id,
        predicate_id,
        object,
        op,
    }))
}
