//! Tail verification.
//!
//! A crash can leave at most one torn transaction, and only at the end of
//! the active file. Checking that last transaction is enough to decide at
//! startup whether the journal needs repair, without scanning the file.

use crate::error::{JournalError, JournalResult};
use crate::layout::DATA_JOURNAL_FILE;
use crate::reader::{EntryType, JournalReader};
use std::fs;
use std::path::Path;
use tracing::warn;

/// Returns whether the data journal in `journal_dir` ends with an intact
/// transaction, or holds no transactions at all.
///
/// A missing or unreadable journal is reported as not intact.
#[must_use]
pub fn verify_last(journal_dir: &Path) -> bool {
    let path = journal_dir.join(DATA_JOURNAL_FILE);
    match verify_last_transaction(&path) {
        Ok(()) => true,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "journal tail verification failed");
            false
        }
    }
}

/// Decodes the last transaction of the journal file at `path`.
///
/// The final word of the file gives the size of the last transaction; the
/// transaction at that distance from the end must decode completely and
/// pass its checksum.
///
/// # Errors
///
/// Returns [`JournalError::DamagedJournalEntry`] if the last transaction is
/// inconsistent, or the errors of [`JournalReader::open`].
pub fn verify_last_transaction(path: &Path) -> JournalResult<()> {
    let mut reader = JournalReader::open(path)?;
    if !reader.seek_to_last_transaction()? {
        return Ok(());
    }

    let begin = reader.size_of_correct();
    loop {
        if !reader.next()? {
            return Err(JournalError::damaged(
                path,
                begin,
                "file ends inside the last transaction",
            ));
        }
        if reader.entry_type() == EntryType::EndTransaction {
            break;
        }
    }

    let end = reader.size_of_correct();
    let len = fs::metadata(path)
        .map_err(|e| JournalError::open(path, e))?
        .len();
    if end != len {
        return Err(JournalError::damaged(
            path,
            begin,
            format!("last transaction ends at {end}, the file has {len} bytes"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::JournalWriter;
    use tempfile::tempdir;
    use triplog_codec::TransactionFormat;

    fn write_two(dir: &Path) -> std::path::PathBuf {
        let path = dir.join(DATA_JOURNAL_FILE);
        let mut writer = JournalWriter::open(&path, false).unwrap();
        for ts in [1, 2] {
            writer.start_transaction(ts, TransactionFormat::Data).unwrap();
            writer.append_resource(ts, "http://example.com/r").unwrap();
            writer.append_insert_statement_id(None, ts, 2, 3).unwrap();
            writer.commit_transaction().unwrap();
        }
        path
    }

    #[test]
    fn intact_tail_verifies() {
        let dir = tempdir().unwrap();
        write_two(dir.path());
        assert!(verify_last(dir.path()));
    }

    #[test]
    fn header_only_file_verifies() {
        let dir = tempdir().unwrap();
        JournalWriter::open(dir.path().join(DATA_JOURNAL_FILE), false).unwrap();
        assert!(verify_last(dir.path()));
    }

    #[test]
    fn missing_journal_does_not_verify() {
        let dir = tempdir().unwrap();
        assert!(!verify_last(dir.path()));
    }

    #[test]
    fn damage_before_tail_is_not_scanned() {
        let dir = tempdir().unwrap();
        let path = write_two(dir.path());

        let mut bytes = fs::read(&path).unwrap();
        bytes[8 + 20] ^= 0xFF;
        fs::write(&path, &bytes).unwrap();

        assert!(verify_last(dir.path()));
    }

    #[test]
    fn damaged_tail_fails() {
        let dir = tempdir().unwrap();
        let path = write_two(dir.path());
        let original = fs::read(&path).unwrap();

        let mut crc = original.clone();
        let len = crc.len();
        crc[len - 6] ^= 0x01;
        fs::write(&path, &crc).unwrap();
        assert!(verify_last_transaction(&path).unwrap_err().is_damaged());

        let mut footer = original.clone();
        footer[len - 1] = footer[len - 1].wrapping_add(4);
        fs::write(&path, &footer).unwrap();
        assert!(!verify_last(dir.path()));

        fs::write(&path, &original[..len - 3]).unwrap();
        assert!(!verify_last(dir.path()));
    }

    #[test]
    fn oversized_tail_word_fails() {
        let dir = tempdir().unwrap();
        let path = write_two(dir.path());

        let mut bytes = fs::read(&path).unwrap();
        let len = bytes.len();
        bytes[len - 4..].copy_from_slice(&u32::MAX.to_be_bytes());
        fs::write(&path, &bytes).unwrap();

        assert!(verify_last_transaction(&path).unwrap_err().is_damaged());
    }
}
