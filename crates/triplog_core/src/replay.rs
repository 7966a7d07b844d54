//! Transaction-level replay.

use crate::error::{JournalError, JournalResult};
use crate::reader::{JournalEvent, JournalReader};
use tracing::info;
use triplog_codec::{Transaction, TransactionFormat};

/// Counters gathered by [`replay`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayStats {
    /// Transactions handed to the callback.
    pub transactions: u64,
    /// How many of those were ontology transactions.
    pub ontology_transactions: u64,
    /// Entries across all transactions.
    pub entries: u64,
}

/// Replays every verified transaction from `reader`.
///
/// Each transaction is collected in full and passed to `apply` only once
/// its end has been read and verified, so a torn or damaged transaction is
/// never partially applied.
///
/// # Errors
///
/// Returns the first reader error, or the callback's error. On damage the
/// reader's [`size_of_correct`](JournalReader::size_of_correct) tells the
/// caller where to truncate.
pub fn replay<F>(reader: &mut JournalReader, mut apply: F) -> JournalResult<ReplayStats>
where
    F: FnMut(Transaction) -> JournalResult<()>,
{
    let mut stats = ReplayStats::default();
    let mut pending: Option<Transaction> = None;

    for event in reader.events() {
        match event? {
            JournalEvent::StartTransaction { timestamp, format } => {
                pending = Some(Transaction::new(timestamp, format));
            }
            JournalEvent::Entry(entry) => {
                let Some(txn) = pending.as_mut() else {
                    return Err(JournalError::invalid_operation(
                        "entry outside of a transaction",
                    ));
                };
                txn.entries.push(entry);
            }
            JournalEvent::EndTransaction => {
                let Some(txn) = pending.take() else {
                    return Err(JournalError::invalid_operation(
                        "transaction end without a start",
                    ));
                };
                stats.transactions += 1;
                stats.entries += txn.entries.len() as u64;
                if txn.format == TransactionFormat::Ontology {
                    stats.ontology_transactions += 1;
                }
                apply(txn)?;
            }
        }
    }

    info!(
        transactions = stats.transactions,
        entries = stats.entries,
        "journal replay finished"
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::JournalWriter;
    use std::fs;
    use tempfile::tempdir;
    use triplog_codec::{JournalEntry, StatementOp};

    #[test]
    fn replay_collects_whole_transactions() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("journal");
        let mut writer = JournalWriter::open(&path, false).unwrap();

        writer.start_transaction(10, TransactionFormat::Data).unwrap();
        writer.append_resource(1, "http://a").unwrap();
        writer.append_delete_statement(Some(5), 1, 2, "old").unwrap();
        writer.commit_transaction().unwrap();
        writer.start_ontology_transaction(11).unwrap();
        writer.commit_transaction().unwrap();

        let mut reader = JournalReader::open(&path).unwrap();
        let mut seen = Vec::new();
        let stats = replay(&mut reader, |txn| {
            seen.push(txn);
            Ok(())
        })
        .unwrap();

        assert_eq!(
            stats,
            ReplayStats {
                transactions: 2,
                ontology_transactions: 1,
                entries: 2,
            }
        );
        assert_eq!(seen[0].timestamp, 10);
        assert_eq!(
            seen[0].entries,
            vec![
                JournalEntry::resource(1, "http://a"),
                JournalEntry::statement(StatementOp::Delete, Some(5), 1, 2, "old"),
            ]
        );
        assert_eq!(seen[1].format, TransactionFormat::Ontology);
    }

    #[test]
    fn torn_transaction_is_not_applied() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("journal");
        let mut writer = JournalWriter::open(&path, false).unwrap();
        for ts in [1, 2] {
            writer.start_transaction(ts, TransactionFormat::Data).unwrap();
            writer.append_resource(ts, "http://r").unwrap();
            writer.commit_transaction().unwrap();
        }
        let first_end = {
            let bytes = fs::read(&path).unwrap();
            8 + u64::from(u32::from_be_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]))
        };
        let len = writer.size();
        drop(writer);
        fs::OpenOptions::new()
            .write(true)
            .open(&path)
            .unwrap()
            .set_len(len - 2)
            .unwrap();

        let mut reader = JournalReader::open(&path).unwrap();
        let mut applied = 0;
        let error = replay(&mut reader, |_| {
            applied += 1;
            Ok(())
        })
        .unwrap_err();

        assert!(error.is_damaged());
        assert_eq!(applied, 1);
        assert_eq!(reader.size_of_correct(), first_end);
    }

    #[test]
    fn callback_can_abort() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("journal");
        let mut writer = JournalWriter::open(&path, false).unwrap();
        writer.start_transaction(1, TransactionFormat::Data).unwrap();
        writer.commit_transaction().unwrap();

        let mut reader = JournalReader::open(&path).unwrap();
        let result = replay(&mut reader, |_| Err(JournalError::replay_aborted("stop")));
        assert!(matches!(result, Err(JournalError::ReplayAborted { .. })));
    }
}
