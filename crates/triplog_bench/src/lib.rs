//! Benchmark utilities.

use rand::distributions::Alphanumeric;
use rand::Rng;
use triplog_codec::{JournalEntry, StatementOp, StringOrId, Transaction, TransactionFormat};

/// Generate a random alphanumeric string of the specified length.
pub fn random_text(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Generate a statement insert with a string object of `object_len` bytes.
pub fn random_statement(object_len: usize) -> JournalEntry {
    let mut rng = rand::thread_rng();
    let graph = if rng.gen_bool(0.25) {
        Some(rng.gen())
    } else {
        None
    };
    JournalEntry::statement(
        StatementOp::Insert,
        graph,
        rng.gen(),
        rng.gen(),
        StringOrId::Str(random_text(object_len)),
    )
}

/// Generate a mixed batch of entries: one resource for every four statements.
pub fn generate_entries(count: usize, object_len: usize) -> Vec<JournalEntry> {
    let mut rng = rand::thread_rng();
    (0..count)
        .map(|i| {
            if i % 5 == 0 {
                let uri = format!("http://example.com/{}", random_text(24));
                JournalEntry::resource(rng.gen(), uri)
            } else if rng.gen_bool(0.5) {
                JournalEntry::statement(
                    StatementOp::Insert,
                    None,
                    rng.gen(),
                    rng.gen(),
                    StringOrId::Id(rng.gen()),
                )
            } else {
                random_statement(object_len)
            }
        })
        .collect()
}

/// Generate data transactions with `entries` entries each.
pub fn generate_transactions(count: usize, entries: usize) -> Vec<Transaction> {
    (0..count)
        .map(|i| Transaction {
            timestamp: i as u32,
            format: TransactionFormat::Data,
            entries: generate_entries(entries, 32),
        })
        .collect()
}
