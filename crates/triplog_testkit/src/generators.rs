//! Property-based test generators using proptest.
//!
//! Every generated value can be written to a journal of the requested
//! version: strings contain no NUL byte, and format 03 never gets updates.

use proptest::prelude::*;
use triplog_core::{
    FormatVersion, JournalEntry, StatementOp, StringOrId, Transaction, TransactionFormat,
};

/// Strategy for resource URIs.
pub fn uri_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z]{1,8}://[a-zA-Z0-9./_-]{0,40}").expect("Invalid regex")
}

/// Strategy for string objects: any Unicode text without NUL.
pub fn object_text_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[^\\x00]{0,64}").expect("Invalid regex")
}

/// Strategy for statement objects.
pub fn object_strategy() -> impl Strategy<Value = StringOrId> {
    prop_oneof![
        object_text_strategy().prop_map(StringOrId::Str),
        any::<u32>().prop_map(StringOrId::Id),
    ]
}

/// Strategy for statement operations allowed in `version`.
pub fn statement_op_strategy(version: FormatVersion) -> BoxedStrategy<StatementOp> {
    if version.supports_update() {
        prop_oneof![
            Just(StatementOp::Insert),
            Just(StatementOp::Delete),
            Just(StatementOp::Update),
        ]
        .boxed()
    } else {
        prop_oneof![Just(StatementOp::Insert), Just(StatementOp::Delete)].boxed()
    }
}

/// Strategy for entries writable to a file of `version`.
pub fn entry_strategy(version: FormatVersion) -> impl Strategy<Value = JournalEntry> {
    prop_oneof![
        1 => (any::<u32>(), uri_strategy())
            .prop_map(|(id, uri)| JournalEntry::resource(id, uri)),
        3 => (
            statement_op_strategy(version),
            prop::option::of(any::<u32>()),
            any::<u32>(),
            any::<u32>(),
            object_strategy(),
        )
            .prop_map(|(op, graph, subject, predicate, object)| {
                JournalEntry::statement(op, graph, subject, predicate, object)
            }),
    ]
}

/// Strategy for data transactions with up to `max_entries` entries.
pub fn data_transaction_strategy(
    version: FormatVersion,
    max_entries: usize,
) -> impl Strategy<Value = Transaction> {
    (
        any::<u32>(),
        prop::collection::vec(entry_strategy(version), 0..=max_entries),
    )
        .prop_map(|(timestamp, entries)| Transaction {
            timestamp,
            format: TransactionFormat::Data,
            entries,
        })
}

/// Strategy for a journal's worth of data transactions.
pub fn transactions_strategy(
    version: FormatVersion,
    max_transactions: usize,
) -> impl Strategy<Value = Vec<Transaction>> {
    prop::collection::vec(data_transaction_strategy(version, 8), 1..=max_transactions)
}

/// Case counts for journal property tests.
///
/// Each case writes and reads real files, so the defaults are lower than
/// proptest's own.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 64,
            max_shrink_iters: 256,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 16,
            max_shrink_iters: 64,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}
