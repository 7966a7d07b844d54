//! Write-then-replay integration tests.

use proptest::prelude::*;
use std::fs;
use triplog_core::{
    replay, EntryType, FormatVersion, JournalConfig, JournalError, JournalEvent, JournalReader,
    TransactionFormat,
};
use triplog_testkit::prelude::*;

#[test]
fn scenario_replays_in_order() {
    let journal = TestJournal::new();
    let mut writer = journal.writer();
    writer.start_transaction(1000, TransactionFormat::Data).unwrap();
    writer.append_resource(1, "http://example.com/res1").unwrap();
    writer.append_insert_statement(None, 1, 2, "hello").unwrap();
    writer.commit_transaction().unwrap();

    let mut reader = journal.reader();

    assert!(reader.next().unwrap());
    assert_eq!(reader.entry_type(), EntryType::StartTransaction);
    assert_eq!(reader.timestamp(), 1000);

    assert!(reader.next().unwrap());
    assert_eq!(
        reader.get_resource().unwrap(),
        (1, "http://example.com/res1")
    );

    assert!(reader.next().unwrap());
    assert_eq!(reader.entry_type(), EntryType::InsertStatement);
    assert_eq!(reader.get_statement().unwrap(), (None, 1, 2, "hello"));

    assert!(reader.next().unwrap());
    assert_eq!(reader.entry_type(), EntryType::EndTransaction);
    assert!(!reader.next().unwrap());
}

#[test]
fn scenario_matches_golden_bytes() {
    let journal = TestJournal::new();
    let mut writer = journal.writer();
    write_transaction(&mut writer, &scenario_transaction()).unwrap();
    writer.close().unwrap();

    let mut expected = b"trlog\x0004".to_vec();
    expected.extend_from_slice(&scenario_transaction_bytes());
    assert_bytes_eq(&fs::read(journal.active_path()).unwrap(), &expected);
}

#[test]
fn golden_bytes_replay() {
    let journal = TestJournal::new();
    let mut bytes = b"trlog\x0004".to_vec();
    bytes.extend_from_slice(&scenario_transaction_bytes());
    fs::write(journal.active_path(), &bytes).unwrap();

    let events = collect_events(&mut journal.reader()).unwrap();
    assert_eq!(events, transaction_events(&scenario_transaction()));
}

#[test]
fn legacy_file_replays_and_refuses_updates() {
    let journal =
        TestJournal::with_config(JournalConfig::new().format_version(FormatVersion::V03));
    let mut writer = journal.writer();
    assert_eq!(writer.version(), FormatVersion::V03);

    writer.start_transaction(1, TransactionFormat::Data).unwrap();
    writer.append_delete_statement(Some(4), 1, 2, "gone").unwrap();
    assert!(matches!(
        writer.append_update_statement_id(None, 1, 2, 3),
        Err(JournalError::Unsupported { .. })
    ));
    writer.commit_transaction().unwrap();
    writer.close().unwrap();

    assert_eq!(&fs::read(journal.active_path()).unwrap()[..8], b"trlog\x0003");

    let mut reader = journal.reader();
    assert_eq!(reader.version(), FormatVersion::V03);
    let events = collect_events(&mut reader).unwrap();
    assert_eq!(events.len(), 3);
}

#[test]
fn reopened_writer_appends() {
    let journal = TestJournal::new();
    let txn = scenario_transaction();

    for _ in 0..3 {
        let mut writer = journal.writer();
        write_transaction(&mut writer, &txn).unwrap();
        writer.close().unwrap();
    }

    let mut reader = journal.reader();
    let events = collect_events(&mut reader).unwrap();
    assert_eq!(events.len(), 3 * transaction_events(&txn).len());
    assert_eq!(
        reader.size_of_correct(),
        fs::metadata(journal.active_path()).unwrap().len()
    );
}

#[test]
fn replay_helper_counts_transactions() {
    let journal = TestJournal::new();
    let mut writer = journal.writer();
    write_transaction(&mut writer, &scenario_transaction()).unwrap();
    writer.start_ontology_transaction(2000).unwrap();
    writer.commit_transaction().unwrap();

    let mut applied = Vec::new();
    let stats = replay(&mut journal.reader(), |txn| {
        applied.push(txn);
        Ok(())
    })
    .unwrap();

    assert_eq!(stats.transactions, 2);
    assert_eq!(stats.ontology_transactions, 1);
    assert_eq!(stats.entries, 2);
    assert_eq!(applied[0], scenario_transaction());
}

proptest! {
    #![proptest_config(PropTestConfig::default().to_proptest_config())]

    #[test]
    fn appended_entries_replay_in_order(txn in data_transaction_strategy(FormatVersion::V04, 32)) {
        let journal = TestJournal::new();
        let mut writer = journal.writer();
        write_transaction(&mut writer, &txn).unwrap();

        let events = collect_events(&mut journal.reader()).unwrap();
        prop_assert_eq!(events.len(), txn.entries.len() + 2);
        prop_assert_eq!(events, transaction_events(&txn));
    }

    #[test]
    fn legacy_entries_replay_in_order(txn in data_transaction_strategy(FormatVersion::V03, 16)) {
        let journal =
            TestJournal::with_config(JournalConfig::new().format_version(FormatVersion::V03));
        let mut writer = journal.writer();
        write_transaction(&mut writer, &txn).unwrap();

        let events = collect_events(&mut journal.reader()).unwrap();
        prop_assert_eq!(events, transaction_events(&txn));
    }

    #[test]
    fn replay_is_idempotent(txns in transactions_strategy(FormatVersion::V04, 6)) {
        let journal = TestJournal::new();
        let mut writer = journal.writer();
        for txn in &txns {
            write_transaction(&mut writer, txn).unwrap();
        }
        writer.close().unwrap();

        let first = collect_events(&mut journal.reader()).unwrap();
        let second = collect_events(&mut JournalReader::open(journal.active_path()).unwrap())
            .unwrap();

        let expected: Vec<JournalEvent> = txns.iter().flat_map(transaction_events).collect();
        prop_assert_eq!(&first, &expected);
        prop_assert_eq!(first, second);
    }
}
