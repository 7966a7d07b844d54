//! Journal writer and replay benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::fs;
use tempfile::TempDir;
use triplog_bench::generate_transactions;
use triplog_core::{replay, JournalReader, JournalWriter, Transaction, DATA_JOURNAL_FILE};

fn write_all(writer: &mut JournalWriter, txns: &[Transaction]) {
    for txn in txns {
        writer.start_transaction(txn.timestamp, txn.format).unwrap();
        for entry in &txn.entries {
            writer.append_entry(entry).unwrap();
        }
        writer.commit_transaction().unwrap();
    }
}

/// Benchmark committing transactions of increasing size.
fn bench_commit(c: &mut Criterion) {
    let mut group = c.benchmark_group("commit");

    for entries in [1, 16, 128] {
        let txns = generate_transactions(1, entries);
        let temp_dir = TempDir::new().unwrap();
        let mut writer =
            JournalWriter::open(temp_dir.path().join(DATA_JOURNAL_FILE), true).unwrap();

        write_all(&mut writer, &txns);
        group.throughput(Throughput::Bytes(writer.size() - 8));

        group.bench_with_input(BenchmarkId::from_parameter(entries), &txns, |b, txns| {
            b.iter(|| write_all(&mut writer, black_box(txns)));
        });
    }

    group.finish();
}

/// Benchmark commit followed by fsync.
fn bench_commit_durable(c: &mut Criterion) {
    let mut group = c.benchmark_group("commit_durable");
    group.sample_size(20);

    let txns = generate_transactions(1, 16);
    let temp_dir = TempDir::new().unwrap();
    let mut writer = JournalWriter::open(temp_dir.path().join(DATA_JOURNAL_FILE), true).unwrap();

    group.bench_function("16_entries", |b| {
        b.iter(|| {
            write_all(&mut writer, black_box(&txns));
            writer.fsync().unwrap();
        });
    });

    group.finish();
}

/// Benchmark replaying a whole journal file.
fn bench_replay(c: &mut Criterion) {
    let mut group = c.benchmark_group("replay");
    group.sample_size(20);

    for count in [100, 1000] {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(DATA_JOURNAL_FILE);
        let mut writer = JournalWriter::open(&path, true).unwrap();
        write_all(&mut writer, &generate_transactions(count, 16));
        writer.close().unwrap();

        let len = fs::metadata(&path).unwrap().len();
        group.throughput(Throughput::Bytes(len));
        group.bench_with_input(BenchmarkId::from_parameter(count), &path, |b, path| {
            b.iter(|| {
                let mut reader = JournalReader::open(path).unwrap();
                let stats = replay(&mut reader, |txn| {
                    black_box(txn);
                    Ok(())
                })
                .unwrap();
                black_box(stats);
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_commit, bench_commit_durable, bench_replay);
criterion_main!(benches);
