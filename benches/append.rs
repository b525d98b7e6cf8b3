//! Benchmarks for mapped append throughput.

use criterion::{criterion_group, criterion_main, Criterion};
use memlog::{MappedWriter, SizeRotatingWriter};
use std::hint::black_box;
use tempfile::TempDir;

/// Sequential appends into a preallocated mapping (the hot path: one
/// memcpy, no syscalls).
fn bench_mapped_append(c: &mut Criterion) {
    let mut group = c.benchmark_group("mapped_append");

    for size in [64, 256, 1024, 4096] {
        group.bench_function(format!("{size}B"), |b| {
            let dir = TempDir::new().unwrap();
            let path = dir.path().join("bench.log");
            let mut writer = MappedWriter::create(&path, 64 * 1024 * 1024, true).unwrap();
            let record = vec![0x55u8; size];

            b.iter(|| {
                if writer.remaining() < record.len() {
                    writer.open(&path, 64 * 1024 * 1024, true).unwrap();
                }
                writer.append(black_box(&record)).unwrap();
            });
        });
    }

    group.finish();
}

/// Appends through the size-rotating writer, including the occasional
/// close/shift/reopen cycle.
fn bench_rotating_append(c: &mut Criterion) {
    c.bench_function("rotating_append_64B", |b| {
        let dir = TempDir::new().unwrap();
        let base = dir.path().join("bench.log");
        let mut writer = SizeRotatingWriter::new(&base, 8 * 1024 * 1024, 2).unwrap();
        let record = [0x55u8; 64];

        b.iter(|| writer.append(black_box(&record)).unwrap());
    });
}

criterion_group!(benches, bench_mapped_append, bench_rotating_append);
criterion_main!(benches);
