//! Benchmarks for snapshot capture and undo/redo transitions.
//!
//! Measures the cost of a stored capture (serialize, digest, gzip), a
//! duplicate capture (serialize and digest only) and an undo/redo pair
//! (decompress and restore) across document sizes and gzip levels.
//!
//! Run with: cargo bench -p rewind --bench capture_bench

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;

use rewind::{HistoryConfig, JsonCodec, Passthrough, SnapshotHistory};
use rewind_harness::Graph;

// ============================================================================
// Setup helpers
// ============================================================================

/// A graph with `n` nodes chained by links.
fn graph(n: usize) -> Graph {
    let mut g = Graph::new();
    let mut prev = None;
    for i in 0..n {
        let id = g.add_node("op", (i as i32 * 10, (i % 7) as i32));
        if let Some(p) = prev {
            g.connect(p, id);
        }
        prev = Some(id);
    }
    g
}

const SIZES: [usize; 3] = [10, 100, 1000];

// ============================================================================
// Benchmarks
// ============================================================================

fn bench_stored_capture(c: &mut Criterion) {
    let mut group = c.benchmark_group("capture/stored");
    for n in SIZES {
        let base = graph(n);
        group.throughput(Throughput::Bytes(base.serialized().len() as u64));
        for level in [1u32, 6] {
            group.bench_with_input(
                BenchmarkId::new(format!("gzip{level}"), n),
                &base,
                |b, base| {
                    let config = HistoryConfig::new(64).with_compression_level(level);
                    let mut history = SnapshotHistory::new(JsonCodec, config).unwrap();
                    let mut doc = base.clone();
                    let mut step = 0i32;
                    b.iter(|| {
                        step += 1;
                        doc.move_node(0, step, 0);
                        black_box(history.capture(&doc).unwrap())
                    });
                },
            );
        }
        group.bench_with_input(BenchmarkId::new("passthrough", n), &base, |b, base| {
            let mut history =
                SnapshotHistory::with_compressor(JsonCodec, Passthrough, HistoryConfig::new(64))
                    .unwrap();
            let mut doc = base.clone();
            let mut step = 0i32;
            b.iter(|| {
                step += 1;
                doc.move_node(0, step, 0);
                black_box(history.capture(&doc).unwrap())
            });
        });
    }
    group.finish();
}

fn bench_duplicate_capture(c: &mut Criterion) {
    let mut group = c.benchmark_group("capture/duplicate");
    for n in SIZES {
        let doc = graph(n);
        let mut history = SnapshotHistory::new(JsonCodec, HistoryConfig::default()).unwrap();
        history.capture(&doc).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(n), &doc, |b, doc| {
            b.iter(|| black_box(history.capture(doc).unwrap()));
        });
    }
    group.finish();
}

fn bench_undo_redo(c: &mut Criterion) {
    let mut group = c.benchmark_group("transition/undo_redo");
    for n in SIZES {
        let mut doc = graph(n);
        let mut history = SnapshotHistory::new(JsonCodec, HistoryConfig::default()).unwrap();
        history.capture(&doc).unwrap();
        doc.move_node(0, 1, 1);
        history.capture(&doc).unwrap();

        group.bench_function(BenchmarkId::from_parameter(n), |b| {
            b.iter(|| {
                black_box(history.undo(&mut doc).unwrap());
                black_box(history.redo(&mut doc).unwrap());
            });
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_stored_capture,
    bench_duplicate_capture,
    bench_undo_redo
);
criterion_main!(benches);
