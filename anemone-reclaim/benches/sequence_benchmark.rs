//! Benchmark for the grace-reclaimed sorted sequence:
//! - lock-free snapshot publication vs. a coarse-locked sorted Vec
//!
//! Run with: cargo bench --package anemone-reclaim --bench sequence_benchmark

use criterion::BenchmarkId;
use criterion::Criterion;
use criterion::black_box;
use criterion::criterion_group;
use criterion::criterion_main;
use mimalloc::MiMalloc;
use std::sync::{Arc, Mutex};
use std::thread;

use anemone_reclaim::GraceSequence;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

const OPS_PER_THREAD: usize = 2_000;

// ============================================================================
// Coarse-locked baseline
// ============================================================================

/// The structure the lock-free sequence replaces: one mutex around a sorted
/// Vec.
struct LockedSequence {
    values: Mutex<Vec<i32>>,
}

impl LockedSequence {
    fn new() -> Self {
        LockedSequence {
            values: Mutex::new(Vec::new()),
        }
    }

    fn insert(&self, value: i32) {
        let mut values = self.values.lock().unwrap();
        let at = values.partition_point(|&existing| existing < value);
        values.insert(at, value);
    }

    fn read(&self, pos: usize) -> i32 {
        self.values.lock().unwrap()[pos]
    }
}

// ============================================================================
// Insert-only benchmarks
// ============================================================================

fn bench_sequence_insert(thread_count: usize, ops_per_thread: usize) {
    let seq = Arc::new(GraceSequence::new());
    let mut handles = vec![];

    for t in 0..thread_count {
        let seq_clone = Arc::clone(&seq);
        let handle = thread::spawn(move || {
            let base = (t * ops_per_thread) as i32;
            for i in 0..ops_per_thread {
                seq_clone.insert(base + i as i32);
            }
        });
        handles.push(handle);
    }

    for handle in handles {
        handle.join().unwrap();
    }
}

fn bench_locked_insert(thread_count: usize, ops_per_thread: usize) {
    let seq = Arc::new(LockedSequence::new());
    let mut handles = vec![];

    for t in 0..thread_count {
        let seq_clone = Arc::clone(&seq);
        let handle = thread::spawn(move || {
            let base = (t * ops_per_thread) as i32;
            for i in 0..ops_per_thread {
                seq_clone.insert(base + i as i32);
            }
        });
        handles.push(handle);
    }

    for handle in handles {
        handle.join().unwrap();
    }
}

// ============================================================================
// Read-dominated benchmarks (one writer, many readers)
// ============================================================================

fn bench_sequence_read_heavy(reader_count: usize, reads_per_thread: usize) {
    let seq = Arc::new(GraceSequence::new());
    for i in 0..1_000 {
        seq.insert(i);
    }

    let mut handles = vec![];

    let writer_seq = Arc::clone(&seq);
    handles.push(thread::spawn(move || {
        for i in 0..500 {
            writer_seq.insert(1_000 + i);
        }
    }));

    for _ in 0..reader_count {
        let seq_clone = Arc::clone(&seq);
        handles.push(thread::spawn(move || {
            let mut acc = 0i64;
            for i in 0..reads_per_thread {
                acc += i64::from(seq_clone.read(i % 1_000));
            }
            black_box(acc)
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }
}

fn bench_locked_read_heavy(reader_count: usize, reads_per_thread: usize) {
    let seq = Arc::new(LockedSequence::new());
    for i in 0..1_000 {
        seq.insert(i);
    }

    let mut handles = vec![];

    let writer_seq = Arc::clone(&seq);
    handles.push(thread::spawn(move || {
        for i in 0..500 {
            writer_seq.insert(1_000 + i);
        }
    }));

    for _ in 0..reader_count {
        let seq_clone = Arc::clone(&seq);
        handles.push(thread::spawn(move || {
            let mut acc = 0i64;
            for i in 0..reads_per_thread {
                acc += i64::from(seq_clone.read(i % 1_000));
            }
            black_box(acc)
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }
}

// ============================================================================
// Benchmark groups
// ============================================================================

fn insert_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert_benchmark_sorted_sequence");
    group.sample_size(10);

    for threads in [1, 2, 4, 8] {
        group.bench_with_input(
            BenchmarkId::new("insert_benchmark_grace_sequence", threads),
            &threads,
            |b, &threads| {
                b.iter(|| bench_sequence_insert(black_box(threads), black_box(OPS_PER_THREAD)))
            },
        );

        group.bench_with_input(
            BenchmarkId::new("insert_benchmark_locked_vec", threads),
            &threads,
            |b, &threads| {
                b.iter(|| bench_locked_insert(black_box(threads), black_box(OPS_PER_THREAD)))
            },
        );
    }

    group.finish();
}

fn read_heavy_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("read_heavy_benchmark_sorted_sequence");
    group.sample_size(10);
    let reads_per_thread = 100_000;

    for readers in [1, 2, 4, 8, 16] {
        group.bench_with_input(
            BenchmarkId::new("read_heavy_benchmark_grace_sequence", readers),
            &readers,
            |b, &readers| {
                b.iter(|| bench_sequence_read_heavy(black_box(readers), black_box(reads_per_thread)))
            },
        );

        group.bench_with_input(
            BenchmarkId::new("read_heavy_benchmark_locked_vec", readers),
            &readers,
            |b, &readers| {
                b.iter(|| bench_locked_read_heavy(black_box(readers), black_box(reads_per_thread)))
            },
        );
    }

    group.finish();
}

criterion_group!(benches, insert_benchmark, read_heavy_benchmark);
criterion_main!(benches);
