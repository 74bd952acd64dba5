//! Throughput Benchmark for mcached
//!
//! Measures the entry store and the per-line command path under a few
//! workloads.

use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use mcached::commands::{CommandHandler, Session};
use mcached::stats::Stats;
use mcached::storage::{ArithOp, Expiry, StorageEngine};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Stores `value` under `key` through the reserve/fill pair a SET performs.
fn store(engine: &StorageEngine, key: Bytes, expiry: Expiry, value: &[u8]) {
    let r = engine.set(key.clone(), 0, expiry, value.len());
    engine.fill_payload(&key, r.generation, value);
}

/// Benchmark SET operations
fn bench_set(c: &mut Criterion) {
    let engine = Arc::new(StorageEngine::new());

    let mut group = c.benchmark_group("set");
    group.throughput(Throughput::Elements(1));

    group.bench_function("set_small", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = Bytes::from(format!("key:{}", i));
            store(&engine, key, Expiry::Never, b"small_value");
            i += 1;
        });
    });

    group.bench_function("set_medium", |b| {
        let mut i = 0u64;
        let value = "x".repeat(1024); // 1KB value
        b.iter(|| {
            let key = Bytes::from(format!("key:{}", i));
            store(&engine, key, Expiry::Never, value.as_bytes());
            i += 1;
        });
    });

    group.bench_function("set_with_ttl", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = Bytes::from(format!("ttl:{}", i));
            store(&engine, key, Expiry::After(Duration::from_secs(3600)), b"value");
            i += 1;
        });
    });

    group.finish();
}

/// Benchmark GET operations
fn bench_get(c: &mut Criterion) {
    let engine = Arc::new(StorageEngine::new());

    for i in 0..100_000 {
        let key = Bytes::from(format!("key:{}", i));
        store(&engine, key, Expiry::Never, format!("value:{}", i).as_bytes());
    }

    let mut group = c.benchmark_group("get");
    group.throughput(Throughput::Elements(1));

    group.bench_function("get_existing", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = format!("key:{}", i % 100_000);
            black_box(engine.get(key.as_bytes()));
            i += 1;
        });
    });

    group.bench_function("get_missing", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = format!("missing:{}", i);
            black_box(engine.get(key.as_bytes()));
            i += 1;
        });
    });

    group.finish();
}

/// Benchmark INCR operations
fn bench_incr(c: &mut Criterion) {
    let engine = Arc::new(StorageEngine::new());
    store(&engine, Bytes::from("counter"), Expiry::Never, b"0");
    for i in 0..1000 {
        store(&engine, Bytes::from(format!("counter:{}", i)), Expiry::Never, b"0");
    }

    let mut group = c.benchmark_group("incr");
    group.throughput(Throughput::Elements(1));

    // Single counter (high contention)
    group.bench_function("single_counter", |b| {
        b.iter(|| {
            black_box(engine.incr_decr(b"counter", 1, ArithOp::Incr));
        });
    });

    group.bench_function("multiple_counters", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = format!("counter:{}", i % 1000);
            black_box(engine.incr_decr(key.as_bytes(), 1, ArithOp::Incr));
            i += 1;
        });
    });

    group.finish();
}

/// Benchmark concurrent access
fn bench_concurrent(c: &mut Criterion) {
    use std::thread;

    let mut group = c.benchmark_group("concurrent");
    group.measurement_time(Duration::from_secs(10));

    group.bench_function("4_threads_mixed", |b| {
        b.iter(|| {
            let engine = Arc::new(StorageEngine::new());
            let handles: Vec<_> = (0..4)
                .map(|t| {
                    let engine = Arc::clone(&engine);
                    thread::spawn(move || {
                        for i in 0..10_000 {
                            let key = Bytes::from(format!("key:{}:{}", t, i));
                            store(&engine, key.clone(), Expiry::Never, b"value");
                            engine.get(&key);
                        }
                    })
                })
                .collect();

            for handle in handles {
                handle.join().unwrap();
            }

            black_box(engine.len());
        });
    });

    group.finish();
}

/// Benchmark a bounded sweep over a store full of expired entries
fn bench_sweep(c: &mut Criterion) {
    let mut group = c.benchmark_group("sweep");

    group.bench_function("sweep_1024_expired", |b| {
        b.iter_with_setup(
            || {
                let engine = StorageEngine::new();
                for i in 0..4096 {
                    let key = Bytes::from(format!("key:{}", i));
                    store(&engine, key, Expiry::After(Duration::ZERO), b"value");
                }
                engine
            },
            |engine| black_box(engine.sweep(Instant::now(), 1024)),
        );
    });

    group.finish();
}

/// Benchmark the full per-line command path
fn bench_command_path(c: &mut Criterion) {
    let handler = CommandHandler::new(Arc::new(StorageEngine::new()), Arc::new(Stats::new()));

    let mut group = c.benchmark_group("commands");
    group.throughput(Throughput::Elements(1));

    group.bench_function("set_then_get", |b| {
        let mut session = Session::new();
        b.iter(|| {
            black_box(handler.execute(&mut session, b"set key 0 0 5").ok());
            black_box(handler.execute(&mut session, b"value").ok());
            black_box(handler.execute(&mut session, b"get key").ok());
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_set,
    bench_get,
    bench_incr,
    bench_concurrent,
    bench_sweep,
    bench_command_path,
);

criterion_main!(benches);
