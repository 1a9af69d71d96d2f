//! Throughput Benchmark for ttlkv
//!
//! Measures store operations on a temporary sled database.

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use std::time::Duration;
use ttlkv::Store;

fn store() -> Store {
    Store::temporary().expect("temporary store")
}

/// Benchmark XSET operations
fn bench_xset(c: &mut Criterion) {
    let store = store();

    let mut group = c.benchmark_group("xset");
    group.throughput(Throughput::Elements(1));

    group.bench_function("xset_small", |b| {
        let mut i = 0u64;
        b.iter(|| {
            store.xset(&format!("key:{}", i), "small_value").unwrap();
            i += 1;
        });
    });

    group.bench_function("xset_medium", |b| {
        let mut i = 0u64;
        let value = "x".repeat(1024); // 1KB value
        b.iter(|| {
            store.xset(&format!("key:{}", i), &value).unwrap();
            i += 1;
        });
    });

    group.bench_function("xset_with_ttl", |b| {
        let mut i = 0u64;
        b.iter(|| {
            store
                .xset_with_ttl(&format!("ttl:{}", i), "value", Duration::from_secs(3600))
                .unwrap();
            i += 1;
        });
    });

    group.bench_function("set_plain", |b| {
        let mut i = 0u64;
        b.iter(|| {
            store.set(&format!("plain:{}", i), "small_value").unwrap();
            i += 1;
        });
    });

    group.finish();
}

/// Benchmark XGET operations
fn bench_xget(c: &mut Criterion) {
    let store = store();

    // Pre-populate with data
    for i in 0..100_000 {
        store
            .xset(&format!("key:{}", i), format!("value:{}", i))
            .unwrap();
    }

    let mut group = c.benchmark_group("xget");
    group.throughput(Throughput::Elements(1));

    group.bench_function("xget_existing", |b| {
        let mut i = 0u64;
        b.iter(|| {
            black_box(store.xget(&format!("key:{}", i % 100_000)).unwrap());
            i += 1;
        });
    });

    group.bench_function("xget_missing", |b| {
        let mut i = 0u64;
        b.iter(|| {
            black_box(store.xget(&format!("missing:{}", i)).unwrap());
            i += 1;
        });
    });

    group.bench_function("ttl", |b| {
        let mut i = 0u64;
        b.iter(|| {
            black_box(store.ttl(&format!("key:{}", i % 100_000)).unwrap());
            i += 1;
        });
    });

    group.finish();
}

/// Benchmark INCR operations
fn bench_incr(c: &mut Criterion) {
    let store = store();

    let mut group = c.benchmark_group("incr");
    group.throughput(Throughput::Elements(1));

    // Single counter (high contention)
    group.bench_function("single_counter", |b| {
        b.iter(|| {
            black_box(store.increment("counter").unwrap());
        });
    });

    // Multiple counters (low contention)
    group.bench_function("multiple_counters", |b| {
        let mut i = 0u64;
        b.iter(|| {
            black_box(store.increment(&format!("counter:{}", i % 1000)).unwrap());
            i += 1;
        });
    });

    group.finish();
}

/// Benchmark concurrent counter updates
fn bench_concurrent(c: &mut Criterion) {
    use std::thread;

    let mut group = c.benchmark_group("concurrent");
    group.measurement_time(Duration::from_secs(10));

    group.bench_function("4_threads_incr", |b| {
        let store = store();
        b.iter(|| {
            let handles: Vec<_> = (0..4)
                .map(|t| {
                    let store = store.clone();
                    thread::spawn(move || {
                        for i in 0..1_000 {
                            store.increment(&format!("hits:{}", (t * i) % 16)).unwrap();
                        }
                    })
                })
                .collect();

            for handle in handles {
                handle.join().unwrap();
            }
        });
    });

    group.finish();
}

/// Benchmark prefix scans
fn bench_scan(c: &mut Criterion) {
    let store = store();

    // Pre-populate with various key prefixes
    for i in 0..1_000 {
        store.xset(&format!("user:{}", i), "user_data").unwrap();
        store
            .xset_with_ttl(
                &format!("session:{}", i),
                "session_data",
                Duration::from_secs(3600),
            )
            .unwrap();
        store.set(&format!("cache:{}", i), "cache_data").unwrap();
    }

    let mut group = c.benchmark_group("scan");

    group.bench_function("find_keys_prefix", |b| {
        b.iter(|| {
            black_box(store.find_keys("user:").unwrap());
        });
    });

    group.bench_function("find_keys_all", |b| {
        b.iter(|| {
            black_box(store.find_keys("").unwrap());
        });
    });

    group.bench_function("find_live_expiring_keys", |b| {
        b.iter(|| {
            black_box(store.find_live_expiring_keys("session:").unwrap());
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_xset,
    bench_xget,
    bench_incr,
    bench_concurrent,
    bench_scan,
);

criterion_main!(benches);
