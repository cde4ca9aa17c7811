//! Storage layer benchmarks.
//!
//! Measures the memory store on the resolver's access paths:
//! 1. Exact (object, relation) reads used by Check
//! 2. Reverse reads by user used by reverse ListObjects
//! 3. Object id enumeration used by forward ListObjects
//!
//! Run with: cargo bench -p relgraph-storage

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use relgraph_storage::memory::MemoryDataStore;
use relgraph_storage::traits::{DataStore, StoredTuple, TupleFilter};
use tokio::runtime::Runtime;

/// Creates a store pre-populated with N tuples spread over N/10 users.
async fn setup_store_with_tuples(n: usize) -> Arc<MemoryDataStore> {
    let store = Arc::new(MemoryDataStore::new());

    // Write tuples in batches to keep setup fast
    let batch_size = 1000;
    for batch_start in (0..n).step_by(batch_size) {
        let batch_end = (batch_start + batch_size).min(n);
        let tuples: Vec<StoredTuple> = (batch_start..batch_end)
            .map(|i| {
                StoredTuple::new(
                    "document",
                    format!("doc{i}"),
                    "viewer",
                    "user",
                    format!("user{}", i % (n / 10).max(1)),
                    None,
                )
            })
            .collect();
        store.write_tuples(tuples, vec![]).await.unwrap();
    }

    store
}

/// Benchmark: Write batch of 100 tuples to store with N existing tuples.
fn bench_write_batch(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();

    let mut group = c.benchmark_group("write_batch_100");
    group.sample_size(30);

    for n in [1_000, 10_000] {
        group.throughput(Throughput::Elements(100));
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            let store = rt.block_on(setup_store_with_tuples(n));
            let mut counter = n;

            b.iter(|| {
                let batch: Vec<StoredTuple> = (0..100)
                    .map(|i| {
                        counter += 1;
                        StoredTuple::new(
                            "document",
                            format!("batch_doc{counter}_{i}"),
                            "viewer",
                            "user",
                            format!("batch_user{counter}"),
                            None,
                        )
                    })
                    .collect();
                rt.block_on(store.write_tuples(batch, vec![])).unwrap();
            });
        });
    }
    group.finish();
}

/// Benchmark: Exact object and relation lookup from store with N tuples.
fn bench_read_specific_object(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();

    let mut group = c.benchmark_group("read_specific_object");

    for n in [1_000, 10_000] {
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            let store = rt.block_on(setup_store_with_tuples(n));
            let mut idx = 0;

            b.iter(|| {
                idx = (idx + 7919) % n;
                let filter = TupleFilter {
                    object_type: Some("document".to_string()),
                    object_id: Some(format!("doc{idx}")),
                    relation: Some("viewer".to_string()),
                    user: None,
                };
                let result = rt.block_on(store.read_tuples(black_box(&filter))).unwrap();
                black_box(result);
            });
        });
    }
    group.finish();
}

/// Benchmark: Reverse lookup by user from store with N tuples.
fn bench_read_by_user(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();

    let mut group = c.benchmark_group("read_by_user");

    for n in [1_000, 10_000] {
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            let store = rt.block_on(setup_store_with_tuples(n));

            b.iter(|| {
                let result = rt
                    .block_on(store.read_tuples_by_user("user", "user7", None, Some("viewer")))
                    .unwrap();
                black_box(result);
            });
        });
    }
    group.finish();
}

/// Benchmark: Enumerate object ids of a type from store with N tuples.
fn bench_list_object_ids(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();

    let mut group = c.benchmark_group("list_object_ids");

    for n in [1_000, 10_000] {
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            let store = rt.block_on(setup_store_with_tuples(n));

            b.iter(|| {
                let result = rt.block_on(store.list_object_ids("document", 1000)).unwrap();
                black_box(result);
            });
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_write_batch,
    bench_read_specific_object,
    bench_read_by_user,
    bench_list_object_ids
);
criterion_main!(benches);
