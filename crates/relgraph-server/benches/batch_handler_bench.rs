//! Batch check benchmarks over the memory store.
//!
//! Run with: cargo bench -p relgraph-server
//!
//! Measures:
//! - Throughput of a full batch at different duplicate ratios
//! - Cost of a cold batch versus one served from the check cache

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use tokio::runtime::Runtime;

use relgraph_domain::cache::CheckCacheConfig;
use relgraph_domain::model::{AuthorizationModel, RelationDefinition, TypeDefinition, Userset};
use relgraph_domain::resolver::ResolverConfig;
use relgraph_server::handlers::batch::{BatchCheckItem, BatchCheckRequest, MAX_BATCH_SIZE};
use relgraph_server::{AuthzService, TupleKey};
use relgraph_storage::MemoryDataStore;

/// Service with `document#viewer: [user, group#member]`, 100 documents each
/// shared with one of 10 groups, and 10 users per group.
fn setup(rt: &Runtime, cache: CheckCacheConfig) -> AuthzService<MemoryDataStore> {
    rt.block_on(async {
        let service = AuthzService::new(
            Arc::new(MemoryDataStore::new()),
            ResolverConfig::default(),
            cache,
        );
        let model = AuthorizationModel::with_types(
            "1.1",
            vec![
                TypeDefinition::new("user", vec![]),
                TypeDefinition::new(
                    "group",
                    vec![RelationDefinition::with_constraints("member", ["user"], Userset::This)],
                ),
                TypeDefinition::new(
                    "document",
                    vec![RelationDefinition::with_constraints(
                        "viewer",
                        ["user", "group#member"],
                        Userset::This,
                    )],
                ),
            ],
        );
        service.write_model(model).await.unwrap();

        for group in 0..10 {
            let members = (0..10)
                .map(|u| {
                    TupleKey::new(format!("user:u{}", group * 10 + u), "member", format!("group:g{group}"))
                })
                .collect();
            service.write_tuples(members, vec![]).await.unwrap();
        }
        let shares = (0..100)
            .map(|doc| {
                TupleKey::new(format!("group:g{}#member", doc % 10), "viewer", format!("document:d{doc}"))
            })
            .collect();
        service.write_tuples(shares, vec![]).await.unwrap();

        service
    })
}

/// `batch_size` checks of which roughly `duplicate_ratio` repeat earlier ones.
fn batch_with_duplicates(batch_size: usize, duplicate_ratio: f64) -> Vec<BatchCheckItem> {
    let unique_count = (((1.0 - duplicate_ratio) * batch_size as f64).ceil() as usize).max(1);
    (0..batch_size)
        .map(|i| {
            let idx = i % unique_count;
            BatchCheckItem::new(format!("user:u{idx}"), "viewer", format!("document:d{idx}"))
        })
        .collect()
}

fn bench_deduplication(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let service = setup(&rt, CheckCacheConfig::default());

    let mut group = c.benchmark_group("batch_deduplication");
    group.throughput(Throughput::Elements(MAX_BATCH_SIZE as u64));

    for (label, ratio) in [("0%", 0.0), ("50%", 0.5), ("90%", 0.9)] {
        let checks = batch_with_duplicates(MAX_BATCH_SIZE, ratio);
        group.bench_with_input(BenchmarkId::new("duplicates", label), &checks, |b, checks| {
            b.to_async(&rt).iter(|| async {
                let response = service
                    .batch_check(BatchCheckRequest::new(checks.clone()))
                    .await
                    .unwrap();
                black_box(response)
            })
        });
    }

    group.finish();
}

fn bench_cached_batches(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let checks = batch_with_duplicates(MAX_BATCH_SIZE, 0.0);

    let mut group = c.benchmark_group("batch_cache");
    group.throughput(Throughput::Elements(MAX_BATCH_SIZE as u64));

    for (label, cache) in [
        ("disabled", CheckCacheConfig::default()),
        ("enabled", CheckCacheConfig::default().with_enabled(true)),
    ] {
        let service = setup(&rt, cache);
        group.bench_function(label, |b| {
            b.to_async(&rt).iter(|| async {
                let response = service
                    .batch_check(BatchCheckRequest::new(checks.clone()))
                    .await
                    .unwrap();
                black_box(response)
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_deduplication, bench_cached_batches);
criterion_main!(benches);
