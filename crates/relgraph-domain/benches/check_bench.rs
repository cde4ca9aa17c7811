//! Performance benchmarks for Check and ListObjects.
//!
//! Run with: cargo bench -p relgraph-domain --bench check_bench
//!
//! These benchmarks measure:
//! - Direct tuple checks against large tuple sets
//! - Nested group resolution at increasing depth
//! - Tuple-to-userset chains through parent folders
//! - Forward versus reverse ListObjects candidate gathering

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use tokio::runtime::Runtime;

use relgraph_domain::error::{DomainError, DomainResult};
use relgraph_domain::model::{
    AuthorizationModel, Model, Object, RelationDefinition, Subject, TypeDefinition, Userset,
};
use relgraph_domain::resolver::{
    CheckRequest, GraphResolver, ListObjectsRequest, ListObjectsStrategy, ModelReader, ObjectRef,
    StoredTupleRef, TupleReader,
};

// =============================================================================
// Benchmark-specific reader implementations
// =============================================================================

/// Fast in-memory tuple reader for benchmarks.
#[derive(Default)]
struct BenchTupleReader {
    /// (object_type, object_id, relation) -> subjects
    tuples: HashMap<(String, String, String), Vec<StoredTupleRef>>,
}

impl BenchTupleReader {
    fn add(&mut self, object: &str, relation: &str, user: &str) {
        let (Ok(object), Ok(subject)) = (Object::parse(object), Subject::parse(user)) else {
            panic!("invalid benchmark tuple {object}#{relation}@{user}");
        };
        self.tuples
            .entry((object.object_type, object.object_id, relation.to_string()))
            .or_default()
            .push(StoredTupleRef::new(
                subject.subject_type,
                subject.subject_id,
                subject.relation,
            ));
    }
}

#[async_trait]
impl TupleReader for BenchTupleReader {
    async fn read_tuples(
        &self,
        object_type: &str,
        object_id: &str,
        relation: &str,
    ) -> DomainResult<Vec<StoredTupleRef>> {
        Ok(self
            .tuples
            .get(&(
                object_type.to_string(),
                object_id.to_string(),
                relation.to_string(),
            ))
            .cloned()
            .unwrap_or_default())
    }

    async fn read_usersets_for_subject(
        &self,
        subject_type: &str,
        subject_id: &str,
        subject_relation: Option<&str>,
        relation: &str,
    ) -> DomainResult<Vec<ObjectRef>> {
        Ok(self
            .tuples
            .iter()
            .filter(|((_, _, r), subjects)| {
                r == relation
                    && subjects.iter().any(|s| {
                        s.user_type == subject_type
                            && s.user_id == subject_id
                            && s.user_relation.as_deref() == subject_relation
                    })
            })
            .map(|((object_type, object_id, _), _)| ObjectRef::new(object_type, object_id))
            .collect())
    }

    async fn list_objects_by_type(&self, object_type: &str, limit: usize) -> DomainResult<Vec<String>> {
        let mut ids: Vec<String> = self
            .tuples
            .keys()
            .filter(|(t, _, _)| t == object_type)
            .map(|(_, id, _)| id.clone())
            .collect();
        ids.sort();
        ids.dedup();
        ids.truncate(limit);
        Ok(ids)
    }
}

/// Serves a single pre-validated model.
struct BenchModelReader {
    model: Arc<Model>,
}

#[async_trait]
impl ModelReader for BenchModelReader {
    async fn get_model(&self, model_id: Option<&str>) -> DomainResult<Arc<Model>> {
        match model_id {
            None => Ok(Arc::clone(&self.model)),
            Some(id) if Some(id) == self.model.id() => Ok(Arc::clone(&self.model)),
            Some(id) => Err(DomainError::ModelNotFound {
                model_id: id.to_string(),
            }),
        }
    }
}

// =============================================================================
// Setup helpers
// =============================================================================

fn bench_model() -> Arc<BenchModelReader> {
    let types = vec![
        TypeDefinition::new("user", vec![]),
        TypeDefinition::new(
            "group",
            vec![RelationDefinition::with_constraints(
                "member",
                ["user", "group#member"],
                Userset::This,
            )],
        ),
        TypeDefinition::new(
            "folder",
            vec![
                RelationDefinition::with_constraints("parent", ["folder"], Userset::This),
                RelationDefinition::with_constraints(
                    "viewer",
                    ["user", "group#member"],
                    Userset::Union {
                        children: vec![Userset::This, Userset::tuple_to_userset("parent", "viewer")],
                    },
                ),
            ],
        ),
        TypeDefinition::new(
            "document",
            vec![
                RelationDefinition::with_constraints("parent", ["folder"], Userset::This),
                RelationDefinition::with_constraints(
                    "viewer",
                    ["user", "group#member"],
                    Userset::Union {
                        children: vec![Userset::This, Userset::tuple_to_userset("parent", "viewer")],
                    },
                ),
            ],
        ),
    ];
    let model = match Model::new(AuthorizationModel::with_types("1.1", types).with_id("bench")) {
        Ok(model) => model,
        Err(e) => panic!("benchmark model is invalid: {e}"),
    };
    Arc::new(BenchModelReader {
        model: Arc::new(model),
    })
}

fn resolver(tuples: BenchTupleReader) -> GraphResolver<BenchTupleReader, BenchModelReader> {
    GraphResolver::new(Arc::new(tuples), bench_model())
}

// =============================================================================
// Benchmarks
// =============================================================================

fn bench_check_direct(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut tuples = BenchTupleReader::default();
    for i in 0..1000 {
        tuples.add("document:doc1", "viewer", &format!("user:user{i}"));
    }
    let resolver = resolver(tuples);

    let mut group = c.benchmark_group("check_direct");
    group.throughput(Throughput::Elements(1));
    group.bench_function("1000_viewers", |b| {
        b.to_async(&rt).iter(|| async {
            let request = CheckRequest::new("user:user999", "viewer", "document:doc1");
            black_box(resolver.check(&request).await.unwrap())
        })
    });
    group.finish();
}

fn bench_check_nested_groups(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();

    let mut group = c.benchmark_group("check_nested_groups");
    for depth in [2usize, 8, 20] {
        let mut tuples = BenchTupleReader::default();
        tuples.add("document:doc1", "viewer", "group:g0#member");
        for i in 0..depth - 1 {
            tuples.add(&format!("group:g{i}"), "member", &format!("group:g{}#member", i + 1));
        }
        tuples.add(&format!("group:g{}", depth - 1), "member", "user:alice");
        let resolver = resolver(tuples);

        group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |b, _| {
            b.to_async(&rt).iter(|| async {
                let request = CheckRequest::new("user:alice", "viewer", "document:doc1");
                black_box(resolver.check(&request).await.unwrap())
            })
        });
    }
    group.finish();
}

fn bench_check_folder_chain(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut tuples = BenchTupleReader::default();
    tuples.add("document:doc1", "parent", "folder:f0");
    for i in 0..10 {
        tuples.add(&format!("folder:f{i}"), "parent", &format!("folder:f{}", i + 1));
    }
    tuples.add("folder:f10", "viewer", "user:alice");
    let resolver = resolver(tuples);

    c.bench_function("check_folder_chain_10", |b| {
        b.to_async(&rt).iter(|| async {
            let request = CheckRequest::new("user:alice", "viewer", "document:doc1");
            black_box(resolver.check(&request).await.unwrap())
        })
    });
}

fn bench_list_objects(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut tuples = BenchTupleReader::default();
    for i in 0..500 {
        tuples.add(&format!("document:doc{i}"), "viewer", &format!("user:user{}", i % 50));
    }
    let resolver = resolver(tuples);

    let mut group = c.benchmark_group("list_objects");
    for strategy in [ListObjectsStrategy::Forward, ListObjectsStrategy::Reverse] {
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{strategy:?}")),
            &strategy,
            |b, &strategy| {
                b.to_async(&rt).iter(|| async {
                    let request = ListObjectsRequest::new("user:user7", "viewer", "document")
                        .with_strategy(strategy);
                    black_box(resolver.list_objects(&request).await.unwrap())
                })
            },
        );
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_check_direct,
    bench_check_nested_groups,
    bench_check_folder_chain,
    bench_list_objects
);
criterion_main!(benches);
