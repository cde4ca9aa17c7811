//! Internal traversal context for the graph resolver.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::{Semaphore, SemaphorePermit};

use crate::error::{DomainError, DomainResult};
use crate::model::{Model, Object, Subject};

use super::types::{ContextualTuple, ObjectRef, StoredTupleRef};

/// Builds the cycle-detection key for a `(type, id, relation)` node.
pub(crate) fn node_key(object_type: &str, object_id: &str, relation: &str) -> String {
    format!("{object_type}:{object_id}#{relation}")
}

/// Validates a relation name: non-empty, no `:` or `#`.
pub(crate) fn validate_relation(relation: &str) -> DomainResult<()> {
    if relation.is_empty() || relation.contains(':') || relation.contains('#') {
        return Err(DomainError::InvalidRelationFormat {
            value: relation.to_string(),
        });
    }
    Ok(())
}

/// Parses a `type:id` object string.
pub(crate) fn parse_object(value: &str) -> DomainResult<Object> {
    Object::parse(value).map_err(|_| DomainError::InvalidObjectFormat {
        value: value.to_string(),
    })
}

/// Parses a subject string.
pub(crate) fn parse_subject(value: &str) -> DomainResult<Subject> {
    Subject::parse(value).map_err(|_| DomainError::InvalidUserFormat {
        value: value.to_string(),
    })
}

/// State shared by every node of one request: the pinned model snapshot,
/// the request's contextual tuples and its store read permits.
#[derive(Debug)]
pub(crate) struct RequestScope {
    model: Arc<Model>,
    /// (object_type, object_id, relation) -> subjects.
    contextual: HashMap<(String, String, String), Vec<StoredTupleRef>>,
    /// Bounds in-flight store reads across the whole request, however deep
    /// the fan-outs nest. Permits are held only for the read itself.
    reads: Semaphore,
}

impl RequestScope {
    pub(crate) fn new(
        model: Arc<Model>,
        contextual_tuples: &[ContextualTuple],
        max_concurrent_reads: usize,
    ) -> DomainResult<Self> {
        let mut contextual: HashMap<(String, String, String), Vec<StoredTupleRef>> = HashMap::new();
        for tuple in contextual_tuples {
            let object = parse_object(&tuple.object)?;
            validate_relation(&tuple.relation)?;
            let subject = parse_subject(&tuple.user)?;
            contextual
                .entry((object.object_type, object.object_id, tuple.relation.clone()))
                .or_default()
                .push(StoredTupleRef::new(
                    subject.subject_type,
                    subject.subject_id,
                    subject.relation,
                ));
        }
        Ok(Self {
            model,
            contextual,
            reads: Semaphore::new(max_concurrent_reads.max(1)),
        })
    }

    pub(crate) fn model(&self) -> &Model {
        &self.model
    }

    /// Waits for a store read slot.
    pub(crate) async fn read_permit(&self) -> DomainResult<SemaphorePermit<'_>> {
        self.reads
            .acquire()
            .await
            .map_err(|_| DomainError::StoreUnavailable {
                message: "request read limiter closed".to_string(),
            })
    }

    /// Contextual subjects on exactly `(object_type:object_id, relation)`.
    pub(crate) fn contextual_tuples(
        &self,
        object_type: &str,
        object_id: &str,
        relation: &str,
    ) -> &[StoredTupleRef] {
        self.contextual
            .get(&(
                object_type.to_string(),
                object_id.to_string(),
                relation.to_string(),
            ))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Contextual counterpart of `TupleReader::read_usersets_for_subject`.
    pub(crate) fn contextual_objects_for_subject(
        &self,
        subject_type: &str,
        subject_id: &str,
        subject_relation: Option<&str>,
        relation: &str,
    ) -> Vec<ObjectRef> {
        self.contextual
            .iter()
            .filter(|((_, _, tuple_relation), _)| tuple_relation == relation)
            .filter(|(_, subjects)| {
                subjects.iter().any(|s| {
                    s.user_type == subject_type
                        && s.user_id == subject_id
                        && s.user_relation.as_deref() == subject_relation
                })
            })
            .map(|((object_type, object_id, _), _)| ObjectRef::new(object_type, object_id))
            .collect()
    }

    /// Object IDs of `object_type` mentioned by contextual tuples.
    pub(crate) fn contextual_object_ids<'a>(
        &'a self,
        object_type: &'a str,
    ) -> impl Iterator<Item = &'a str> + 'a {
        self.contextual
            .keys()
            .filter(move |(tuple_type, _, _)| tuple_type == object_type)
            .map(|(_, object_id, _)| object_id.as_str())
    }
}

/// Internal context for graph traversal.
#[derive(Debug, Clone)]
pub(crate) struct TraversalContext {
    /// Request-wide state.
    pub(crate) scope: Arc<RequestScope>,
    /// Number of nodes entered on the current path.
    pub(crate) depth: u32,
    /// Nodes on the current path, for cycle detection.
    /// Wrapped in Arc for cheap cloning when not mutating.
    pub(crate) visited: Arc<HashSet<String>>,
}

impl TraversalContext {
    pub(crate) fn new(scope: Arc<RequestScope>) -> Self {
        Self {
            scope,
            depth: 0,
            visited: Arc::new(HashSet::new()),
        }
    }

    pub(crate) fn model(&self) -> &Model {
        self.scope.model()
    }

    /// Context for the children of node `key`: one level deeper, `key` visited.
    pub(crate) fn enter(&self, key: &str) -> Self {
        // Clone the inner HashSet only when adding new entries (copy-on-write)
        let mut new_visited = (*self.visited).clone();
        new_visited.insert(key.to_string());
        Self {
            scope: Arc::clone(&self.scope),
            depth: self.depth + 1,
            visited: Arc::new(new_visited),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AuthorizationModel, RelationDefinition, TypeDefinition, Userset};

    fn scope(tuples: &[ContextualTuple]) -> DomainResult<RequestScope> {
        let model = Model::new(AuthorizationModel::with_types(
            "1.1",
            vec![TypeDefinition::new(
                "document",
                vec![RelationDefinition::new("viewer", Userset::This)],
            )],
        ))?;
        RequestScope::new(Arc::new(model), tuples, 4)
    }

    #[test]
    fn test_enter_is_copy_on_write() {
        let root = TraversalContext::new(Arc::new(scope(&[]).unwrap()));
        let child = root.enter("document:1#viewer");
        assert_eq!(child.depth, 1);
        assert!(child.visited.contains("document:1#viewer"));
        assert!(root.visited.is_empty());
        assert_eq!(root.depth, 0);
    }

    #[test]
    fn test_contextual_tuple_lookup() {
        let scope = scope(&[
            ContextualTuple::new("user:alice", "viewer", "document:1"),
            ContextualTuple::new("group:eng#member", "viewer", "document:2"),
        ])
        .unwrap();

        assert_eq!(
            scope.contextual_tuples("document", "1", "viewer"),
            [StoredTupleRef::new("user", "alice", None)]
        );
        assert!(scope.contextual_tuples("document", "1", "editor").is_empty());
        assert_eq!(
            scope.contextual_objects_for_subject("group", "eng", Some("member"), "viewer"),
            vec![ObjectRef::new("document", "2")]
        );
        let mut ids: Vec<_> = scope.contextual_object_ids("document").collect();
        ids.sort();
        assert_eq!(ids, vec!["1", "2"]);
    }

    #[tokio::test]
    async fn test_read_permits_are_bounded() {
        let scope = scope(&[]).unwrap();
        let held: Vec<_> = futures::future::join_all((0..4).map(|_| scope.read_permit()))
            .await
            .into_iter()
            .collect::<DomainResult<Vec<_>>>()
            .unwrap();
        assert_eq!(held.len(), 4);

        let blocked =
            tokio::time::timeout(std::time::Duration::from_millis(20), scope.read_permit()).await;
        assert!(blocked.is_err());

        drop(held);
        assert!(scope.read_permit().await.is_ok());
    }

    #[test]
    fn test_malformed_contextual_tuples_are_rejected() {
        assert!(matches!(
            scope(&[ContextualTuple::new("alice", "viewer", "document:1")]),
            Err(DomainError::InvalidUserFormat { .. })
        ));
        assert!(matches!(
            scope(&[ContextualTuple::new("user:alice", "viewer", "document")]),
            Err(DomainError::InvalidObjectFormat { .. })
        ));
        assert!(matches!(
            scope(&[ContextualTuple::new("user:alice", "", "document:1")]),
            Err(DomainError::InvalidRelationFormat { .. })
        ));
    }
}
