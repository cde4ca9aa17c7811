//! Traits for storage operations needed by the resolver.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::DomainResult;
use crate::model::Model;

use super::types::{ObjectRef, StoredTupleRef};

/// Trait for tuple storage operations needed by the resolver.
///
/// Implementations must be safe for concurrent reads. The resolver never
/// depends on the order of returned sequences.
#[async_trait]
pub trait TupleReader: Send + Sync {
    /// Reads the subjects of tuples on exactly `(object_type:object_id, relation)`.
    ///
    /// Wildcard subjects are returned as stored; the store performs no expansion.
    async fn read_tuples(
        &self,
        object_type: &str,
        object_id: &str,
        relation: &str,
    ) -> DomainResult<Vec<StoredTupleRef>>;

    /// Reverse lookup: objects holding a tuple `(object, relation, subject)`
    /// where the subject is `subject_type:subject_id[#subject_relation]`.
    async fn read_usersets_for_subject(
        &self,
        subject_type: &str,
        subject_id: &str,
        subject_relation: Option<&str>,
        relation: &str,
    ) -> DomainResult<Vec<ObjectRef>>;

    /// Lists up to `limit` unique object IDs of a given type that have any tuples.
    ///
    /// Used by the forward ListObjects strategy. Default implementation
    /// returns an empty list.
    async fn list_objects_by_type(
        &self,
        _object_type: &str,
        _limit: usize,
    ) -> DomainResult<Vec<String>> {
        Ok(Vec::new())
    }
}

/// Trait for fetching validated model snapshots.
#[async_trait]
pub trait ModelReader: Send + Sync {
    /// Returns the snapshot with the given id, or the latest one when `None`.
    ///
    /// Fails with `ModelNotFound` if no such model exists.
    async fn get_model(&self, model_id: Option<&str>) -> DomainResult<Arc<Model>>;
}
