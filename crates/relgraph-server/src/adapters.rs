//! Adapters that bridge the storage layer to the domain layer.
//!
//! The domain layer defines the read contracts the resolver needs:
//! - `TupleReader`: forward and reverse tuple lookups
//! - `ModelReader`: validated model snapshots
//!
//! The storage layer implements `DataStore`. The adapters here implement the
//! domain traits on top of any `DataStore`.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::{debug, warn};

use relgraph_domain::error::{DomainError, DomainResult};
use relgraph_domain::model::{AuthorizationModel, Model, Object};
use relgraph_domain::resolver::{ModelReader, ObjectRef, StoredTupleRef, TupleReader};
use relgraph_storage::{DataStore, StorageError, StoredAuthorizationModel, TupleFilter};

fn store_unavailable(err: StorageError) -> DomainError {
    warn!(error = %err, "tuple store read failed");
    DomainError::StoreUnavailable {
        message: err.to_string(),
    }
}

/// Adapter that implements `TupleReader` using a `DataStore`.
pub struct DataStoreTupleReader<S: DataStore> {
    storage: Arc<S>,
}

impl<S: DataStore> DataStoreTupleReader<S> {
    /// Creates a new adapter wrapping the given storage.
    pub fn new(storage: Arc<S>) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl<S: DataStore> TupleReader for DataStoreTupleReader<S> {
    async fn read_tuples(
        &self,
        object_type: &str,
        object_id: &str,
        relation: &str,
    ) -> DomainResult<Vec<StoredTupleRef>> {
        let filter = TupleFilter {
            object_type: Some(object_type.to_string()),
            object_id: Some(object_id.to_string()),
            relation: Some(relation.to_string()),
            user: None,
        };

        let tuples = self
            .storage
            .read_tuples(&filter)
            .await
            .map_err(store_unavailable)?;

        Ok(tuples
            .into_iter()
            .map(|t| StoredTupleRef::new(t.user_type, t.user_id, t.user_relation))
            .collect())
    }

    async fn read_usersets_for_subject(
        &self,
        subject_type: &str,
        subject_id: &str,
        subject_relation: Option<&str>,
        relation: &str,
    ) -> DomainResult<Vec<ObjectRef>> {
        let tuples = self
            .storage
            .read_tuples_by_user(subject_type, subject_id, subject_relation, Some(relation))
            .await
            .map_err(store_unavailable)?;

        Ok(tuples
            .into_iter()
            .map(|t| Object::new(t.object_type, t.object_id))
            .collect())
    }

    async fn list_objects_by_type(&self, object_type: &str, limit: usize) -> DomainResult<Vec<String>> {
        self.storage
            .list_object_ids(object_type, limit)
            .await
            .map_err(store_unavailable)
    }
}

/// Adapter that implements `ModelReader` using a `DataStore`.
///
/// Stored model JSON is parsed and validated once per model id; later
/// requests share the same `Arc<Model>`. Stored models are immutable, so
/// entries never go stale.
pub struct DataStoreModelReader<S: DataStore> {
    storage: Arc<S>,
    snapshots: DashMap<String, Arc<Model>>,
}

impl<S: DataStore> DataStoreModelReader<S> {
    /// Creates a new adapter wrapping the given storage.
    pub fn new(storage: Arc<S>) -> Self {
        Self {
            storage,
            snapshots: DashMap::new(),
        }
    }

    /// Number of parsed snapshots held.
    pub fn cached_snapshots(&self) -> usize {
        self.snapshots.len()
    }

    fn snapshot(&self, stored: StoredAuthorizationModel) -> DomainResult<Arc<Model>> {
        if let Some(model) = self.snapshots.get(&stored.id) {
            return Ok(Arc::clone(model.value()));
        }

        let model = Arc::new(parse_stored_model(&stored)?);
        debug!(model_id = %stored.id, "loaded model snapshot");
        Ok(Arc::clone(
            self.snapshots.entry(stored.id).or_insert(model).value(),
        ))
    }
}

/// Deserializes and validates a stored model, stamping it with its store id.
pub fn parse_stored_model(stored: &StoredAuthorizationModel) -> DomainResult<Model> {
    let model: AuthorizationModel =
        serde_json::from_str(&stored.model_json).map_err(|e| DomainError::ModelValidation {
            message: format!("failed to parse model '{}': {e}", stored.id),
        })?;
    Model::new(model.with_id(stored.id.clone()))
}

#[async_trait]
impl<S: DataStore> ModelReader for DataStoreModelReader<S> {
    async fn get_model(&self, model_id: Option<&str>) -> DomainResult<Arc<Model>> {
        let result = match model_id {
            Some(id) => {
                if let Some(model) = self.snapshots.get(id) {
                    return Ok(Arc::clone(model.value()));
                }
                self.storage.get_authorization_model(id).await
            }
            None => self.storage.get_latest_authorization_model().await,
        };

        match result {
            Ok(stored) => self.snapshot(stored),
            Err(StorageError::ModelNotFound { model_id }) => {
                Err(DomainError::ModelNotFound { model_id })
            }
            Err(e) => Err(store_unavailable(e)),
        }
    }
}
