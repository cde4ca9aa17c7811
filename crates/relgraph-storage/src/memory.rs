//! In-memory storage implementation.
//!
//! Tuples are grouped by `(object_type, object_id, relation)` in one index of
//! `HashSet`s, so the resolver's hot path (all subjects of one relation on
//! one object) is a single lookup. Other filters scan.
//!
//! The index sits behind one `RwLock`: a `write_tuples` batch commits under
//! the write lock and every read runs under the read lock, so a read sees
//! either all of a batch or none of it.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use crate::error::{StorageError, StorageResult};
use crate::traits::{
    parse_user_filter, validate_object_type, validate_tuple, DataStore, StoredAuthorizationModel,
    StoredTuple, TupleFilter,
};

type ObjectKey = (String, String, String);
type TupleIndex = HashMap<ObjectKey, HashSet<StoredTuple>>;

fn object_key(tuple: &StoredTuple) -> ObjectKey {
    (
        tuple.object_type.clone(),
        tuple.object_id.clone(),
        tuple.relation.clone(),
    )
}

fn scan<F>(index: &TupleIndex, keep: F) -> Vec<StoredTuple>
where
    F: Fn(&StoredTuple) -> bool,
{
    index
        .values()
        .flat_map(|tuples| tuples.iter().filter(|t| keep(t)).cloned())
        .collect()
}

/// In-memory implementation of DataStore.
///
/// # Performance Characteristics
///
/// - **Write / delete tuple**: O(1) average
/// - **Read by object and relation**: O(k) for k matching tuples
/// - **Other reads**: O(N) scan over all tuples
#[derive(Debug, Default)]
pub struct MemoryDataStore {
    tuples: RwLock<TupleIndex>,
    authorization_models: DashMap<String, StoredAuthorizationModel>,
}

impl MemoryDataStore {
    /// Creates a new in-memory data store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new in-memory data store wrapped in Arc.
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Total number of stored tuples.
    pub async fn tuple_count(&self) -> usize {
        self.tuples.read().await.values().map(HashSet::len).sum()
    }
}

#[async_trait]
impl DataStore for MemoryDataStore {
    #[instrument(skip(self, writes, deletes), fields(writes = writes.len(), deletes = deletes.len()))]
    async fn write_tuples(
        &self,
        writes: Vec<StoredTuple>,
        deletes: Vec<StoredTuple>,
    ) -> StorageResult<()> {
        // Validate the whole batch before touching state
        for tuple in writes.iter().chain(deletes.iter()) {
            validate_tuple(tuple)?;
        }

        let mut index = self.tuples.write().await;

        for tuple in deletes {
            let key = object_key(&tuple);
            if let Some(tuples) = index.get_mut(&key) {
                tuples.remove(&tuple);
                if tuples.is_empty() {
                    index.remove(&key);
                }
            }
        }

        for tuple in writes {
            index.entry(object_key(&tuple)).or_default().insert(tuple);
        }

        Ok(())
    }

    async fn read_tuples(&self, filter: &TupleFilter) -> StorageResult<Vec<StoredTuple>> {
        let user_filter = filter.user.as_deref().map(parse_user_filter).transpose()?;
        let user_matches = |t: &StoredTuple| {
            user_filter.as_ref().map_or(true, |(ut, ui, ur)| {
                &t.user_type == ut && &t.user_id == ui && &t.user_relation == ur
            })
        };

        let index = self.tuples.read().await;

        if let (Some(object_type), Some(object_id), Some(relation)) =
            (&filter.object_type, &filter.object_id, &filter.relation)
        {
            let key = (object_type.clone(), object_id.clone(), relation.clone());
            return Ok(index
                .get(&key)
                .map(|tuples| tuples.iter().filter(|t| user_matches(t)).cloned().collect())
                .unwrap_or_default());
        }

        Ok(scan(&index, |t| {
            filter
                .object_type
                .as_ref()
                .map_or(true, |ot| &t.object_type == ot)
                && filter
                    .object_id
                    .as_ref()
                    .map_or(true, |oi| &t.object_id == oi)
                && filter.relation.as_ref().map_or(true, |r| &t.relation == r)
                && user_matches(t)
        }))
    }

    async fn read_tuples_by_user(
        &self,
        user_type: &str,
        user_id: &str,
        user_relation: Option<&str>,
        relation: Option<&str>,
    ) -> StorageResult<Vec<StoredTuple>> {
        let index = self.tuples.read().await;
        Ok(scan(&index, |t| {
            t.user_type == user_type
                && t.user_id == user_id
                && t.user_relation.as_deref() == user_relation
                && relation.map_or(true, |r| t.relation == r)
        }))
    }

    async fn list_object_ids(&self, object_type: &str, limit: usize) -> StorageResult<Vec<String>> {
        validate_object_type(object_type)?;

        let mut unique_ids: Vec<String> = self
            .tuples
            .read()
            .await
            .iter()
            .filter(|(key, tuples)| key.0 == object_type && !tuples.is_empty())
            .map(|(key, _)| key.1.clone())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();

        // Sort for deterministic results
        unique_ids.sort();
        unique_ids.truncate(limit);

        Ok(unique_ids)
    }

    async fn write_authorization_model(
        &self,
        model: StoredAuthorizationModel,
    ) -> StorageResult<StoredAuthorizationModel> {
        if model.id.is_empty() {
            return Err(StorageError::InvalidInput {
                message: "model id cannot be empty".to_string(),
            });
        }
        serde_json::from_str::<serde_json::Value>(&model.model_json).map_err(|e| {
            StorageError::SerializationError {
                message: format!("model {} is not valid JSON: {e}", model.id),
            }
        })?;

        match self.authorization_models.entry(model.id.clone()) {
            Entry::Occupied(_) => Err(StorageError::ModelAlreadyExists { model_id: model.id }),
            Entry::Vacant(entry) => {
                debug!(model_id = %model.id, "authorization model stored");
                entry.insert(model.clone());
                Ok(model)
            }
        }
    }

    async fn get_authorization_model(
        &self,
        model_id: &str,
    ) -> StorageResult<StoredAuthorizationModel> {
        self.authorization_models
            .get(model_id)
            .map(|m| m.value().clone())
            .ok_or_else(|| StorageError::ModelNotFound {
                model_id: model_id.to_string(),
            })
    }

    async fn get_latest_authorization_model(&self) -> StorageResult<StoredAuthorizationModel> {
        // Newest by created_at DESC, id DESC
        self.authorization_models
            .iter()
            .map(|m| m.value().clone())
            .max_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)))
            .ok_or_else(|| StorageError::ModelNotFound {
                model_id: "latest (no models exist)".to_string(),
            })
    }
}
