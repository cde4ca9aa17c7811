//! `AuthzService`: one entry point over storage, resolver, cache and batch.
//!
//! Reads go through `CachedChecker` (Check, BatchCheck) or straight to the
//! `GraphResolver` (Expand, ListObjects). Tuple writes clear the check cache.

use std::sync::{Arc, Mutex};

use relgraph_domain::cache::{CachedChecker, CheckCache, CheckCacheConfig};
use relgraph_domain::error::DomainError;
use relgraph_domain::model::{constraints_admit, AuthorizationModel, Model, Subject, WILDCARD};
use relgraph_domain::resolver::{
    CheckRequest, CheckResult, ExpandRequest, ExpandResult, GraphResolver, ListObjectsRequest,
    ListObjectsResult, ModelReader, ResolverConfig,
};
use relgraph_storage::{
    DataStore, StorageError, StoredAuthorizationModel, StoredTuple, TupleFilter,
};
use thiserror::Error;
use tracing::{info, instrument};
use ulid::Generator;

use crate::adapters::{DataStoreModelReader, DataStoreTupleReader};
use crate::config::ServerConfig;
use crate::observability::register_metrics;
use crate::handlers::batch::{
    BatchCheckError, BatchCheckHandler, BatchCheckRequest, BatchCheckResponse,
};

/// Maximum tuples (writes plus deletes) accepted by one write call.
pub const MAX_TUPLES_PER_WRITE: usize = 100;

/// Errors returned by `AuthzService`.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Batch(#[from] BatchCheckError),

    /// A tuple is malformed or not allowed by the latest model.
    #[error("invalid tuple at index {index}: {message}")]
    InvalidTuple { index: usize, message: String },

    /// A write exceeded `MAX_TUPLES_PER_WRITE`.
    #[error("write contains {count} tuples, maximum is {max}")]
    TooManyTuples { count: usize, max: usize },
}

/// Result type for service operations.
pub type ServiceResult<T> = Result<T, ServiceError>;

/// A relationship tuple in `user`, `relation`, `type:id` form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TupleKey {
    pub user: String,
    pub relation: String,
    pub object: String,
}

impl TupleKey {
    pub fn new(
        user: impl Into<String>,
        relation: impl Into<String>,
        object: impl Into<String>,
    ) -> Self {
        Self {
            user: user.into(),
            relation: relation.into(),
            object: object.into(),
        }
    }
}

impl From<StoredTuple> for TupleKey {
    fn from(tuple: StoredTuple) -> Self {
        Self {
            user: tuple.user(),
            relation: tuple.relation,
            object: format!("{}:{}", tuple.object_type, tuple.object_id),
        }
    }
}

type Resolver<S> = GraphResolver<DataStoreTupleReader<S>, DataStoreModelReader<S>>;
type Checker<S> = CachedChecker<DataStoreTupleReader<S>, DataStoreModelReader<S>>;

/// Authorization service over a `DataStore`.
pub struct AuthzService<S: DataStore> {
    storage: Arc<S>,
    models: Arc<DataStoreModelReader<S>>,
    resolver: Arc<Resolver<S>>,
    checker: Arc<Checker<S>>,
    batch: BatchCheckHandler<DataStoreTupleReader<S>, DataStoreModelReader<S>>,
    ids: Mutex<Generator>,
}

impl<S: DataStore> AuthzService<S> {
    /// Wires the adapters, resolver, cache and batch handler around `storage`.
    pub fn new(storage: Arc<S>, resolver_config: ResolverConfig, cache_config: CheckCacheConfig) -> Self {
        let models = Arc::new(DataStoreModelReader::new(Arc::clone(&storage)));
        let resolver = Arc::new(GraphResolver::with_config(
            Arc::new(DataStoreTupleReader::new(Arc::clone(&storage))),
            Arc::clone(&models),
            resolver_config,
        ));
        let checker = Arc::new(CachedChecker::new(
            Arc::clone(&resolver),
            Arc::new(CheckCache::new(cache_config)),
        ));
        let batch = BatchCheckHandler::new(Arc::clone(&checker));

        Self {
            storage,
            models,
            resolver,
            checker,
            batch,
            ids: Mutex::new(Generator::new()),
        }
    }

    /// Builds the service from loaded configuration and describes its metrics.
    pub fn from_config(storage: Arc<S>, config: &ServerConfig) -> Self {
        register_metrics();
        Self::new(storage, config.resolver_config(), config.cache_config())
    }

    /// The check cache, for inspection.
    pub fn cache(&self) -> &Arc<CheckCache> {
        self.checker.cache()
    }

    /// Validates and stores a model, returning its new id.
    ///
    /// Ids are ULIDs from a monotonic generator, so a later write always has
    /// a larger id and becomes the latest model.
    #[instrument(skip(self, model), fields(types = model.type_definitions.len()))]
    pub async fn write_model(&self, model: AuthorizationModel) -> ServiceResult<String> {
        let id = self.next_model_id()?;
        let model = model.with_id(id.clone());
        // Reject invalid models before they reach storage
        Model::new(model.clone())?;

        let model_json = serde_json::to_string(&model).map_err(|e| StorageError::SerializationError {
            message: e.to_string(),
        })?;
        self.storage
            .write_authorization_model(StoredAuthorizationModel::new(
                id.clone(),
                model.schema_version,
                model_json,
            ))
            .await?;

        info!(model_id = %id, "authorization model written");
        Ok(id)
    }

    fn next_model_id(&self) -> ServiceResult<String> {
        let mut ids = self.ids.lock().map_err(|_| StorageError::InternalError {
            message: "model id generator poisoned".to_string(),
        })?;
        let id = ids.generate().map_err(|e| StorageError::InternalError {
            message: format!("model id generation failed: {e}"),
        })?;
        Ok(id.to_string())
    }

    /// Applies deletes then writes, and clears the check cache.
    ///
    /// Written tuples must name a type and directly assignable relation of
    /// the latest model, with a subject its type constraints admit. Deletes
    /// only need to be well formed.
    #[instrument(skip(self, writes, deletes), fields(writes = writes.len(), deletes = deletes.len()))]
    pub async fn write_tuples(&self, writes: Vec<TupleKey>, deletes: Vec<TupleKey>) -> ServiceResult<()> {
        let count = writes.len() + deletes.len();
        if count > MAX_TUPLES_PER_WRITE {
            return Err(ServiceError::TooManyTuples {
                count,
                max: MAX_TUPLES_PER_WRITE,
            });
        }

        let writes = parse_tuples(&writes)?;
        let deletes = parse_tuples(&deletes)?;
        if !writes.is_empty() {
            let model = self.models.get_model(None).await?;
            for (index, tuple) in writes.iter().enumerate() {
                check_tuple_against_model(&model, tuple)
                    .map_err(|message| ServiceError::InvalidTuple { index, message })?;
            }
        }

        self.storage.write_tuples(writes, deletes).await?;
        self.checker.cache().invalidate_all();
        metrics::counter!("relgraph_tuple_writes_total").increment(count as u64);
        Ok(())
    }

    /// Deletes tuples and clears the check cache.
    pub async fn delete_tuples(&self, deletes: Vec<TupleKey>) -> ServiceResult<()> {
        self.write_tuples(Vec::new(), deletes).await
    }

    /// Reads stored tuples matching `filter`, sorted.
    pub async fn read_tuples(&self, filter: &TupleFilter) -> ServiceResult<Vec<TupleKey>> {
        let mut tuples: Vec<TupleKey> = self
            .storage
            .read_tuples(filter)
            .await?
            .into_iter()
            .map(TupleKey::from)
            .collect();
        tuples.sort();
        Ok(tuples)
    }

    /// Check through the cache.
    pub async fn check(&self, request: &CheckRequest) -> ServiceResult<CheckResult> {
        Ok(self.checker.check(request).await?)
    }

    /// Batch check with deduplication.
    pub async fn batch_check(&self, request: BatchCheckRequest) -> ServiceResult<BatchCheckResponse> {
        Ok(self.batch.check(request).await?)
    }

    /// Expand a relation into its userset tree.
    pub async fn expand(&self, request: &ExpandRequest) -> ServiceResult<ExpandResult> {
        Ok(self.resolver.expand(request).await?)
    }

    /// List objects of a type the user has the relation on.
    pub async fn list_objects(&self, request: &ListObjectsRequest) -> ServiceResult<ListObjectsResult> {
        Ok(self.resolver.list_objects(request).await?)
    }
}

fn parse_tuples(keys: &[TupleKey]) -> ServiceResult<Vec<StoredTuple>> {
    keys.iter()
        .enumerate()
        .map(|(index, key)| {
            StoredTuple::parse(&key.user, &key.relation, &key.object).map_err(|e| {
                ServiceError::InvalidTuple {
                    index,
                    message: e.to_string(),
                }
            })
        })
        .collect()
}

fn check_tuple_against_model(model: &Model, tuple: &StoredTuple) -> Result<(), String> {
    let definition = model
        .resolve(&tuple.object_type, &tuple.relation)
        .map_err(|e| e.to_string())?;
    if !definition.rewrite.contains_this() {
        return Err(format!(
            "relation '{}#{}' is not directly assignable",
            tuple.object_type, tuple.relation
        ));
    }
    if !model.has_type(&tuple.user_type) {
        return Err(format!("user type '{}' is not defined", tuple.user_type));
    }
    let wildcard = tuple.user_id == WILDCARD;
    if !constraints_admit(
        &definition.type_constraints,
        &tuple.user_type,
        tuple.user_relation.as_deref(),
        wildcard,
    ) {
        let subject = match &tuple.user_relation {
            Some(relation) => Subject::userset(&tuple.user_type, &tuple.user_id, relation),
            None => Subject::new(&tuple.user_type, &tuple.user_id),
        };
        return Err(format!(
            "user '{subject}' is not allowed on '{}#{}'",
            tuple.object_type, tuple.relation
        ));
    }
    Ok(())
}
