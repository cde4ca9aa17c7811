//! Check result caching with TTL, as a decorator around the resolver.
//!
//! The resolver itself never caches. `CachedChecker` wraps a `GraphResolver`
//! and consults a `CheckCache` (Moka async cache) first.
//!
//! # Key Design
//!
//! Cache keys include `(model_id, object, relation, user)`. A check that does
//! not pin a model is keyed by the id of the latest snapshot and then
//! evaluated against that same snapshot, so a new model never serves results
//! computed under an older one.
//!
//! # Cache Safety
//!
//! By default, caching is **disabled** (`enabled: false`). Cached positive
//! decisions can be served after tuple writes until they are invalidated or
//! the TTL expires. Any tuple can influence any check through usersets and
//! tuple-to-userset rewrites, so writers call `invalidate_all`.
//!
//! `invalidate_all` also bumps a generation counter. A check records the
//! generation before it reads any tuples and only keeps its result if no
//! invalidation happened in between, so a decision computed from tuples a
//! writer has since replaced never outlives that write.
//!
//! # Example
//!
//! ```rust,ignore
//! use relgraph_domain::cache::{CacheKey, CheckCache, CheckCacheConfig};
//!
//! let cache = CheckCache::new(CheckCacheConfig::default().with_enabled(true));
//! let key = CacheKey::new("01HMODEL", "document:doc1", "viewer", "user:alice");
//! cache.insert(key.clone(), true).await;
//! assert_eq!(cache.get(&key).await, Some(true));
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use tracing::debug;

use crate::error::DomainResult;
use crate::resolver::{CheckRequest, CheckResult, GraphResolver, ModelReader, TupleReader};

/// Configuration for the check cache.
#[derive(Debug, Clone)]
pub struct CheckCacheConfig {
    /// Whether caching is enabled.
    ///
    /// Defaults to `false`: cached positive decisions can be stale.
    pub enabled: bool,
    /// Maximum number of entries in the cache.
    pub max_capacity: u64,
    /// Default TTL for cache entries.
    pub default_ttl: Duration,
}

impl Default for CheckCacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_capacity: 100_000,
            default_ttl: Duration::from_secs(10),
        }
    }
}

impl CheckCacheConfig {
    /// Enables or disables caching.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Sets the maximum capacity.
    pub fn with_max_capacity(mut self, max_capacity: u64) -> Self {
        self.max_capacity = max_capacity;
        self
    }

    /// Sets the default TTL.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }
}

/// Cache key that uniquely identifies a check operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// The model snapshot the result was computed under.
    pub model_id: String,
    /// The object being checked (e.g., "document:doc1").
    pub object: String,
    /// The relation being checked (e.g., "viewer").
    pub relation: String,
    /// The user performing the access (e.g., "user:alice").
    pub user: String,
}

impl CacheKey {
    /// Creates a new cache key.
    pub fn new(
        model_id: impl Into<String>,
        object: impl Into<String>,
        relation: impl Into<String>,
        user: impl Into<String>,
    ) -> Self {
        Self {
            model_id: model_id.into(),
            object: object.into(),
            relation: relation.into(),
            user: user.into(),
        }
    }
}

/// Check result cache with TTL support.
///
/// Uses Moka's async Cache for lock-free concurrent access with
/// automatic TTL-based eviction.
#[derive(Clone)]
pub struct CheckCache {
    cache: Cache<CacheKey, bool>,
    config: CheckCacheConfig,
    /// Bumped by every `invalidate_all`.
    generation: Arc<AtomicU64>,
}

impl std::fmt::Debug for CheckCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckCache")
            .field("config", &self.config)
            .field("entry_count", &self.cache.entry_count())
            .field("generation", &self.generation())
            .finish()
    }
}

impl CheckCache {
    /// Creates a new check cache with the given configuration.
    pub fn new(config: CheckCacheConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.max_capacity)
            .time_to_live(config.default_ttl)
            .build();

        Self {
            cache,
            config,
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Returns the configuration for this cache.
    pub fn config(&self) -> &CheckCacheConfig {
        &self.config
    }

    /// Returns whether caching is enabled.
    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Inserts a check result into the cache.
    pub async fn insert(&self, key: CacheKey, allowed: bool) {
        self.cache.insert(key, allowed).await;
    }

    /// Retrieves a cached check result.
    ///
    /// Records `relgraph_cache_hits_total` or `relgraph_cache_misses_total`.
    pub async fn get(&self, key: &CacheKey) -> Option<bool> {
        let result = self.cache.get(key).await;
        if result.is_some() {
            metrics::counter!("relgraph_cache_hits_total").increment(1);
        } else {
            metrics::counter!("relgraph_cache_misses_total").increment(1);
        }
        result
    }

    /// Invalidates a single cache entry.
    pub async fn invalidate(&self, key: &CacheKey) {
        self.cache.invalidate(key).await;
    }

    /// Current invalidation generation.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Inserts a result computed while the cache was at `generation`.
    ///
    /// Returns false, leaving no entry behind, if `invalidate_all` ran since
    /// that generation was read. The generation is checked again after the
    /// insert, since an invalidation can land between the first check and the
    /// insert itself.
    pub async fn insert_if_current(&self, key: CacheKey, allowed: bool, generation: u64) -> bool {
        if self.generation() != generation {
            return false;
        }
        self.cache.insert(key.clone(), allowed).await;
        if self.generation() != generation {
            self.cache.invalidate(&key).await;
            return false;
        }
        true
    }

    /// Invalidates every entry. Called after tuple writes and deletes.
    pub fn invalidate_all(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.cache.invalidate_all();
    }

    /// Returns the approximate number of entries in the cache.
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }

    /// Runs pending maintenance tasks (evictions, invalidations).
    pub async fn run_pending_tasks(&self) {
        self.cache.run_pending_tasks().await;
    }
}

/// Registers check cache metrics descriptions.
///
/// Optional; call once during startup when a metrics recorder is installed.
pub fn register_check_cache_metrics() {
    metrics::describe_counter!(
        "relgraph_cache_hits_total",
        "Total number of check cache hits"
    );
    metrics::describe_counter!(
        "relgraph_cache_misses_total",
        "Total number of check cache misses"
    );
    metrics::describe_counter!(
        "relgraph_cache_skips_total",
        "Checks that bypassed the cache"
    );
}

/// `GraphResolver` decorator that serves repeated checks from a `CheckCache`.
///
/// Bypassed when the cache is disabled, when the request carries contextual
/// tuples, or when the snapshot has no id. Only successful results are stored.
pub struct CachedChecker<T, M> {
    resolver: Arc<GraphResolver<T, M>>,
    cache: Arc<CheckCache>,
}

impl<T, M> CachedChecker<T, M>
where
    T: TupleReader + 'static,
    M: ModelReader + 'static,
{
    /// Wraps a resolver with a cache.
    pub fn new(resolver: Arc<GraphResolver<T, M>>, cache: Arc<CheckCache>) -> Self {
        Self { resolver, cache }
    }

    /// The wrapped resolver.
    pub fn resolver(&self) -> &Arc<GraphResolver<T, M>> {
        &self.resolver
    }

    /// The cache.
    pub fn cache(&self) -> &Arc<CheckCache> {
        &self.cache
    }

    /// Performs a permission check, consulting the cache first.
    pub async fn check(&self, request: &CheckRequest) -> DomainResult<CheckResult> {
        if !self.cache.is_enabled() || !request.contextual_tuples.is_empty() {
            metrics::counter!("relgraph_cache_skips_total").increment(1);
            return self.resolver.check(request).await;
        }

        let snapshot = self
            .resolver
            .model_snapshot(request.authorization_model_id.as_deref())
            .await?;
        let Some(model_id) = snapshot.id() else {
            metrics::counter!("relgraph_cache_skips_total").increment(1);
            return self.resolver.check(request).await;
        };

        let key = CacheKey::new(model_id, &request.object, &request.relation, &request.user);
        if let Some(allowed) = self.cache.get(&key).await {
            debug!(object = %request.object, relation = %request.relation, user = %request.user, "check served from cache");
            return Ok(CheckResult { allowed });
        }

        // Evaluate against the snapshot the key was built from
        let generation = self.cache.generation();
        let pinned = request.clone().with_model_id(model_id);
        let result = self.resolver.check(&pinned).await?;
        if !self.cache.insert_if_current(key, result.allowed, generation).await {
            debug!(object = %request.object, relation = %request.relation, "cache invalidated during check, result not cached");
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicBool;

    use async_trait::async_trait;
    use tokio::sync::Notify;

    use super::*;
    use crate::model::{AuthorizationModel, Model, RelationDefinition, TypeDefinition, Userset};
    use crate::resolver::{ObjectRef, StoredTupleRef};

    /// Helper to create an enabled cache config for tests.
    fn enabled_cache_config() -> CheckCacheConfig {
        CheckCacheConfig::default().with_enabled(true)
    }

    #[test]
    fn test_cache_disabled_by_default() {
        let config = CheckCacheConfig::default();
        assert!(!config.enabled);
        assert_eq!(config.max_capacity, 100_000);
        assert_eq!(config.default_ttl, Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_can_retrieve_cached_check_result() {
        let cache = CheckCache::new(enabled_cache_config());
        let key = CacheKey::new("m1", "document:doc1", "viewer", "user:alice");

        cache.insert(key.clone(), true).await;

        assert_eq!(cache.get(&key).await, Some(true));
    }

    #[tokio::test]
    async fn test_cache_miss_returns_none() {
        let cache = CheckCache::new(enabled_cache_config());
        let key = CacheKey::new("m1", "document:doc1", "viewer", "user:alice");
        assert_eq!(cache.get(&key).await, None);
    }

    #[tokio::test]
    async fn test_different_models_have_separate_cache_entries() {
        let cache = CheckCache::new(enabled_cache_config());
        let old_model = CacheKey::new("m1", "document:doc1", "viewer", "user:alice");
        let new_model = CacheKey::new("m2", "document:doc1", "viewer", "user:alice");

        cache.insert(old_model.clone(), true).await;
        cache.insert(new_model.clone(), false).await;

        assert_eq!(cache.get(&old_model).await, Some(true));
        assert_eq!(cache.get(&new_model).await, Some(false));
    }

    #[tokio::test]
    async fn test_cached_entry_expires_after_ttl() {
        let config = CheckCacheConfig {
            enabled: true,
            max_capacity: 100,
            default_ttl: Duration::from_millis(50),
        };
        let cache = CheckCache::new(config);
        let key = CacheKey::new("m1", "document:doc1", "viewer", "user:alice");

        cache.insert(key.clone(), true).await;
        assert_eq!(cache.get(&key).await, Some(true));

        tokio::time::sleep(Duration::from_millis(100)).await;
        cache.run_pending_tasks().await;

        assert_eq!(cache.get(&key).await, None);
    }

    #[tokio::test]
    async fn test_invalidate_single_entry_and_all() {
        let cache = CheckCache::new(enabled_cache_config());
        let key_a = CacheKey::new("m1", "document:a", "viewer", "user:alice");
        let key_b = CacheKey::new("m1", "document:b", "viewer", "user:alice");
        cache.insert(key_a.clone(), true).await;
        cache.insert(key_b.clone(), true).await;

        cache.invalidate(&key_a).await;
        assert_eq!(cache.get(&key_a).await, None);
        assert_eq!(cache.get(&key_b).await, Some(true));

        cache.invalidate_all();
        cache.run_pending_tasks().await;
        assert_eq!(cache.get(&key_b).await, None);
    }

    #[tokio::test]
    async fn test_concurrent_writes_dont_lose_data() {
        let cache = Arc::new(CheckCache::new(enabled_cache_config()));

        let handles: Vec<_> = (0..10)
            .map(|task_id| {
                let cache = Arc::clone(&cache);
                tokio::spawn(async move {
                    for i in 0..100 {
                        let key = CacheKey::new(
                            "m1",
                            format!("document:task{task_id}_doc{i}"),
                            "viewer",
                            "user:alice",
                        );
                        cache.insert(key, true).await;
                    }
                })
            })
            .collect();
        for handle in futures::future::join_all(handles).await {
            handle.unwrap();
        }

        cache.run_pending_tasks().await;
        assert_eq!(cache.entry_count(), 1_000);
    }

    #[tokio::test]
    async fn test_insert_after_invalidation_is_dropped() {
        let cache = CheckCache::new(enabled_cache_config());
        let key = CacheKey::new("m1", "document:a", "viewer", "user:alice");

        let generation = cache.generation();
        cache.invalidate_all();
        assert_eq!(cache.generation(), generation + 1);

        assert!(!cache.insert_if_current(key.clone(), true, generation).await);
        assert_eq!(cache.get(&key).await, None);

        assert!(cache.insert_if_current(key.clone(), true, cache.generation()).await);
        assert_eq!(cache.get(&key).await, Some(true));
    }

    /// Grants `user:alice` viewer on `document:d` while `granted` is set.
    /// While `gated`, a read takes its answer, signals `entered` and then
    /// waits for `release` before returning it.
    #[derive(Default)]
    struct GatedReader {
        granted: AtomicBool,
        gated: AtomicBool,
        entered: Notify,
        release: Notify,
    }

    #[async_trait]
    impl TupleReader for GatedReader {
        async fn read_tuples(
            &self,
            _object_type: &str,
            _object_id: &str,
            _relation: &str,
        ) -> DomainResult<Vec<StoredTupleRef>> {
            let tuples = if self.granted.load(Ordering::SeqCst) {
                vec![StoredTupleRef::new("user", "alice", None)]
            } else {
                Vec::new()
            };
            if self.gated.load(Ordering::SeqCst) {
                self.entered.notify_one();
                self.release.notified().await;
            }
            Ok(tuples)
        }

        async fn read_usersets_for_subject(
            &self,
            _subject_type: &str,
            _subject_id: &str,
            _subject_relation: Option<&str>,
            _relation: &str,
        ) -> DomainResult<Vec<ObjectRef>> {
            Ok(Vec::new())
        }
    }

    struct SingleModel(Arc<Model>);

    #[async_trait]
    impl ModelReader for SingleModel {
        async fn get_model(&self, _model_id: Option<&str>) -> DomainResult<Arc<Model>> {
            Ok(Arc::clone(&self.0))
        }
    }

    #[tokio::test]
    async fn test_revocation_during_check_is_not_cached() {
        let model = Model::new(
            AuthorizationModel::with_types(
                "1.1",
                vec![
                    TypeDefinition::new("user", vec![]),
                    TypeDefinition::new(
                        "document",
                        vec![RelationDefinition::with_constraints("viewer", ["user"], Userset::This)],
                    ),
                ],
            )
            .with_id("m1"),
        )
        .unwrap();
        let reader = Arc::new(GatedReader::default());
        reader.granted.store(true, Ordering::SeqCst);
        reader.gated.store(true, Ordering::SeqCst);
        let checker = Arc::new(CachedChecker::new(
            Arc::new(GraphResolver::new(
                Arc::clone(&reader),
                Arc::new(SingleModel(Arc::new(model))),
            )),
            Arc::new(CheckCache::new(enabled_cache_config())),
        ));
        let request = CheckRequest::new("user:alice", "viewer", "document:d");

        let in_flight = {
            let checker = Arc::clone(&checker);
            let request = request.clone();
            tokio::spawn(async move { checker.check(&request).await })
        };

        // The check has read the grant; revoke it before the check finishes
        reader.entered.notified().await;
        reader.gated.store(false, Ordering::SeqCst);
        reader.granted.store(false, Ordering::SeqCst);
        checker.cache().invalidate_all();
        reader.release.notify_one();

        assert_eq!(in_flight.await.unwrap(), Ok(CheckResult { allowed: true }));
        checker.cache().run_pending_tasks().await;
        assert_eq!(checker.cache().entry_count(), 0);
        assert_eq!(checker.check(&request).await, Ok(CheckResult { allowed: false }));
    }
}
