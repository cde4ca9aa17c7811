//! Graph resolver: the rewrite evaluator and the Check entry point.
//!
//! The resolver performs async graph traversal to determine
//! if a user has a specific permission on an object.
//!
//! - **Parallel Execution**: union and intersection children, userset
//!   recursions of direct tuples and tuple-to-userset branches fan out through
//!   bounded `buffer_unordered` with short-circuiting. Store reads across the
//!   whole request share one `max_concurrency` semaphore.
//!
//! - **Cycle Detection**: tracks the `(type, id, relation)` nodes of the
//!   current path in an `Arc<HashSet>`. Revisiting a node evaluates to false.
//!
//! - **Depth Limiting**: every node entered counts one level. Reaching
//!   `max_depth` (default 25) fails with `DepthExceeded`.
//!
//! - **Deadlines**: the whole request runs under `timeout_at`; expiry drops
//!   every in-flight branch and fails with `Timeout`.

use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::time::{timeout_at, Instant};
use tracing::{debug, instrument, warn};

use crate::error::{DomainError, DomainResult};
use crate::model::{constraints_admit, Model, RelationDefinition, Subject, Userset};

use super::config::ResolverConfig;
use super::context::{
    node_key, parse_object, parse_subject, validate_relation, RequestScope, TraversalContext,
};
use super::fanout;
use super::traits::{ModelReader, TupleReader};
use super::types::{CheckRequest, CheckResult, ContextualTuple, ObjectRef, StoredTupleRef};

/// Type alias for boxed futures used in recursive async functions.
pub(crate) type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The node a rewrite expression is being evaluated for.
#[derive(Debug, Clone, Copy)]
pub(super) struct Node<'n> {
    pub(super) object_type: &'n str,
    pub(super) object_id: &'n str,
    pub(super) relation: &'n str,
    pub(super) definition: &'n RelationDefinition,
}

/// Graph resolver for permission checks.
///
/// Holds no per-request state; every call builds its own traversal context
/// around one pinned model snapshot, so a single resolver can serve
/// concurrent requests.
pub struct GraphResolver<T, M> {
    pub(super) tuple_reader: Arc<T>,
    pub(super) model_reader: Arc<M>,
    pub(super) config: ResolverConfig,
}

impl<T, M> GraphResolver<T, M>
where
    T: TupleReader + 'static,
    M: ModelReader + 'static,
{
    /// Creates a new graph resolver.
    pub fn new(tuple_reader: Arc<T>, model_reader: Arc<M>) -> Self {
        Self::with_config(tuple_reader, model_reader, ResolverConfig::default())
    }

    /// Creates a new graph resolver with custom configuration.
    pub fn with_config(tuple_reader: Arc<T>, model_reader: Arc<M>, config: ResolverConfig) -> Self {
        Self {
            tuple_reader,
            model_reader,
            config,
        }
    }

    /// Returns the resolver configuration.
    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Fetches the model snapshot a request with `model_id` would pin.
    pub async fn model_snapshot(&self, model_id: Option<&str>) -> DomainResult<Arc<Model>> {
        self.model_reader.get_model(model_id).await
    }

    /// Performs a permission check.
    ///
    /// # Errors
    ///
    /// - `InvalidUserFormat`, `InvalidObjectFormat`, `InvalidRelationFormat`
    ///   for malformed input (wildcard users are rejected)
    /// - `ModelNotFound` if the requested snapshot does not exist
    /// - `UnknownRelation` if the model does not define a relation on the path
    /// - `DepthExceeded`, `Timeout`, `StoreUnavailable`
    #[instrument(
        skip(self, request),
        fields(user = %request.user, relation = %request.relation, object = %request.object)
    )]
    pub async fn check(&self, request: &CheckRequest) -> DomainResult<CheckResult> {
        let subject = parse_subject(&request.user)?;
        if subject.is_wildcard() {
            return Err(DomainError::InvalidUserFormat {
                value: request.user.clone(),
            });
        }
        validate_relation(&request.relation)?;
        let object = parse_object(&request.object)?;

        let deadline = self.deadline_for(request.deadline);
        let result = self
            .run_until(deadline, async {
                let ctx = self
                    .start(
                        request.authorization_model_id.as_deref(),
                        &request.contextual_tuples,
                    )
                    .await?;
                self.resolve_check(
                    &subject,
                    object.object_type.clone(),
                    object.object_id.clone(),
                    request.relation.clone(),
                    ctx,
                )
                .await
            })
            .await;

        let outcome = match &result {
            Ok(true) => "allowed",
            Ok(false) => "denied",
            Err(_) => "error",
        };
        metrics::counter!("relgraph_check_total", "outcome" => outcome).increment(1);
        debug!(outcome, "check resolved");

        result.map(|allowed| CheckResult { allowed })
    }

    /// Deadline for a request: its own, or now plus the configured timeout.
    pub(super) fn deadline_for(&self, requested: Option<Instant>) -> Instant {
        requested.unwrap_or_else(|| Instant::now() + self.config.timeout)
    }

    /// Runs `operation` until `deadline`, mapping expiry to `Timeout`.
    pub(super) async fn run_until<F, R>(&self, deadline: Instant, operation: F) -> DomainResult<R>
    where
        F: Future<Output = DomainResult<R>>,
    {
        let budget_ms = deadline
            .saturating_duration_since(Instant::now())
            .as_millis() as u64;
        match timeout_at(deadline, operation).await {
            Ok(result) => result,
            Err(_) => {
                warn!(budget_ms, "request deadline exceeded");
                Err(DomainError::Timeout {
                    duration_ms: budget_ms,
                })
            }
        }
    }

    /// Pins a model snapshot and builds the root traversal context.
    pub(super) async fn start(
        &self,
        model_id: Option<&str>,
        contextual_tuples: &[ContextualTuple],
    ) -> DomainResult<TraversalContext> {
        let model = self.model_reader.get_model(model_id).await?;
        let scope = RequestScope::new(model, contextual_tuples, self.config.max_concurrency)?;
        Ok(TraversalContext::new(Arc::new(scope)))
    }

    /// Reads the stored subjects of one relation on one object under the
    /// request's read bound.
    pub(super) async fn read_tuples(
        &self,
        ctx: &TraversalContext,
        object_type: &str,
        object_id: &str,
        relation: &str,
    ) -> DomainResult<Vec<StoredTupleRef>> {
        let _permit = ctx.scope.read_permit().await?;
        self.tuple_reader
            .read_tuples(object_type, object_id, relation)
            .await
            .map_err(log_store_error)
    }

    /// Reverse lookup under the request's read bound.
    pub(super) async fn read_usersets_for_subject(
        &self,
        ctx: &TraversalContext,
        subject_type: &str,
        subject_id: &str,
        subject_relation: Option<&str>,
        relation: &str,
    ) -> DomainResult<Vec<ObjectRef>> {
        let _permit = ctx.scope.read_permit().await?;
        self.tuple_reader
            .read_usersets_for_subject(subject_type, subject_id, subject_relation, relation)
            .await
            .map_err(log_store_error)
    }

    /// Object enumeration under the request's read bound.
    pub(super) async fn list_objects_by_type(
        &self,
        ctx: &TraversalContext,
        object_type: &str,
        limit: usize,
    ) -> DomainResult<Vec<String>> {
        let _permit = ctx.scope.read_permit().await?;
        self.tuple_reader
            .list_objects_by_type(object_type, limit)
            .await
            .map_err(log_store_error)
    }

    /// Evaluates `relation` on `object_type:object_id` for `subject` (boxed for recursion).
    pub(super) fn resolve_check<'a>(
        &'a self,
        subject: &'a Subject,
        object_type: String,
        object_id: String,
        relation: String,
        ctx: TraversalContext,
    ) -> BoxFuture<'a, DomainResult<bool>> {
        Box::pin(async move {
            let key = node_key(&object_type, &object_id, &relation);

            // A relation cannot prove itself through a cycle
            if ctx.visited.contains(&key) {
                debug!(node = %key, "cycle detected, node evaluates to false");
                return Ok(false);
            }

            if ctx.depth >= self.config.max_depth {
                warn!(node = %key, max_depth = self.config.max_depth, "depth limit exceeded");
                return Err(DomainError::DepthExceeded {
                    max_depth: self.config.max_depth,
                });
            }

            let scope = Arc::clone(&ctx.scope);
            let definition = scope.model().resolve(&object_type, &relation)?;
            let node = Node {
                object_type: &object_type,
                object_id: &object_id,
                relation: &relation,
                definition,
            };

            self.resolve_userset(subject, node, &definition.rewrite, ctx.enter(&key))
                .await
        })
    }

    /// Evaluates one rewrite expression node (boxed for recursion).
    fn resolve_userset<'a>(
        &'a self,
        subject: &'a Subject,
        node: Node<'a>,
        userset: &'a Userset,
        ctx: TraversalContext,
    ) -> BoxFuture<'a, DomainResult<bool>> {
        Box::pin(async move {
            match userset {
                Userset::This => self.resolve_direct(subject, node, ctx).await,

                Userset::ComputedUserset { relation } => {
                    // Same object, another relation
                    self.resolve_check(
                        subject,
                        node.object_type.to_string(),
                        node.object_id.to_string(),
                        relation.clone(),
                        ctx,
                    )
                    .await
                }

                Userset::TupleToUserset {
                    tupleset,
                    computed_userset,
                } => {
                    self.resolve_tuple_to_userset(subject, node, tupleset, computed_userset, ctx)
                        .await
                }

                Userset::Union { children } => {
                    let branches: Vec<_> = children
                        .iter()
                        .map(|child| self.resolve_userset(subject, node, child, ctx.clone()))
                        .collect();
                    fanout::any_of(branches, self.config.max_concurrency).await
                }

                Userset::Intersection { children } => {
                    let branches: Vec<_> = children
                        .iter()
                        .map(|child| self.resolve_userset(subject, node, child, ctx.clone()))
                        .collect();
                    fanout::all_of(branches, self.config.max_concurrency).await
                }

                Userset::Exclusion { base, subtract } => {
                    // Subtract only matters when base holds
                    if !self
                        .resolve_userset(subject, node, base, ctx.clone())
                        .await?
                    {
                        return Ok(false);
                    }
                    let excluded = self.resolve_userset(subject, node, subtract, ctx).await?;
                    Ok(!excluded)
                }
            }
        })
    }

    /// Resolves a direct assignment.
    ///
    /// Contextual tuples are considered before stored ones. Tuples whose
    /// subject is not admitted by the relation's type constraints are ignored.
    /// Exact and wildcard matches are decided before any userset recursion.
    async fn resolve_direct(
        &self,
        subject: &Subject,
        node: Node<'_>,
        ctx: TraversalContext,
    ) -> DomainResult<bool> {
        let admitted = |tuple: &StoredTupleRef| {
            let allowed = constraints_admit(
                &node.definition.type_constraints,
                &tuple.user_type,
                tuple.user_relation.as_deref(),
                tuple.is_wildcard(),
            );
            if !allowed {
                debug!(subject = %tuple, relation = node.relation, "tuple subject not admitted by type constraints");
            }
            allowed
        };

        let contextual: Vec<StoredTupleRef> = ctx
            .scope
            .contextual_tuples(node.object_type, node.object_id, node.relation)
            .iter()
            .filter(|tuple| admitted(*tuple))
            .cloned()
            .collect();
        if contextual.iter().any(|tuple| direct_match(subject, tuple)) {
            return Ok(true);
        }

        let stored: Vec<StoredTupleRef> = self
            .read_tuples(&ctx, node.object_type, node.object_id, node.relation)
            .await?
            .into_iter()
            .filter(|tuple| admitted(tuple))
            .collect();
        if stored.iter().any(|tuple| direct_match(subject, tuple)) {
            return Ok(true);
        }

        // Userset subjects (e.g., group:eng#member) need their own evaluation
        let mut seen = HashSet::new();
        let usersets: Vec<(String, String, String)> = contextual
            .into_iter()
            .chain(stored)
            .filter_map(|tuple| {
                tuple
                    .user_relation
                    .map(|relation| (tuple.user_type, tuple.user_id, relation))
            })
            .filter(|userset| seen.insert(userset.clone()))
            .collect();

        let branches: Vec<_> = usersets
            .into_iter()
            .map(|(user_type, user_id, relation)| {
                self.resolve_check(subject, user_type, user_id, relation, ctx.clone())
            })
            .collect();
        fanout::any_of(branches, self.config.max_concurrency).await
    }

    /// Resolves a tuple-to-userset relation (e.g., viewer from parent).
    async fn resolve_tuple_to_userset(
        &self,
        subject: &Subject,
        node: Node<'_>,
        tupleset: &str,
        computed_userset: &str,
        ctx: TraversalContext,
    ) -> DomainResult<bool> {
        let related = self
            .related_objects(node.object_type, node.object_id, tupleset, &ctx)
            .await?;

        let model = ctx.model();
        let branches: Vec<(String, String)> = related
            .into_iter()
            .filter(|(object_type, _)| {
                let defined = model.has_relation(object_type, computed_userset);
                if !defined {
                    debug!(
                        object_type = %object_type,
                        relation = computed_userset,
                        "related object type does not define relation, skipping"
                    );
                }
                defined
            })
            .collect();

        let branches: Vec<_> = branches
            .into_iter()
            .map(|(object_type, object_id)| {
                self.resolve_check(
                    subject,
                    object_type,
                    object_id,
                    computed_userset.to_string(),
                    ctx.clone(),
                )
            })
            .collect();
        fanout::any_of(branches, self.config.max_concurrency).await
    }

    /// Objects reachable from `object_type:object_id` through `tupleset`,
    /// contextual tuples included, de-duplicated in first-seen order.
    ///
    /// Only concrete subjects are followed; usersets and wildcards on a
    /// tupleset relation do not name an object.
    pub(super) async fn related_objects(
        &self,
        object_type: &str,
        object_id: &str,
        tupleset: &str,
        ctx: &TraversalContext,
    ) -> DomainResult<Vec<(String, String)>> {
        let constraints = &ctx.model().resolve(object_type, tupleset)?.type_constraints;

        let stored = self.read_tuples(ctx, object_type, object_id, tupleset).await?;

        let mut seen = HashSet::new();
        Ok(ctx
            .scope
            .contextual_tuples(object_type, object_id, tupleset)
            .iter()
            .chain(stored.iter())
            .filter(|tuple| tuple.user_relation.is_none() && !tuple.is_wildcard())
            .filter(|tuple| constraints_admit(constraints, &tuple.user_type, None, false))
            .map(|tuple| (tuple.user_type.clone(), tuple.user_id.clone()))
            .filter(|object| seen.insert(object.clone()))
            .collect())
    }
}

/// True if a stored subject names the query subject without recursion:
/// the same subject, or a wildcard of its type.
fn direct_match(subject: &Subject, tuple: &StoredTupleRef) -> bool {
    if tuple.user_type != subject.subject_type {
        return false;
    }
    match (&tuple.user_relation, &subject.relation) {
        (None, None) => tuple.user_id == subject.subject_id || tuple.is_wildcard(),
        (Some(tuple_relation), Some(subject_relation)) => {
            tuple_relation == subject_relation && tuple.user_id == subject.subject_id
        }
        _ => false,
    }
}

pub(super) fn log_store_error(e: DomainError) -> DomainError {
    warn!(error = %e, "tuple store read failed");
    e
}
