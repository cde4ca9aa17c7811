//! ListObjects: objects of a type on which a subject holds a relation.
//!
//! Two candidate strategies feed one confirmation pass:
//! - **Forward** enumerates objects of the requested type from the store.
//! - **Reverse** walks the model's reverse rewrite graph outward from the
//!   subject, following direct edges, computed usersets and tuple-to-userset
//!   rewrites through `read_usersets_for_subject`.
//!
//! Reverse expansion over-approximates across intersections and exclusions,
//! so every candidate from either strategy is confirmed with Check before it
//! is returned.

use std::collections::{BTreeSet, HashSet};

use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::{debug, instrument};

use crate::error::{DomainError, DomainResult};
use crate::model::{Subject, WILDCARD};

use super::config::ListObjectsStrategy;
use super::context::{parse_subject, validate_relation, TraversalContext};
use super::graph_resolver::GraphResolver;
use super::traits::{ModelReader, TupleReader};
use super::types::{ListObjectsRequest, ListObjectsResult, ObjectRef};

/// A set of subjects in the reverse walk: `type:id` or `type:id#relation`.
type SubjectNode = (String, String, Option<String>);

/// Candidate object ids, sorted, plus whether the candidate limit was hit.
struct Candidates {
    ids: BTreeSet<String>,
    truncated: bool,
}

impl Candidates {
    fn bounded(ids: impl IntoIterator<Item = String>, max_candidates: usize) -> Self {
        let mut ids: BTreeSet<String> = ids.into_iter().collect();
        let truncated = ids.len() > max_candidates;
        while ids.len() > max_candidates {
            ids.pop_last();
        }
        Self { ids, truncated }
    }
}

impl<T, M> GraphResolver<T, M>
where
    T: TupleReader + 'static,
    M: ModelReader + 'static,
{
    /// Lists objects of `request.object_type` on which the user has `request.relation`.
    ///
    /// The result is sorted and de-duplicated. `truncated` is set when either
    /// the candidate bound or `max_results` was reached. Any error from a
    /// confirming Check fails the whole request.
    #[instrument(
        skip(self, request),
        fields(user = %request.user, relation = %request.relation, object_type = %request.object_type)
    )]
    pub async fn list_objects(&self, request: &ListObjectsRequest) -> DomainResult<ListObjectsResult> {
        let subject = parse_subject(&request.user)?;
        if subject.is_wildcard() {
            return Err(DomainError::InvalidUserFormat {
                value: request.user.clone(),
            });
        }
        validate_relation(&request.relation)?;
        if request.object_type.is_empty()
            || request.object_type.contains(':')
            || request.object_type.contains('#')
        {
            return Err(DomainError::InvalidObjectFormat {
                value: request.object_type.clone(),
            });
        }

        let deadline = self.deadline_for(request.deadline);
        self.run_until(deadline, async {
            let ctx = self
                .start(
                    request.authorization_model_id.as_deref(),
                    &request.contextual_tuples,
                )
                .await?;
            ctx.model().resolve(&request.object_type, &request.relation)?;

            let strategy = request.strategy.unwrap_or(self.config.list_objects.strategy);
            let (strategy, candidates) = match strategy {
                ListObjectsStrategy::Forward => (
                    ListObjectsStrategy::Forward,
                    self.forward_candidates(&request.object_type, &ctx).await?,
                ),
                ListObjectsStrategy::Reverse => (
                    ListObjectsStrategy::Reverse,
                    self.reverse_candidates(&subject, request, &ctx).await?,
                ),
                ListObjectsStrategy::Auto => match self.probe_forward(&request.object_type, &ctx).await? {
                    Some(candidates) => (ListObjectsStrategy::Forward, candidates),
                    None => (
                        ListObjectsStrategy::Reverse,
                        self.reverse_candidates(&subject, request, &ctx).await?,
                    ),
                },
            };

            debug!(
                ?strategy,
                candidates = candidates.ids.len(),
                truncated = candidates.truncated,
                "list_objects candidates gathered"
            );
            metrics::counter!(
                "relgraph_list_objects_total",
                "strategy" => if strategy == ListObjectsStrategy::Forward { "forward" } else { "reverse" }
            )
            .increment(1);

            self.confirm_candidates(&subject, request, candidates, &ctx)
                .await
        })
        .await
    }

    /// `Auto` probe: forward candidates when the type has between one and
    /// `forward_threshold` stored objects, `None` otherwise.
    async fn probe_forward(
        &self,
        object_type: &str,
        ctx: &TraversalContext,
    ) -> DomainResult<Option<Candidates>> {
        let threshold = self.config.list_objects.forward_threshold;
        let probe = self
            .list_objects_by_type(ctx, object_type, threshold.saturating_add(1))
            .await?;

        if probe.is_empty() || probe.len() > threshold {
            return Ok(None);
        }

        let contextual = ctx.scope.contextual_object_ids(object_type).map(str::to_string);
        Ok(Some(Candidates::bounded(
            probe.into_iter().chain(contextual),
            self.config.list_objects.max_candidates,
        )))
    }

    /// Forward strategy: every object of the type known to the store or to
    /// the request's contextual tuples.
    async fn forward_candidates(
        &self,
        object_type: &str,
        ctx: &TraversalContext,
    ) -> DomainResult<Candidates> {
        let max_candidates = self.config.list_objects.max_candidates;
        let stored = self
            .list_objects_by_type(ctx, object_type, max_candidates.saturating_add(1))
            .await?;

        let contextual = ctx.scope.contextual_object_ids(object_type).map(str::to_string);
        Ok(Candidates::bounded(
            stored.into_iter().chain(contextual),
            max_candidates,
        ))
    }

    /// Reverse strategy: breadth-first walk from the subject (and its type
    /// wildcard) across the reverse rewrite graph.
    async fn reverse_candidates(
        &self,
        subject: &Subject,
        request: &ListObjectsRequest,
        ctx: &TraversalContext,
    ) -> DomainResult<Candidates> {
        let max_candidates = self.config.list_objects.max_candidates;

        let mut frontier: Vec<SubjectNode> = vec![(
            subject.subject_type.clone(),
            subject.subject_id.clone(),
            subject.relation.clone(),
        )];
        if subject.relation.is_none() {
            frontier.push((subject.subject_type.clone(), WILDCARD.to_string(), None));
        }

        let mut visited: HashSet<SubjectNode> = frontier.iter().cloned().collect();
        let mut ids = BTreeSet::new();

        while !frontier.is_empty() {
            let reached: Vec<Vec<(String, String, String)>> = stream::iter(frontier)
                .map(|node| self.reverse_step(node, ctx))
                .buffer_unordered(self.config.max_concurrency.max(1))
                .try_collect()
                .await?;

            let mut next = Vec::new();
            for (object_type, object_id, relation) in reached.into_iter().flatten() {
                if object_type == request.object_type && relation == request.relation {
                    ids.insert(object_id.clone());
                    if ids.len() > max_candidates {
                        return Ok(Candidates::bounded(ids, max_candidates));
                    }
                }
                let node = (object_type, object_id, Some(relation));
                if visited.insert(node.clone()) {
                    next.push(node);
                }
            }
            frontier = next;
        }

        Ok(Candidates::bounded(ids, max_candidates))
    }

    /// One reverse hop: every `(type, id, relation)` whose rewrite may admit
    /// the subjects of `node`.
    async fn reverse_step(
        &self,
        node: SubjectNode,
        ctx: &TraversalContext,
    ) -> DomainResult<Vec<(String, String, String)>> {
        let (subject_type, subject_id, subject_relation) = node;
        let model = ctx.model();
        let mut reached = Vec::new();

        // Direct edges admitted by type constraints
        let wildcard = subject_id == WILDCARD;
        for (object_type, relation) in
            model.direct_relations_accepting(&subject_type, subject_relation.as_deref(), wildcard)
        {
            for object in self
                .objects_for_subject(&subject_type, &subject_id, subject_relation.as_deref(), relation, ctx)
                .await?
            {
                if object.object_type == object_type {
                    reached.push((object.object_type, object.object_id, relation.to_string()));
                }
            }
        }

        let Some(relation) = subject_relation else {
            return Ok(reached);
        };

        // Relations on the same object that compute from this one
        for dependent in model.computed_dependents(&subject_type, &relation) {
            reached.push((subject_type.clone(), subject_id.clone(), dependent.clone()));
        }

        // Objects that point at this one through a tupleset
        for dependent in model.ttu_dependents(&relation) {
            for object in self
                .objects_for_subject(&subject_type, &subject_id, None, &dependent.tupleset, ctx)
                .await?
            {
                if object.object_type == dependent.object_type {
                    reached.push((object.object_type, object.object_id, dependent.relation.clone()));
                }
            }
        }

        Ok(reached)
    }

    /// Stored and contextual objects holding `(object, relation, subject)`.
    async fn objects_for_subject(
        &self,
        subject_type: &str,
        subject_id: &str,
        subject_relation: Option<&str>,
        relation: &str,
        ctx: &TraversalContext,
    ) -> DomainResult<Vec<ObjectRef>> {
        let mut objects = self
            .read_usersets_for_subject(ctx, subject_type, subject_id, subject_relation, relation)
            .await?;
        objects.extend(ctx.scope.contextual_objects_for_subject(
            subject_type,
            subject_id,
            subject_relation,
            relation,
        ));
        Ok(objects)
    }

    /// Confirms candidates with Check, in sorted order, up to `max_results`.
    async fn confirm_candidates(
        &self,
        subject: &Subject,
        request: &ListObjectsRequest,
        candidates: Candidates,
        ctx: &TraversalContext,
    ) -> DomainResult<ListObjectsResult> {
        let max_results = self.config.list_objects.max_results;

        let mut objects: Vec<String> = stream::iter(candidates.ids)
            .map(|object_id| async move {
                let allowed = self
                    .resolve_check(
                        subject,
                        request.object_type.clone(),
                        object_id.clone(),
                        request.relation.clone(),
                        ctx.clone(),
                    )
                    .await?;
                Ok::<_, DomainError>(allowed.then_some(object_id))
            })
            .buffered(self.config.max_concurrency.max(1))
            .try_filter_map(|confirmed| async move { Ok(confirmed) })
            .take(max_results.saturating_add(1))
            .map_ok(|object_id| format!("{}:{}", request.object_type, object_id))
            .try_collect()
            .await?;

        let truncated = candidates.truncated || objects.len() > max_results;
        objects.truncate(max_results);

        Ok(ListObjectsResult { objects, truncated })
    }
}
