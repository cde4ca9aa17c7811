//! Expand: the full userset tree of a relation on an object.
//!
//! Unlike Check, expansion never short-circuits. Computed usersets and
//! tuple-to-userset branches are expanded in place, and a node already on the
//! current path is rendered as `ExpandNode::Cycle` instead of recursing.

use std::sync::Arc;

use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::{debug, instrument, warn};

use crate::error::{DomainError, DomainResult};
use crate::model::{constraints_admit, Userset};

use super::context::{node_key, parse_object, validate_relation, TraversalContext};
use super::graph_resolver::{BoxFuture, GraphResolver, Node};
use super::traits::{ModelReader, TupleReader};
use super::types::{ExpandLeaf, ExpandLeafValue, ExpandNode, ExpandRequest, ExpandResult, UsersetTree};

impl<T, M> GraphResolver<T, M>
where
    T: TupleReader + 'static,
    M: ModelReader + 'static,
{
    /// Expands a relation to show the tree structure of how users relate to an object.
    ///
    /// For `viewer: [user] or editor` on `document:readme`, the root is a
    /// union holding the direct users of `viewer` and the expansion of
    /// `document:readme#editor`.
    ///
    /// # Errors
    ///
    /// Same taxonomy as `check`: format errors, `ModelNotFound`,
    /// `UnknownRelation`, `DepthExceeded`, `Timeout`, `StoreUnavailable`.
    #[instrument(skip(self, request), fields(relation = %request.relation, object = %request.object))]
    pub async fn expand(&self, request: &ExpandRequest) -> DomainResult<ExpandResult> {
        validate_relation(&request.relation)?;
        let object = parse_object(&request.object)?;

        let deadline = self.deadline_for(request.deadline);
        let root = self
            .run_until(deadline, async {
                let ctx = self
                    .start(request.authorization_model_id.as_deref(), &[])
                    .await?;
                self.expand_relation(
                    object.object_type.clone(),
                    object.object_id.clone(),
                    request.relation.clone(),
                    ctx,
                )
                .await
            })
            .await?;

        Ok(ExpandResult {
            tree: UsersetTree { root },
        })
    }

    /// Expands `object_type:object_id#relation` (boxed for recursion).
    fn expand_relation(
        &self,
        object_type: String,
        object_id: String,
        relation: String,
        ctx: TraversalContext,
    ) -> BoxFuture<'_, DomainResult<ExpandNode>> {
        Box::pin(async move {
            let key = node_key(&object_type, &object_id, &relation);

            if ctx.visited.contains(&key) {
                debug!(node = %key, "cycle detected during expand");
                return Ok(ExpandNode::Cycle { name: key });
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
            let child_ctx = ctx.enter(&key);

            self.expand_userset(node, &key, &definition.rewrite, child_ctx)
                .await
        })
    }

    /// Expands one rewrite expression node (boxed for recursion).
    fn expand_userset<'a>(
        &'a self,
        node: Node<'a>,
        name: &'a str,
        userset: &'a Userset,
        ctx: TraversalContext,
    ) -> BoxFuture<'a, DomainResult<ExpandNode>> {
        Box::pin(async move {
            match userset {
                Userset::This => {
                    // Direct assignment - list the admitted subjects as stored
                    let tuples = self
                        .read_tuples(&ctx, node.object_type, node.object_id, node.relation)
                        .await?;

                    let users: Vec<String> = tuples
                        .into_iter()
                        .filter(|t| {
                            constraints_admit(
                                &node.definition.type_constraints,
                                &t.user_type,
                                t.user_relation.as_deref(),
                                t.is_wildcard(),
                            )
                        })
                        .map(|t| t.to_string())
                        .collect();

                    Ok(ExpandNode::Leaf(ExpandLeaf {
                        name: name.to_string(),
                        value: ExpandLeafValue::Users(users),
                    }))
                }

                Userset::ComputedUserset {
                    relation: computed_relation,
                } => {
                    let expanded = self
                        .expand_relation(
                            node.object_type.to_string(),
                            node.object_id.to_string(),
                            computed_relation.clone(),
                            ctx,
                        )
                        .await?;

                    Ok(ExpandNode::Leaf(ExpandLeaf {
                        name: name.to_string(),
                        value: ExpandLeafValue::Computed {
                            userset: node_key(node.object_type, node.object_id, computed_relation),
                            node: Box::new(expanded),
                        },
                    }))
                }

                Userset::TupleToUserset {
                    tupleset,
                    computed_userset,
                } => {
                    let related = self
                        .related_objects(node.object_type, node.object_id, tupleset, &ctx)
                        .await?;

                    let model = ctx.model();
                    let targets: Vec<(String, String)> = related
                        .into_iter()
                        .filter(|(object_type, _)| model.has_relation(object_type, computed_userset))
                        .collect();

                    let branches: Vec<_> = targets
                        .into_iter()
                        .map(|(object_type, object_id)| {
                            self.expand_relation(
                                object_type,
                                object_id,
                                computed_userset.clone(),
                                ctx.clone(),
                            )
                        })
                        .collect();
                    let nodes = self.expand_in_order(branches).await?;

                    Ok(ExpandNode::Leaf(ExpandLeaf {
                        name: name.to_string(),
                        value: ExpandLeafValue::TupleToUserset {
                            tupleset: tupleset.clone(),
                            computed_userset: computed_userset.clone(),
                            nodes,
                        },
                    }))
                }

                Userset::Union { children } => {
                    let branches: Vec<_> = children
                        .iter()
                        .map(|child| self.expand_userset(node, name, child, ctx.clone()))
                        .collect();
                    let nodes = self.expand_in_order(branches).await?;

                    Ok(ExpandNode::Union {
                        name: name.to_string(),
                        nodes,
                    })
                }

                Userset::Intersection { children } => {
                    let branches: Vec<_> = children
                        .iter()
                        .map(|child| self.expand_userset(node, name, child, ctx.clone()))
                        .collect();
                    let nodes = self.expand_in_order(branches).await?;

                    Ok(ExpandNode::Intersection {
                        name: name.to_string(),
                        nodes,
                    })
                }

                Userset::Exclusion { base, subtract } => {
                    let (base_node, subtract_node) = futures::future::try_join(
                        self.expand_userset(node, name, base, ctx.clone()),
                        self.expand_userset(node, name, subtract, ctx),
                    )
                    .await?;

                    Ok(ExpandNode::Difference {
                        name: name.to_string(),
                        base: Box::new(base_node),
                        subtract: Box::new(subtract_node),
                    })
                }
            }
        })
    }

    /// Runs expansions with bounded concurrency, keeping input order.
    async fn expand_in_order<'a>(
        &self,
        branches: Vec<BoxFuture<'a, DomainResult<ExpandNode>>>,
    ) -> DomainResult<Vec<ExpandNode>> {
        stream::iter(branches)
            .buffered(self.config.max_concurrency.max(1))
            .try_collect()
            .await
    }
}
