//! Types for the graph resolver.

use std::sync::Arc;

use tokio::time::Instant;

use super::config::ListObjectsStrategy;

/// Reference to an object returned by reverse lookups.
pub type ObjectRef = crate::model::Object;

/// Request for a permission check.
#[derive(Debug, Clone)]
pub struct CheckRequest {
    /// The user identifier (e.g., "user:alice" or "group:eng#member").
    pub user: String,
    /// The relation to check (e.g., "viewer").
    pub relation: String,
    /// The object identifier (e.g., "document:readme").
    pub object: String,
    /// Contextual tuples to consider during the check.
    /// Wrapped in Arc for cheap cloning.
    pub contextual_tuples: Arc<Vec<ContextualTuple>>,
    /// Model snapshot to evaluate against. Latest when `None`.
    pub authorization_model_id: Option<String>,
    /// Deadline for the whole request. Falls back to the resolver timeout.
    pub deadline: Option<Instant>,
}

impl CheckRequest {
    /// Creates a new CheckRequest without contextual tuples.
    pub fn new(
        user: impl Into<String>,
        relation: impl Into<String>,
        object: impl Into<String>,
    ) -> Self {
        Self {
            user: user.into(),
            relation: relation.into(),
            object: object.into(),
            contextual_tuples: Arc::new(Vec::new()),
            authorization_model_id: None,
            deadline: None,
        }
    }

    /// Attaches contextual tuples.
    pub fn with_contextual_tuples(mut self, contextual_tuples: Vec<ContextualTuple>) -> Self {
        self.contextual_tuples = Arc::new(contextual_tuples);
        self
    }

    /// Pins the request to a model snapshot.
    pub fn with_model_id(mut self, model_id: impl Into<String>) -> Self {
        self.authorization_model_id = Some(model_id.into());
        self
    }

    /// Sets a request deadline.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

/// A request-scoped tuple, visible to one Check or ListObjects call only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextualTuple {
    pub user: String,
    pub relation: String,
    pub object: String,
}

impl ContextualTuple {
    /// Creates a new ContextualTuple.
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

/// Result of a permission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckResult {
    /// Whether the check is allowed.
    pub allowed: bool,
}

/// Subject half of a stored tuple, as seen by the resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredTupleRef {
    pub user_type: String,
    pub user_id: String,
    pub user_relation: Option<String>,
}

impl StoredTupleRef {
    /// Creates a new StoredTupleRef.
    pub fn new(
        user_type: impl Into<String>,
        user_id: impl Into<String>,
        user_relation: Option<String>,
    ) -> Self {
        Self {
            user_type: user_type.into(),
            user_id: user_id.into(),
            user_relation,
        }
    }

    /// Returns true for `type:*` subjects.
    pub fn is_wildcard(&self) -> bool {
        self.user_id == crate::model::WILDCARD
    }
}

impl std::fmt::Display for StoredTupleRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.user_relation {
            Some(relation) => write!(f, "{}:{}#{}", self.user_type, self.user_id, relation),
            None => write!(f, "{}:{}", self.user_type, self.user_id),
        }
    }
}

// ============================================================
// Expand API Types
// ============================================================

/// Request for expanding a relation tree.
#[derive(Debug, Clone)]
pub struct ExpandRequest {
    /// The relation to expand (e.g., "viewer").
    pub relation: String,
    /// The object to expand (e.g., "document:readme").
    pub object: String,
    /// Model snapshot to evaluate against. Latest when `None`.
    pub authorization_model_id: Option<String>,
    /// Deadline for the whole request. Falls back to the resolver timeout.
    pub deadline: Option<Instant>,
}

impl ExpandRequest {
    /// Creates a new ExpandRequest.
    pub fn new(relation: impl Into<String>, object: impl Into<String>) -> Self {
        Self {
            relation: relation.into(),
            object: object.into(),
            authorization_model_id: None,
            deadline: None,
        }
    }

    /// Pins the request to a model snapshot.
    pub fn with_model_id(mut self, model_id: impl Into<String>) -> Self {
        self.authorization_model_id = Some(model_id.into());
        self
    }

    /// Sets a request deadline.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

/// Result of expanding a relation tree.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpandResult {
    /// The expansion tree showing how users relate to the object.
    pub tree: UsersetTree,
}

/// A tree structure representing the expansion of a relation.
#[derive(Debug, Clone, PartialEq)]
pub struct UsersetTree {
    /// The root node of the expansion tree.
    pub root: ExpandNode,
}

/// A node in the expansion tree.
///
/// Every node is named after the `type:id#relation` it was expanded for.
#[derive(Debug, Clone, PartialEq)]
pub enum ExpandNode {
    /// A leaf node: direct users or a followed reference.
    Leaf(ExpandLeaf),
    /// A union of child nodes (any child grants access).
    Union {
        /// Name of this union node.
        name: String,
        /// Child nodes in the union.
        nodes: Vec<ExpandNode>,
    },
    /// An intersection of child nodes (all children must grant access).
    Intersection {
        /// Name of this intersection node.
        name: String,
        /// Child nodes in the intersection.
        nodes: Vec<ExpandNode>,
    },
    /// A difference (exclusion) of nodes (base minus subtract).
    Difference {
        /// Name of this difference node.
        name: String,
        /// The base node.
        base: Box<ExpandNode>,
        /// The node to subtract from base.
        subtract: Box<ExpandNode>,
    },
    /// The node was already on the current expansion path.
    Cycle {
        /// Name of the revisited node.
        name: String,
    },
}

impl ExpandNode {
    /// Returns the name of this node.
    pub fn name(&self) -> &str {
        match self {
            ExpandNode::Leaf(leaf) => &leaf.name,
            ExpandNode::Union { name, .. } => name,
            ExpandNode::Intersection { name, .. } => name,
            ExpandNode::Difference { name, .. } => name,
            ExpandNode::Cycle { name } => name,
        }
    }
}

/// A leaf node in the expansion tree.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpandLeaf {
    /// Name of this leaf node.
    pub name: String,
    /// The type of leaf content.
    pub value: ExpandLeafValue,
}

/// The value of a leaf node.
#[derive(Debug, Clone, PartialEq)]
pub enum ExpandLeafValue {
    /// Direct subjects stored for the relation, as `type:id`, `type:*` or
    /// `type:id#relation` strings.
    Users(Vec<String>),
    /// A computed userset, expanded in place.
    Computed {
        /// The referenced userset (`type:id#relation`).
        userset: String,
        /// Expansion of the referenced userset.
        node: Box<ExpandNode>,
    },
    /// A tuple-to-userset, expanded once per related object.
    TupleToUserset {
        tupleset: String,
        computed_userset: String,
        /// One subtree per related object that defines `computed_userset`.
        nodes: Vec<ExpandNode>,
    },
}

// ============================================================
// ListObjects API Types
// ============================================================

/// Request for listing objects accessible to a user.
#[derive(Debug, Clone)]
pub struct ListObjectsRequest {
    /// The user to check permissions for.
    pub user: String,
    /// The relation to check (e.g., "viewer").
    pub relation: String,
    /// The object type to list (e.g., "document").
    pub object_type: String,
    /// Contextual tuples to consider during the check.
    pub contextual_tuples: Arc<Vec<ContextualTuple>>,
    /// Model snapshot to evaluate against. Latest when `None`.
    pub authorization_model_id: Option<String>,
    /// Deadline for the whole request. Falls back to the resolver timeout.
    pub deadline: Option<Instant>,
    /// Overrides the configured strategy.
    pub strategy: Option<ListObjectsStrategy>,
}

impl ListObjectsRequest {
    /// Creates a new ListObjectsRequest without contextual tuples.
    pub fn new(
        user: impl Into<String>,
        relation: impl Into<String>,
        object_type: impl Into<String>,
    ) -> Self {
        Self {
            user: user.into(),
            relation: relation.into(),
            object_type: object_type.into(),
            contextual_tuples: Arc::new(Vec::new()),
            authorization_model_id: None,
            deadline: None,
            strategy: None,
        }
    }

    /// Attaches contextual tuples.
    pub fn with_contextual_tuples(mut self, contextual_tuples: Vec<ContextualTuple>) -> Self {
        self.contextual_tuples = Arc::new(contextual_tuples);
        self
    }

    /// Pins the request to a model snapshot.
    pub fn with_model_id(mut self, model_id: impl Into<String>) -> Self {
        self.authorization_model_id = Some(model_id.into());
        self
    }

    /// Sets a request deadline.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Forces a candidate strategy.
    pub fn with_strategy(mut self, strategy: ListObjectsStrategy) -> Self {
        self.strategy = Some(strategy);
        self
    }
}

/// Result of listing objects accessible to a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListObjectsResult {
    /// Objects the user has the relation on, sorted.
    /// Format: "type:id" (e.g., "document:readme")
    pub objects: Vec<String>,
    /// Whether the results were truncated due to limits.
    pub truncated: bool,
}
