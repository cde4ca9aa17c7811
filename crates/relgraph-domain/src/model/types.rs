//! Core type definitions for the authorization model.

use std::fmt;

use serde::{Deserialize, Serialize};

/// An object identifier (e.g., "document:readme").
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Object {
    /// The type portion (e.g., "document").
    pub object_type: String,
    /// The ID portion (e.g., "readme").
    pub object_id: String,
}

impl Object {
    /// Creates a new Object from type and ID.
    pub fn new(object_type: impl Into<String>, object_id: impl Into<String>) -> Self {
        Self {
            object_type: object_type.into(),
            object_id: object_id.into(),
        }
    }

    /// Parses an object from "type:id" format.
    pub fn parse(value: &str) -> Result<Self, &'static str> {
        let (object_type, object_id) = value
            .split_once(':')
            .ok_or("object must be in 'type:id' format")?;
        if object_type.is_empty() || object_id.is_empty() {
            return Err("object type and id cannot be empty");
        }
        if object_id.contains('#') {
            return Err("object id cannot contain '#'");
        }
        Ok(Self::new(object_type, object_id))
    }
}

impl fmt::Display for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.object_type, self.object_id)
    }
}

/// The subject of a relationship tuple.
///
/// Three shapes are accepted:
/// - `user:alice` - a concrete subject
/// - `user:*` - every subject of type `user`
/// - `group:eng#member` - the userset of `member` on `group:eng`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Subject {
    pub subject_type: String,
    pub subject_id: String,
    pub relation: Option<String>,
}

/// Identifier used by wildcard subjects.
pub const WILDCARD: &str = "*";

impl Subject {
    /// Creates a concrete subject (`type:id`).
    pub fn new(subject_type: impl Into<String>, subject_id: impl Into<String>) -> Self {
        Self {
            subject_type: subject_type.into(),
            subject_id: subject_id.into(),
            relation: None,
        }
    }

    /// Creates a userset subject (`type:id#relation`).
    pub fn userset(
        subject_type: impl Into<String>,
        subject_id: impl Into<String>,
        relation: impl Into<String>,
    ) -> Self {
        Self {
            subject_type: subject_type.into(),
            subject_id: subject_id.into(),
            relation: Some(relation.into()),
        }
    }

    /// Creates a wildcard subject (`type:*`).
    pub fn wildcard(subject_type: impl Into<String>) -> Self {
        Self::new(subject_type, WILDCARD)
    }

    /// Parses a subject from `type:id`, `type:*` or `type:id#relation`.
    pub fn parse(value: &str) -> Result<Self, &'static str> {
        let (object_part, relation) = match value.split_once('#') {
            Some((object_part, relation)) => {
                if relation.is_empty() {
                    return Err("userset relation cannot be empty");
                }
                (object_part, Some(relation.to_string()))
            }
            None => (value, None),
        };
        let (subject_type, subject_id) = object_part
            .split_once(':')
            .ok_or("subject must be in 'type:id' format")?;
        if subject_type.is_empty() || subject_id.is_empty() {
            return Err("subject type and id cannot be empty");
        }
        if subject_id == WILDCARD && relation.is_some() {
            return Err("wildcard subjects cannot carry a relation");
        }
        Ok(Self {
            subject_type: subject_type.to_string(),
            subject_id: subject_id.to_string(),
            relation,
        })
    }

    /// Returns true for `type:*` subjects.
    pub fn is_wildcard(&self) -> bool {
        self.subject_id == WILDCARD
    }

    /// Returns the object half of a userset subject (`group:eng` for `group:eng#member`).
    pub fn as_object(&self) -> Object {
        Object::new(&self.subject_type, &self.subject_id)
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.relation {
            Some(relation) => write!(f, "{}:{}#{}", self.subject_type, self.subject_id, relation),
            None => write!(f, "{}:{}", self.subject_type, self.subject_id),
        }
    }
}

/// An authorization model defining types and their relations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorizationModel {
    /// Model identifier assigned by the model store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Schema version (e.g., "1.1").
    pub schema_version: String,
    /// Type definitions in the model.
    pub type_definitions: Vec<TypeDefinition>,
}

impl AuthorizationModel {
    /// Creates an empty model with the given schema version.
    pub fn new(schema_version: impl Into<String>) -> Self {
        Self {
            id: None,
            schema_version: schema_version.into(),
            type_definitions: Vec::new(),
        }
    }

    /// Creates a model from a list of type definitions.
    pub fn with_types(
        schema_version: impl Into<String>,
        type_definitions: Vec<TypeDefinition>,
    ) -> Self {
        Self {
            id: None,
            schema_version: schema_version.into(),
            type_definitions,
        }
    }

    /// Sets the model identifier.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// A type definition within the authorization model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeDefinition {
    /// The type name (e.g., "document", "folder").
    pub type_name: String,
    /// Relations defined on this type.
    #[serde(default)]
    pub relations: Vec<RelationDefinition>,
}

impl TypeDefinition {
    /// Creates a type definition.
    pub fn new(type_name: impl Into<String>, relations: Vec<RelationDefinition>) -> Self {
        Self {
            type_name: type_name.into(),
            relations,
        }
    }
}

/// A relation definition on a type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationDefinition {
    /// The relation name.
    pub name: String,
    /// Subject types allowed on direct tuples for this relation.
    /// Empty means any subject is accepted.
    #[serde(default)]
    pub type_constraints: Vec<TypeConstraint>,
    /// The userset rewrite for this relation.
    pub rewrite: Userset,
}

impl RelationDefinition {
    /// Creates a relation definition without type constraints.
    pub fn new(name: impl Into<String>, rewrite: Userset) -> Self {
        Self {
            name: name.into(),
            type_constraints: Vec::new(),
            rewrite,
        }
    }

    /// Creates a relation definition with type constraints.
    pub fn with_constraints<C: Into<TypeConstraint>>(
        name: impl Into<String>,
        type_constraints: impl IntoIterator<Item = C>,
        rewrite: Userset,
    ) -> Self {
        Self {
            name: name.into(),
            type_constraints: type_constraints.into_iter().map(Into::into).collect(),
            rewrite,
        }
    }
}

/// An allowed subject type on a directly assignable relation.
///
/// Written as `user`, `user:*` or `group#member`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeConstraint {
    pub type_name: String,
}

impl TypeConstraint {
    /// Splits the constraint into its type, optional relation and wildcard flag.
    pub fn parts(&self) -> (&str, Option<&str>, bool) {
        if let Some((type_part, relation)) = self.type_name.split_once('#') {
            (type_part, Some(relation), false)
        } else if let Some(type_part) = self.type_name.strip_suffix(":*") {
            (type_part, None, true)
        } else {
            (self.type_name.as_str(), None, false)
        }
    }

    /// Returns true if a subject of this shape may appear on a direct tuple.
    pub fn admits(&self, subject_type: &str, subject_relation: Option<&str>, wildcard: bool) -> bool {
        let (constraint_type, constraint_relation, constraint_wildcard) = self.parts();
        constraint_type == subject_type
            && constraint_relation == subject_relation
            && constraint_wildcard == wildcard
    }
}

impl From<&str> for TypeConstraint {
    fn from(value: &str) -> Self {
        Self {
            type_name: value.to_string(),
        }
    }
}

impl From<String> for TypeConstraint {
    fn from(type_name: String) -> Self {
        Self { type_name }
    }
}

/// Returns true if the constraints admit a subject of the given shape.
/// An empty constraint list admits everything.
pub fn constraints_admit(
    constraints: &[TypeConstraint],
    subject_type: &str,
    subject_relation: Option<&str>,
    wildcard: bool,
) -> bool {
    constraints.is_empty()
        || constraints
            .iter()
            .any(|c| c.admits(subject_type, subject_relation, wildcard))
}

/// A userset defines how a relation is computed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Userset {
    /// Direct assignment (this).
    This,
    /// Computed userset from another relation.
    ComputedUserset { relation: String },
    /// Tuple to userset (relation from parent).
    TupleToUserset {
        tupleset: String,
        computed_userset: String,
    },
    /// Union of multiple usersets.
    Union { children: Vec<Userset> },
    /// Intersection of multiple usersets.
    Intersection { children: Vec<Userset> },
    /// Exclusion (base but not subtract).
    Exclusion {
        base: Box<Userset>,
        subtract: Box<Userset>,
    },
}

impl Userset {
    /// Shorthand for `ComputedUserset`.
    pub fn computed(relation: impl Into<String>) -> Self {
        Userset::ComputedUserset {
            relation: relation.into(),
        }
    }

    /// Shorthand for `TupleToUserset`.
    pub fn tuple_to_userset(tupleset: impl Into<String>, computed_userset: impl Into<String>) -> Self {
        Userset::TupleToUserset {
            tupleset: tupleset.into(),
            computed_userset: computed_userset.into(),
        }
    }

    /// Returns true if `This` appears anywhere in the expression.
    pub fn contains_this(&self) -> bool {
        match self {
            Userset::This => true,
            Userset::ComputedUserset { .. } | Userset::TupleToUserset { .. } => false,
            Userset::Union { children } | Userset::Intersection { children } => {
                children.iter().any(Userset::contains_this)
            }
            Userset::Exclusion { base, subtract } => base.contains_this() || subtract.contains_this(),
        }
    }

    /// Visits every node of the expression, depth first.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Userset)) {
        visit(self);
        match self {
            Userset::This | Userset::ComputedUserset { .. } | Userset::TupleToUserset { .. } => {}
            Userset::Union { children } | Userset::Intersection { children } => {
                for child in children {
                    child.walk(visit);
                }
            }
            Userset::Exclusion { base, subtract } => {
                base.walk(visit);
                subtract.walk(visit);
            }
        }
    }
}
