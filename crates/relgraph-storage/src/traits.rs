//! DataStore trait definition and shared validation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::{StorageError, StorageResult};

/// Maximum allowed relation name length.
pub const MAX_RELATION_LENGTH: usize = 50;

/// Maximum allowed object ID length (the part after `type:`).
pub const MAX_OBJECT_ID_LENGTH: usize = 256;

/// Maximum allowed user length (the full `type:id` or `type:id#relation`).
pub const MAX_USER_ID_LENGTH: usize = 512;

/// Filter for reading tuples. Unset fields match everything.
#[derive(Debug, Clone, Default)]
pub struct TupleFilter {
    /// Filter by object type.
    pub object_type: Option<String>,
    /// Filter by object ID.
    pub object_id: Option<String>,
    /// Filter by relation.
    pub relation: Option<String>,
    /// Filter by user (`type:id` or `type:id#relation`).
    pub user: Option<String>,
}

/// A stored tuple.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StoredTuple {
    pub object_type: String,
    pub object_id: String,
    pub relation: String,
    pub user_type: String,
    pub user_id: String,
    pub user_relation: Option<String>,
}

impl StoredTuple {
    /// Creates a new StoredTuple.
    pub fn new(
        object_type: impl Into<String>,
        object_id: impl Into<String>,
        relation: impl Into<String>,
        user_type: impl Into<String>,
        user_id: impl Into<String>,
        user_relation: Option<String>,
    ) -> Self {
        Self {
            object_type: object_type.into(),
            object_id: object_id.into(),
            relation: relation.into(),
            user_type: user_type.into(),
            user_id: user_id.into(),
            user_relation,
        }
    }

    /// Builds a tuple from its wire form: `user`, `relation`, `type:id` object.
    pub fn parse(user: &str, relation: &str, object: &str) -> StorageResult<Self> {
        let (object_type, object_id) =
            object
                .split_once(':')
                .ok_or_else(|| StorageError::InvalidInput {
                    message: format!("object '{object}' must be in 'type:id' format"),
                })?;
        let (user_type, user_id, user_relation) = parse_user_filter(user)?;
        let tuple = Self::new(object_type, object_id, relation, user_type, user_id, user_relation);
        validate_tuple(&tuple)?;
        Ok(tuple)
    }

    /// The user side in wire form.
    pub fn user(&self) -> String {
        match &self.user_relation {
            Some(relation) => format!("{}:{}#{}", self.user_type, self.user_id, relation),
            None => format!("{}:{}", self.user_type, self.user_id),
        }
    }
}

/// A stored authorization model: the JSON document plus metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredAuthorizationModel {
    pub id: String,
    pub schema_version: String,
    /// The serialized `AuthorizationModel`.
    pub model_json: String,
    pub created_at: DateTime<Utc>,
}

impl StoredAuthorizationModel {
    /// Creates a model record stamped with the current time.
    pub fn new(
        id: impl Into<String>,
        schema_version: impl Into<String>,
        model_json: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            schema_version: schema_version.into(),
            model_json: model_json.into(),
            created_at: Utc::now(),
        }
    }
}

/// Abstract storage interface for authorization data.
///
/// Implementations must be thread-safe (Send + Sync) and support
/// concurrent reads while writes are applied.
#[async_trait]
pub trait DataStore: Send + Sync + 'static {
    // Tuple operations

    /// Applies deletes, then writes. Both are idempotent.
    async fn write_tuples(
        &self,
        writes: Vec<StoredTuple>,
        deletes: Vec<StoredTuple>,
    ) -> StorageResult<()>;

    /// Writes a single tuple.
    async fn write_tuple(&self, tuple: StoredTuple) -> StorageResult<()> {
        self.write_tuples(vec![tuple], vec![]).await
    }

    /// Deletes a single tuple.
    async fn delete_tuple(&self, tuple: StoredTuple) -> StorageResult<()> {
        self.write_tuples(vec![], vec![tuple]).await
    }

    /// Reads tuples matching the filter.
    async fn read_tuples(&self, filter: &TupleFilter) -> StorageResult<Vec<StoredTuple>>;

    /// Reads tuples whose user side is exactly `user_type:user_id[#user_relation]`,
    /// optionally restricted to one relation.
    async fn read_tuples_by_user(
        &self,
        user_type: &str,
        user_id: &str,
        user_relation: Option<&str>,
        relation: Option<&str>,
    ) -> StorageResult<Vec<StoredTuple>>;

    /// Distinct object IDs of `object_type` that appear in any tuple,
    /// sorted ascending, at most `limit`.
    async fn list_object_ids(&self, object_type: &str, limit: usize) -> StorageResult<Vec<String>>;

    // Authorization model operations

    /// Stores a model. Model ids are unique.
    async fn write_authorization_model(
        &self,
        model: StoredAuthorizationModel,
    ) -> StorageResult<StoredAuthorizationModel>;

    /// Gets a model by id.
    async fn get_authorization_model(&self, model_id: &str)
        -> StorageResult<StoredAuthorizationModel>;

    /// Gets the newest model (created_at DESC, id DESC).
    async fn get_latest_authorization_model(&self) -> StorageResult<StoredAuthorizationModel>;
}

/// Parses a user filter into `(type, id, relation)`.
pub fn parse_user_filter(user: &str) -> StorageResult<(String, String, Option<String>)> {
    let invalid = || StorageError::InvalidFilter {
        message: format!("user '{user}' must be 'type:id' or 'type:id#relation'"),
    };
    let (user_type, rest) = user.split_once(':').ok_or_else(invalid)?;
    let (user_id, user_relation) = match rest.split_once('#') {
        Some((id, relation)) => (id, Some(relation)),
        None => (rest, None),
    };
    if user_type.is_empty()
        || user_id.is_empty()
        || user_relation.is_some_and(|r| r.is_empty())
    {
        return Err(invalid());
    }
    Ok((
        user_type.to_string(),
        user_id.to_string(),
        user_relation.map(str::to_string),
    ))
}

/// Validates an object type name.
pub fn validate_object_type(object_type: &str) -> StorageResult<()> {
    if object_type.is_empty() || object_type.contains(':') || object_type.contains('#') {
        return Err(StorageError::InvalidInput {
            message: format!("invalid object type '{object_type}'"),
        });
    }
    Ok(())
}

/// Validates a tuple's fields: non-empty parts, no separators inside ids,
/// and length limits.
pub fn validate_tuple(tuple: &StoredTuple) -> StorageResult<()> {
    let invalid = |message: String| Err(StorageError::InvalidInput { message });

    validate_object_type(&tuple.object_type)?;
    if tuple.object_id.is_empty() || tuple.object_id.contains('#') {
        return invalid(format!("invalid object id '{}'", tuple.object_id));
    }
    if tuple.object_id.len() > MAX_OBJECT_ID_LENGTH {
        return invalid(format!(
            "object identifier exceeds maximum length of {MAX_OBJECT_ID_LENGTH} (got {})",
            tuple.object_id.len()
        ));
    }
    if tuple.relation.is_empty()
        || tuple.relation.contains(':')
        || tuple.relation.contains('#')
        || tuple.relation.len() > MAX_RELATION_LENGTH
    {
        return invalid(format!("invalid relation '{}'", tuple.relation));
    }
    if tuple.user_type.is_empty() || tuple.user_type.contains('#') || tuple.user_id.is_empty() {
        return invalid(format!("invalid user '{}'", tuple.user()));
    }
    if tuple.user_relation.as_deref().is_some_and(str::is_empty) {
        return invalid(format!("invalid user '{}'", tuple.user()));
    }
    if tuple.user_id == "*" && tuple.user_relation.is_some() {
        return invalid(format!("wildcard user '{}' cannot carry a relation", tuple.user()));
    }
    let user_len = tuple.user().len();
    if user_len > MAX_USER_ID_LENGTH {
        return invalid(format!(
            "user identifier exceeds maximum length of {MAX_USER_ID_LENGTH} (got {user_len})"
        ));
    }
    Ok(())
}
