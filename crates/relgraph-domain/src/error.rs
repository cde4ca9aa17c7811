//! Domain error types for authorization operations.

use thiserror::Error;

/// Domain-specific errors for authorization operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DomainError {
    /// The (type, relation) pair is not defined in the model snapshot.
    #[error("relation '{relation}' not found on type '{type_name}'")]
    UnknownRelation { type_name: String, relation: String },

    /// The requested authorization model snapshot does not exist.
    #[error("authorization model not found: {model_id}")]
    ModelNotFound { model_id: String },

    /// A relation reaches itself through computed usersets on the same type.
    /// Only raised while loading a model.
    #[error("cyclic relation definition in {type_name}#{relation}: {path}")]
    ModelCycle {
        type_name: String,
        relation: String,
        path: String,
    },

    /// The model references undefined types or relations.
    #[error("model validation error: {message}")]
    ModelValidation { message: String },

    /// Depth limit exceeded during graph traversal.
    #[error("depth limit exceeded (max: {max_depth})")]
    DepthExceeded { max_depth: u32 },

    /// The tuple store could not serve a read.
    #[error("tuple store unavailable: {message}")]
    StoreUnavailable { message: String },

    /// The request deadline passed before a decision was reached.
    #[error("timeout after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// Invalid user format.
    #[error("invalid user format: {value}")]
    InvalidUserFormat { value: String },

    /// Invalid object format.
    #[error("invalid object format: {value}")]
    InvalidObjectFormat { value: String },

    /// Invalid relation format.
    #[error("invalid relation format: {value}")]
    InvalidRelationFormat { value: String },
}

impl DomainError {
    /// Returns true if the caller may retry the operation with backoff.
    ///
    /// The engine never retries on its own.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DomainError::StoreUnavailable { .. })
    }
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
