//! Data types for batch check operations.

/// Maximum number of checks in one batch.
pub const MAX_BATCH_SIZE: usize = 50;

/// A single check within a batch request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchCheckItem {
    /// The user performing the access (e.g., "user:alice").
    pub user: String,
    /// The relation to check (e.g., "viewer").
    pub relation: String,
    /// The object identifier (e.g., "document:readme").
    pub object: String,
}

impl BatchCheckItem {
    /// Creates a check item.
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

/// Request for batch permission checks.
#[derive(Debug, Clone, Default)]
pub struct BatchCheckRequest {
    /// Model snapshot to evaluate every check against; `None` means latest.
    pub authorization_model_id: Option<String>,
    /// The list of checks to perform.
    pub checks: Vec<BatchCheckItem>,
}

impl BatchCheckRequest {
    /// Creates a new batch check request against the latest model.
    pub fn new(checks: Vec<BatchCheckItem>) -> Self {
        Self {
            authorization_model_id: None,
            checks,
        }
    }

    /// Pins every check in the batch to one model snapshot.
    pub fn with_model_id(mut self, model_id: impl Into<String>) -> Self {
        self.authorization_model_id = Some(model_id.into());
        self
    }
}

/// Result of a single check within a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchCheckItemResult {
    /// Whether the check is allowed. Always false when `error` is set.
    pub allowed: bool,
    /// Error message if the check failed.
    pub error: Option<String>,
}

/// Response from a batch check operation.
#[derive(Debug, Clone)]
pub struct BatchCheckResponse {
    /// Results for each check, in the same order as the request.
    pub results: Vec<BatchCheckItemResult>,
}

/// Errors that reject a whole batch.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BatchCheckError {
    /// The batch request is empty.
    #[error("batch request cannot be empty")]
    EmptyBatch,

    /// The batch request exceeds the maximum allowed size.
    #[error("batch size {size} exceeds maximum allowed {max}")]
    BatchTooLarge { size: usize, max: usize },

    /// A check item has invalid format.
    #[error("invalid check at index {index}: {message}")]
    InvalidCheck { index: usize, message: String },

    /// Domain error raised outside per-item evaluation.
    #[error("check error: {0}")]
    DomainError(String),
}

impl From<relgraph_domain::error::DomainError> for BatchCheckError {
    fn from(err: relgraph_domain::error::DomainError) -> Self {
        BatchCheckError::DomainError(err.to_string())
    }
}

/// Result type for batch check operations.
pub type BatchCheckResult<T> = Result<T, BatchCheckError>;
