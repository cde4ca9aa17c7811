//! Batch check handler implementation.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use futures::future::join_all;
use relgraph_domain::cache::CachedChecker;
use relgraph_domain::resolver::{CheckRequest, ModelReader, TupleReader};
use tracing::{debug, instrument};

use super::singleflight::{LeaderGuard, Singleflight, Slot};
use super::types::{
    BatchCheckError, BatchCheckItem, BatchCheckItemResult, BatchCheckRequest, BatchCheckResponse,
    BatchCheckResult, MAX_BATCH_SIZE,
};

/// Key for identifying unique checks (used for deduplication).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct CheckKey {
    pub model_id: Option<String>,
    pub user: String,
    pub relation: String,
    pub object: String,
}

impl CheckKey {
    pub fn new(model_id: Option<&str>, item: &BatchCheckItem) -> Self {
        Self {
            model_id: model_id.map(str::to_string),
            user: item.user.clone(),
            relation: item.relation.clone(),
            object: item.object.clone(),
        }
    }
}

/// Handler for batch permission checks.
///
/// Processes multiple checks in parallel with two-stage deduplication:
/// 1. Intra-batch: Identical checks within a batch execute once
/// 2. Singleflight: Concurrent requests across batches share results
///
/// The model snapshot is resolved once per batch, so every item is evaluated
/// against the same model.
pub struct BatchCheckHandler<T, M>
where
    T: TupleReader,
    M: ModelReader,
{
    checker: Arc<CachedChecker<T, M>>,
    singleflight: Arc<Singleflight<CheckKey, BatchCheckItemResult>>,
}

impl<T, M> BatchCheckHandler<T, M>
where
    T: TupleReader + 'static,
    M: ModelReader + 'static,
{
    /// Creates a new batch check handler.
    pub fn new(checker: Arc<CachedChecker<T, M>>) -> Self {
        Self {
            checker,
            singleflight: Arc::new(Singleflight::new()),
        }
    }

    /// Validates a batch check request.
    pub fn validate(&self, request: &BatchCheckRequest) -> BatchCheckResult<()> {
        if request.checks.is_empty() {
            return Err(BatchCheckError::EmptyBatch);
        }

        if request.checks.len() > MAX_BATCH_SIZE {
            return Err(BatchCheckError::BatchTooLarge {
                size: request.checks.len(),
                max: MAX_BATCH_SIZE,
            });
        }

        for (index, check) in request.checks.iter().enumerate() {
            let missing = [
                ("user", &check.user),
                ("relation", &check.relation),
                ("object", &check.object),
            ]
            .into_iter()
            .find(|(_, value)| value.is_empty());

            if let Some((field, _)) = missing {
                return Err(BatchCheckError::InvalidCheck {
                    index,
                    message: format!("{field} cannot be empty"),
                });
            }
        }

        Ok(())
    }

    /// Executes a batch check request.
    ///
    /// Per-item evaluation errors are reported in the item's result; only
    /// request validation and snapshot lookup fail the whole batch. The
    /// results are returned in the same order as the input checks.
    #[instrument(skip(self, request), fields(size = request.checks.len()))]
    pub async fn check(&self, request: BatchCheckRequest) -> BatchCheckResult<BatchCheckResponse> {
        self.validate(&request)?;

        let snapshot = self
            .checker
            .resolver()
            .model_snapshot(request.authorization_model_id.as_deref())
            .await?;
        let model_id = snapshot.id();

        // Stage 1: intra-batch deduplication
        let mut unique_checks: Vec<&BatchCheckItem> = Vec::new();
        let mut key_to_index: HashMap<CheckKey, usize> = HashMap::new();
        let mut position_to_unique: Vec<usize> = Vec::with_capacity(request.checks.len());

        for check in &request.checks {
            let key = CheckKey::new(model_id, check);
            let unique_index = *key_to_index.entry(key).or_insert_with(|| {
                unique_checks.push(check);
                unique_checks.len() - 1
            });
            position_to_unique.push(unique_index);
        }
        debug!(
            total = request.checks.len(),
            unique = unique_checks.len(),
            "batch deduplicated"
        );

        // Stage 2: cross-request dedup, unique checks run concurrently
        let check_futures = unique_checks.iter().map(|check| {
            self.execute_check_with_singleflight(model_id, check, CheckKey::new(model_id, check))
        });
        let unique_results: Vec<BatchCheckItemResult> = join_all(check_futures).await;

        let results = position_to_unique
            .iter()
            .map(|&idx| unique_results[idx].clone())
            .collect();

        Ok(BatchCheckResponse { results })
    }

    /// Runs one check, or waits for an identical in-flight one.
    async fn execute_check_with_singleflight(
        &self,
        model_id: Option<&str>,
        check: &BatchCheckItem,
        key: CheckKey,
    ) -> BatchCheckItemResult {
        match self.singleflight.acquire(key.clone()) {
            Slot::Follower(mut receiver) => match receiver.recv().await {
                Ok(result) => result,
                // Leader went away without publishing; take over
                Err(_) => Box::pin(self.execute_check_with_singleflight(model_id, check, key)).await,
            },
            Slot::Leader(sender) => {
                let guard = LeaderGuard::new(&self.singleflight, key);

                let mut request =
                    CheckRequest::new(check.user.clone(), check.relation.clone(), check.object.clone());
                if let Some(model_id) = model_id {
                    request = request.with_model_id(model_id);
                }

                let result = match self.checker.check(&request).await {
                    Ok(result) => BatchCheckItemResult {
                        allowed: result.allowed,
                        error: None,
                    },
                    Err(e) => BatchCheckItemResult {
                        allowed: false,
                        error: Some(e.to_string()),
                    },
                };

                // No receivers is fine
                let _ = sender.send(result.clone());
                drop(guard);

                result
            }
        }
    }

    /// Returns (total_checks, unique_checks) for a batch request.
    pub fn dedup_stats(&self, request: &BatchCheckRequest) -> (usize, usize) {
        let model_id = request.authorization_model_id.as_deref();
        let seen: HashSet<CheckKey> = request
            .checks
            .iter()
            .map(|check| CheckKey::new(model_id, check))
            .collect();
        (request.checks.len(), seen.len())
    }
}
