//! Batch check handler with two-stage deduplication.
//!
//! This handler processes multiple permission checks in a single request,
//! optimizing throughput through:
//!
//! 1. **Intra-batch deduplication**: Identical checks execute only once
//! 2. **Singleflight**: Concurrent requests for same check share results
//!
//! Each unique check goes through a `CachedChecker`, so repeated batches hit
//! the check cache when it is enabled.

mod handler;
mod singleflight;
mod types;

pub use handler::BatchCheckHandler;
pub use types::{
    BatchCheckError, BatchCheckItem, BatchCheckItemResult, BatchCheckRequest, BatchCheckResponse,
    BatchCheckResult, MAX_BATCH_SIZE,
};
