//! Bounded concurrent fan-out with short-circuiting.
//!
//! Branches run through `buffer_unordered`, so at most `limit` are in flight
//! per fan-out. The request-wide bound lives on store reads.
//! Returning early drops the stream, which cancels every outstanding branch.
//!
//! A definitive answer wins over a failed sibling, since it does not depend on
//! that branch. Without one, the error of the lowest-index failed branch is
//! returned so the outcome does not depend on completion order.

use std::future::Future;

use futures::stream::{self, StreamExt};

use crate::error::{DomainError, DomainResult};

/// Resolves branches until one evaluates to `decisive`.
async fn first_decisive<I, F>(branches: I, limit: usize, decisive: bool) -> DomainResult<bool>
where
    I: IntoIterator<Item = F>,
    F: Future<Output = DomainResult<bool>>,
{
    let indexed: Vec<_> = branches
        .into_iter()
        .enumerate()
        .map(|(index, branch)| async move { (index, branch.await) })
        .collect();
    let mut results = stream::iter(indexed).buffer_unordered(limit.max(1));

    let mut first_error: Option<(usize, DomainError)> = None;

    while let Some((index, result)) = results.next().await {
        match result {
            Ok(value) if value == decisive => return Ok(decisive),
            Ok(_) => {}
            Err(e) => {
                if first_error.as_ref().map_or(true, |(i, _)| index < *i) {
                    first_error = Some((index, e));
                }
            }
        }
    }

    match first_error {
        Some((_, e)) => Err(e),
        None => Ok(!decisive),
    }
}

/// True if any branch is true (union semantics). Empty input is false.
pub(crate) async fn any_of<I, F>(branches: I, limit: usize) -> DomainResult<bool>
where
    I: IntoIterator<Item = F>,
    F: Future<Output = DomainResult<bool>>,
{
    first_decisive(branches, limit, true).await
}

/// True only if every branch is true (intersection semantics). Empty input is true.
pub(crate) async fn all_of<I, F>(branches: I, limit: usize) -> DomainResult<bool>
where
    I: IntoIterator<Item = F>,
    F: Future<Output = DomainResult<bool>>,
{
    first_decisive(branches, limit, false).await
}
