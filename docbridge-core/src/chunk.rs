//! Sequential application of operations in size-capped chunks.
//!
//! Native stores cap how many operations one atomic batch may carry. Larger
//! inputs are split into consecutive chunks applied strictly one after another:
//! each chunk is atomic, the whole input is not. When chunk `k` fails, chunks
//! before it stay committed and chunks after it are never submitted.

use futures::{StreamExt, TryStreamExt, stream::iter};
use std::future::Future;

use crate::error::DbResult;

/// Default ceiling on operations per native atomic batch.
pub const DEFAULT_BATCH_SIZE: usize = 500;

/// Splits `items` into chunks of at most `chunk_size` items, in order.
///
/// A `chunk_size` of `0` is treated as `1`.
pub fn chunks<T>(items: Vec<T>, chunk_size: usize) -> Vec<Vec<T>> {
    let chunk_size = chunk_size.max(1);
    let mut chunks = Vec::with_capacity(items.len().div_ceil(chunk_size));
    let mut items = items.into_iter().peekable();

    while items.peek().is_some() {
        chunks.push(items.by_ref().take(chunk_size).collect());
    }

    chunks
}

/// Applies `apply` to each chunk of `items`, one chunk at a time.
///
/// Stops at the first failing chunk and returns its error. Returns the number
/// of chunks applied on success.
pub async fn chunked_apply<T, F, Fut>(items: Vec<T>, chunk_size: usize, mut apply: F) -> DbResult<usize>
where
    F: FnMut(Vec<T>) -> Fut,
    Fut: Future<Output = DbResult<()>>,
{
    let chunks = chunks(items, chunk_size);
    let total = chunks.len();

    iter(chunks.into_iter().enumerate())
        .then(|(index, chunk)| {
            tracing::debug!(
                target: "docbridge::chunk",
                chunk = index + 1,
                total,
                size = chunk.len(),
                "Submitting batch chunk"
            );
            apply(chunk)
        })
        .try_collect::<Vec<_>>()
        .await?;

    Ok(total)
}
