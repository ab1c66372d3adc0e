//! Bounded task runner.
//!
//! Runs one task per item on the tokio runtime with at most `limit` in
//! flight. The first failure cancels every task that has not finished yet
//! and is returned; results otherwise come back in input order.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::domain::{ProvisioningError, Result};

/// Run `task` for every item with bounded parallelism.
///
/// Cancelling `cancel` stops tasks that are waiting for a slot or still
/// running; the call then returns [`ProvisioningError::Cancelled`].
pub async fn run_bounded<I, T, F, Fut>(
    items: Vec<I>,
    limit: usize,
    cancel: &CancellationToken,
    task: F,
) -> Result<Vec<T>>
where
    I: Send + 'static,
    T: Send + 'static,
    F: Fn(I) -> Fut,
    Fut: Future<Output = Result<T>> + Send + 'static,
{
    let token = cancel.child_token();
    let semaphore = Arc::new(Semaphore::new(limit.max(1)));
    let mut set = JoinSet::new();
    let total = items.len();

    for (index, item) in items.into_iter().enumerate() {
        let work = task(item);
        let semaphore = Arc::clone(&semaphore);
        let token = token.clone();

        set.spawn(async move {
            let permit = tokio::select! {
                biased;
                _ = token.cancelled() => return (index, Err(ProvisioningError::Cancelled)),
                permit = semaphore.acquire_owned() => permit,
            };
            let Ok(_permit) = permit else {
                return (index, Err(ProvisioningError::Cancelled));
            };

            tokio::select! {
                biased;
                _ = token.cancelled() => (index, Err(ProvisioningError::Cancelled)),
                result = work => (index, result),
            }
        });
    }

    let mut results: Vec<Option<T>> = (0..total).map(|_| None).collect();
    let mut first_error: Option<ProvisioningError> = None;

    while let Some(joined) = set.join_next().await {
        let outcome = match joined {
            Ok((index, Ok(value))) => {
                results[index] = Some(value);
                continue;
            }
            Ok((_, Err(e))) => e,
            Err(join_error) => ProvisioningError::Task(join_error.to_string()),
        };

        if matches!(outcome, ProvisioningError::Cancelled) {
            continue;
        }
        if first_error.is_none() {
            warn!(error = %outcome, "Task failed, cancelling remaining work");
            token.cancel();
            first_error = Some(outcome);
        }
    }

    if let Some(error) = first_error {
        return Err(error);
    }
    results
        .into_iter()
        .collect::<Option<Vec<T>>>()
        .ok_or(ProvisioningError::Cancelled)
}
