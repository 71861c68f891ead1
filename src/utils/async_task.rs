use std::future::Future;

use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio::time::timeout;
use tracing::error;
use tracing::warn;

use crate::BackoffPolicy;
use crate::Error;
use crate::Result;

/// Runs `task` until it succeeds or `policy.max_retries` attempts are used up.
///
/// Every attempt is bounded by `policy.timeout_ms`; the pause between attempts
/// doubles from `base_delay_ms` up to `max_delay_ms`. The last failure is returned.
pub(crate) async fn task_with_timeout_and_exponential_backoff<F, T, P>(
    task: F,
    policy: BackoffPolicy,
) -> Result<P>
where
    F: Fn() -> T,
    T: Future<Output = Result<P>>,
{
    let max_retries = policy.max_retries.max(1);
    let mut delay = policy.base_delay();
    let mut last_error = Error::Fatal("task never ran".to_string());

    for attempt in 1..=max_retries {
        match timeout(policy.timeout(), task()).await {
            Ok(Ok(r)) => return Ok(r),
            Ok(Err(e)) => {
                warn!(attempt, "failed with error: {:?}", &e);
                last_error = e;
            }
            Err(_) => {
                warn!(attempt, "task timed out after {:?}", policy.timeout());
                last_error = Error::RetryTimeout(policy.timeout());
            }
        }

        if attempt < max_retries {
            sleep(delay).await;
            delay = (delay * 2).min(policy.max_delay());
        }
    }

    warn!("Task failed after {} retries", max_retries);
    Err(last_error)
}

/// Spawns a named background task, logging its error instead of dropping it.
pub(crate) fn spawn_task<F, Fut>(
    name: &str,
    task_fn: F,
) -> JoinHandle<()>
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    let name = name.to_string();
    tokio::spawn(async move {
        if let Err(e) = task_fn().await {
            error!("spawned task: {name} stopped or encountered an error: {:?}", e);
        }
    })
}
