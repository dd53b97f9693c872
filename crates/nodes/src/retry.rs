//! Async driver for [`RetryPolicy`].

use std::future::Future;

use pipeline::{CallError, RetryPolicy};
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Runs `call` until it succeeds, returns a non-retryable error, or the policy
/// runs out of attempts. The last error is returned unchanged.
///
/// Sleeping between attempts stops early when `cancel` fires; the error from
/// the attempt that just failed is returned in that case.
pub async fn call_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &'static str,
    cancel: &CancellationToken,
    mut call: F,
) -> Result<T, CallError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, CallError>>,
{
    let mut attempt: u32 = 1;
    loop {
        let err = match call().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        let retryability = err.retryability();
        if !policy.should_retry(attempt, &retryability) {
            return Err(err);
        }

        let delay = policy.delay_after(attempt, &retryability);
        warn!(
            operation,
            attempt,
            max_attempts = policy.max_attempts,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "outbound call failed, retrying"
        );

        tokio::select! {
            _ = cancel.cancelled() => return Err(err),
            _ = tokio::time::sleep(delay) => {}
        }
        attempt += 1;
    }
}
