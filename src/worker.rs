// Offload of pure computations (hashing, diffing, parsing) off the caller's thread
// One blocking task per call, bounded by a timeout; never retried

use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Default time allowed for one offloaded call
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WorkerError {
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),
    #[error("Operation was cancelled")]
    Cancelled,
    #[error("Operation failed: {0}")]
    Failed(String),
}

/// Run `f` on the blocking pool and wait at most `timeout` for it
pub async fn run_offloaded<F, T>(f: F, timeout: Duration) -> Result<T, WorkerError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    run_offloaded_with_cancel(f, timeout, CancellationToken::new()).await
}

/// Like [`run_offloaded`], but also gives up when `cancel` fires.
///
/// On timeout or cancellation the task handle is dropped and its result
/// discarded; the blocking thread finishes on its own.
pub async fn run_offloaded_with_cancel<F, T>(
    f: F,
    timeout: Duration,
    cancel: CancellationToken,
) -> Result<T, WorkerError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let handle = tokio::task::spawn_blocking(f);

    tokio::select! {
        biased;

        _ = cancel.cancelled() => {
            tracing::debug!("offloaded task cancelled");
            Err(WorkerError::Cancelled)
        }

        joined = tokio::time::timeout(timeout, handle) => match joined {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(join_error)) => {
                let message = panic_message(join_error);
                tracing::warn!(error = %message, "offloaded task failed");
                Err(WorkerError::Failed(message))
            }
            Err(_) => {
                tracing::warn!(?timeout, "offloaded task timed out, discarding");
                Err(WorkerError::Timeout(timeout))
            }
        }
    }
}

fn panic_message(err: tokio::task::JoinError) -> String {
    if !err.is_panic() {
        return err.to_string();
    }
    let payload = err.into_panic();
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "task panicked".to_string()
    }
}
