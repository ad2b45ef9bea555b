//! Best-effort and delayed side effects.
//!
//! Notification sends, transcript delivery and notice cleanup must never
//! fail the operation that triggered them. These helpers make that explicit:
//! a failure is logged at `warn` with a label and then dropped.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;

/// Await `fut` and swallow its error.
///
/// Returns `Some(value)` on success so callers can still use the result
/// (e.g. the ID of a message they may want to delete later).
pub async fn best_effort<T, E, F>(label: &str, fut: F) -> Option<T>
where
    F: Future<Output = Result<T, E>>,
    E: Display,
{
    match fut.await {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(task = label, error = %e, "Best-effort action failed");
            None
        }
    }
}

/// Run `fut` on its own task; a failure is logged and discarded.
pub fn spawn_detached<T, E, F>(label: &'static str, fut: F) -> JoinHandle<()>
where
    F: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Display + Send + 'static,
{
    tokio::spawn(async move {
        best_effort(label, fut).await;
    })
}

/// Run `fut` on its own task after `delay`.
pub fn schedule_after<F>(delay: Duration, fut: F) -> JoinHandle<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        fut.await;
    })
}
