use std::future::Future;
use tokio::task::JoinHandle;
use tracing::trace;

/// Spawn a background task with a name attached for log correlation.
pub fn spawn_named<T, F>(name: &str, future: F) -> JoinHandle<T>
where
    F: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    trace!(task = name, "spawn");
    tokio::spawn(future)
}
