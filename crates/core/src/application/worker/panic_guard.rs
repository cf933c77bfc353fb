// Panic isolation for worker safety
use std::any::Any;
use tokio::task::JoinError;
use tracing::error;

/// Render a panic payload as text
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}

/// Describe why a worker task did not finish normally
///
/// A panic inside the task is caught by its `JoinHandle`, which keeps one
/// job's crash from taking down the daemon or any other job.
pub fn join_error_message(err: JoinError) -> String {
    if err.is_panic() {
        let payload = err.into_panic();
        let msg = panic_message(payload.as_ref());
        error!(panic_msg = %msg, "Scan worker panicked");
        format!("Scan worker crashed: {}", msg)
    } else {
        error!("Scan worker task was cancelled");
        "Scan worker was cancelled".to_string()
    }
}
