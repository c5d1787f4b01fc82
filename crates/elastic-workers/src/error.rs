// Error types for the worker pool

use thiserror::Error;

/// Result type alias for worker pool operations
pub type Result<T> = std::result::Result<T, WorkerPoolError>;

/// Errors surfaced by the worker pool and its task queue
///
/// Double start/stop of a worker and removing more workers than exist are
/// not errors. Task failures are never reported here either: a task owns
/// its own fault handling.
#[derive(Debug, Error)]
pub enum WorkerPoolError {
    /// The task queue was closed and accepts no more tasks
    #[error("task queue is closed")]
    QueueClosed,

    /// The task queue has no free capacity (non-blocking submission only)
    #[error("task queue is full")]
    QueueFull,

    /// Graceful shutdown did not finish in time
    #[error("graceful shutdown timed out with {0} worker(s) still running")]
    ShutdownTimeout(usize),

    /// Configuration error
    #[error("invalid worker pool configuration: {0}")]
    InvalidConfig(String),
}

impl WorkerPoolError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        WorkerPoolError::InvalidConfig(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(
            WorkerPoolError::QueueClosed.to_string(),
            "task queue is closed"
        );
        assert_eq!(
            WorkerPoolError::ShutdownTimeout(3).to_string(),
            "graceful shutdown timed out with 3 worker(s) still running"
        );
        assert_eq!(
            WorkerPoolError::config("queue_capacity must be at least 1").to_string(),
            "invalid worker pool configuration: queue_capacity must be at least 1"
        );
    }
}
