//! Single worker execution loop
//!
//! A [`Worker`] owns one Tokio task that repeatedly waits for whichever comes
//! first of: a task on the shared queue, cancellation of the shared context,
//! or the worker's own stop signal. When several are ready at once the stop
//! signal wins, then cancellation, then the queue.
//!
//! ```text
//!  NotStarted ──start()──▶ Running ──stop() / ctx cancelled / queue closed──▶ Stopped
//! ```
//!
//! A stopped worker cannot be started again.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::queue::TaskQueue;

/// Lifecycle state of a worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Created but never started
    NotStarted,
    /// Execution loop is running
    Running,
    /// Stopped explicitly, by cancellation, or because the queue closed
    Stopped,
}

/// State shared between the worker handle and its loop
struct Shared {
    state: Mutex<WorkerState>,
    quit: CancellationToken,
}

impl Shared {
    /// Transition Running -> Stopped and fire the stop signal.
    ///
    /// Returns false if the worker was not running.
    fn stop(&self) -> bool {
        let mut state = self.state.lock();
        if *state != WorkerState::Running {
            return false;
        }
        *state = WorkerState::Stopped;
        // Cancelling a token never blocks, even if the loop is already gone.
        self.quit.cancel();
        true
    }
}

/// A single task-executing loop bound to a shared queue
pub struct Worker {
    id: String,
    queue: TaskQueue,
    shared: Arc<Shared>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Worker {
    /// Create a worker bound to `queue`; it does nothing until started
    pub fn new(id: impl Into<String>, queue: TaskQueue) -> Self {
        Self {
            id: id.into(),
            queue,
            shared: Arc::new(Shared {
                state: Mutex::new(WorkerState::NotStarted),
                quit: CancellationToken::new(),
            }),
            handle: Mutex::new(None),
        }
    }

    /// Worker identifier used in logs
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Current lifecycle state
    pub fn state(&self) -> WorkerState {
        *self.shared.state.lock()
    }

    /// Check if the execution loop is running
    pub fn is_running(&self) -> bool {
        self.state() == WorkerState::Running
    }

    /// Start the execution loop
    ///
    /// Returns immediately. Has no effect if the worker is already running or
    /// has been stopped. Must be called from within a Tokio runtime.
    pub fn start(&self, ctx: CancellationToken) {
        let mut state = self.shared.state.lock();
        if *state != WorkerState::NotStarted {
            return;
        }
        *state = WorkerState::Running;

        let handle = tokio::spawn(run_loop(
            self.id.clone(),
            self.queue.clone(),
            Arc::clone(&self.shared),
            ctx,
        ));
        *self.handle.lock() = Some(handle);

        debug!(worker_id = %self.id, "Worker started");
    }

    /// Signal the execution loop to exit
    ///
    /// Never blocks. A task that is currently executing runs to completion
    /// before the loop exits. Has no effect if the worker is not running.
    pub fn stop(&self) {
        if self.shared.stop() {
            debug!(worker_id = %self.id, "Worker stop requested");
        }
    }

    /// Wait for the execution loop to exit
    ///
    /// Returns immediately if the loop was never started or was already
    /// joined. This does not stop the worker; pair it with [`Worker::stop`]
    /// or with closing the queue.
    pub async fn join(&self) {
        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(worker_id = %self.id, "Worker loop ended abnormally: {}", e);
            }
        }
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.shared.stop();
    }
}

impl std::fmt::Debug for Worker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Worker")
            .field("id", &self.id)
            .field("state", &self.state())
            .finish()
    }
}

async fn run_loop(id: String, queue: TaskQueue, shared: Arc<Shared>, ctx: CancellationToken) {
    loop {
        // Stop signal first: once stop() has returned, no further task is taken.
        tokio::select! {
            biased;

            _ = shared.quit.cancelled() => {
                debug!(worker_id = %id, "Worker loop exited");
                break;
            }
            _ = ctx.cancelled() => {
                debug!(worker_id = %id, "Context cancelled, worker exiting");
                shared.stop();
                break;
            }
            task = queue.recv() => match task {
                Some(task) => {
                    // stop() may have landed while this receive was in progress
                    if shared.quit.is_cancelled() {
                        queue.requeue(task);
                        debug!(worker_id = %id, "Worker loop exited, task handed back");
                        break;
                    }
                    trace!(worker_id = %id, "Executing task");
                    task.run(ctx.clone()).await;
                }
                None => {
                    debug!(worker_id = %id, "Task queue closed, worker exiting");
                    shared.stop();
                    break;
                }
            },
        }
    }
}
