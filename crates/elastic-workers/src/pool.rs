//! Resizable worker pool
//!
//! Owns the shared task queue and the list of running workers. Workers can
//! be added and removed while tasks are in flight; removal is newest first.

use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::config::WorkerPoolConfig;
use crate::error::{Result, WorkerPoolError};
use crate::queue::TaskQueue;
use crate::task::Task;
use crate::worker::Worker;

/// Pool of workers draining one shared task queue
///
/// # Example
///
/// ```no_run
/// use elastic_workers::{TaskQueue, WorkerPool};
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() -> elastic_workers::Result<()> {
/// let ctx = CancellationToken::new();
/// let pool = WorkerPool::new(ctx.clone(), TaskQueue::bounded(16), 2);
///
/// pool.add_task(|_ctx: CancellationToken| async move {
///     println!("working");
/// })
/// .await?;
///
/// // Scale up under load, back down afterwards
/// pool.add_workers(8);
/// pool.remove_workers(8);
///
/// pool.shutdown().await?;
/// # Ok(())
/// # }
/// ```
pub struct WorkerPool {
    config: WorkerPoolConfig,
    ctx: CancellationToken,
    queue: TaskQueue,
    workers: Mutex<Vec<Worker>>,
    next_worker: AtomicUsize,
}

impl WorkerPool {
    /// Create a pool over `queue` and start `initial_count` workers
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(ctx: CancellationToken, queue: TaskQueue, initial_count: usize) -> Self {
        let config = WorkerPoolConfig::default()
            .with_initial_workers(initial_count)
            .with_queue_capacity(queue.capacity());
        Self::build(ctx, queue, config)
    }

    /// Create a pool from a configuration, with a queue of
    /// `config.queue_capacity`
    ///
    /// Must be called from within a Tokio runtime.
    pub fn from_config(ctx: CancellationToken, config: WorkerPoolConfig) -> Result<Self> {
        config.validate()?;
        let queue = TaskQueue::bounded(config.queue_capacity);
        Ok(Self::build(ctx, queue, config))
    }

    fn build(ctx: CancellationToken, queue: TaskQueue, config: WorkerPoolConfig) -> Self {
        let pool = Self {
            workers: Mutex::new(Vec::with_capacity(config.initial_workers)),
            ctx,
            queue,
            next_worker: AtomicUsize::new(0),
            config,
        };

        {
            let mut workers = pool.workers.lock();
            for _ in 0..pool.config.initial_workers {
                workers.push(pool.spawn_worker());
            }
        }

        info!(
            pool = %pool.config.name,
            workers = pool.config.initial_workers,
            queue_capacity = pool.queue.capacity(),
            "Worker pool started"
        );
        pool
    }

    /// Create and start one worker bound to the pool's queue and context
    fn spawn_worker(&self) -> Worker {
        let seq = self.next_worker.fetch_add(1, Ordering::Relaxed);
        let worker = Worker::new(format!("{}-{}", self.config.name, seq), self.queue.clone());
        worker.start(self.ctx.clone());
        worker
    }

    /// Pool name
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Pool configuration
    pub fn config(&self) -> &WorkerPoolConfig {
        &self.config
    }

    /// Cancellation token handed to every worker and task
    pub fn cancellation_token(&self) -> CancellationToken {
        self.ctx.clone()
    }

    /// Submit a task, waiting until the queue has room for it
    pub async fn add_task<T: Task>(&self, task: T) -> Result<()> {
        self.queue.send(task).await
    }

    /// Submit a task without waiting
    ///
    /// Fails with [`WorkerPoolError::QueueFull`] if no capacity is free.
    pub fn try_add_task<T: Task>(&self, task: T) -> Result<()> {
        self.queue.try_send(task)
    }

    /// Handle to the shared task queue
    pub fn task_channel(&self) -> TaskQueue {
        self.queue.clone()
    }

    /// Number of workers in the pool
    pub fn workers_count(&self) -> usize {
        self.workers.lock().len()
    }

    /// Number of pool members whose loop is still running
    ///
    /// Lower than [`WorkerPool::workers_count`] once workers have stopped
    /// themselves through cancellation or queue closure.
    pub fn running_workers(&self) -> usize {
        self.workers
            .lock()
            .iter()
            .filter(|worker| worker.is_running())
            .count()
    }

    /// Start `count` additional workers
    #[instrument(skip(self), fields(pool = %self.config.name))]
    pub fn add_workers(&self, count: usize) {
        let mut workers = self.workers.lock();
        workers.reserve(count);
        for _ in 0..count {
            workers.push(self.spawn_worker());
        }
        info!(added = count, total = workers.len(), "Workers added");
    }

    /// Stop and remove up to `count` workers, most recently added first
    ///
    /// Removing more workers than the pool has empties the pool. Tasks that
    /// removed workers are executing still run to completion. Returns the
    /// number of workers actually removed.
    #[instrument(skip(self), fields(pool = %self.config.name))]
    pub fn remove_workers(&self, count: usize) -> usize {
        let mut workers = self.workers.lock();
        let keep = workers.len().saturating_sub(count);
        let removed: Vec<Worker> = workers.drain(keep..).rev().collect();
        for worker in &removed {
            worker.stop();
        }
        info!(removed = removed.len(), total = workers.len(), "Workers removed");
        removed.len()
    }

    /// Stop and remove every worker
    ///
    /// Does not wait for in-flight tasks and does not close the queue; tasks
    /// left in the queue stay there. Calling it on an empty pool is a no-op.
    #[instrument(skip(self), fields(pool = %self.config.name))]
    pub fn stop(&self) {
        let mut workers = self.workers.lock();
        if workers.is_empty() {
            return;
        }
        let count = workers.len();
        while let Some(worker) = workers.pop() {
            worker.stop();
        }
        info!(stopped = count, "Worker pool stopped");
    }

    /// Shut the pool down gracefully
    ///
    /// Closes the queue, lets the workers finish every task still buffered
    /// and waits for their loops to exit, for at most
    /// `config.shutdown_timeout`. On timeout the remaining workers are told
    /// to stop and [`WorkerPoolError::ShutdownTimeout`] is returned. The pool
    /// is empty afterwards either way.
    #[instrument(skip(self), fields(pool = %self.config.name))]
    pub async fn shutdown(&self) -> Result<()> {
        info!("Initiating graceful shutdown");
        self.queue.close();

        let workers = std::mem::take(&mut *self.workers.lock());
        let drained = tokio::time::timeout(
            self.config.shutdown_timeout,
            futures::future::join_all(workers.iter().map(|worker| worker.join())),
        )
        .await;

        if drained.is_err() {
            let remaining = workers.iter().filter(|w| w.is_running()).count();
            warn!(remaining, "Shutdown timeout reached");
            for worker in &workers {
                worker.stop();
            }
            return Err(WorkerPoolError::ShutdownTimeout(remaining));
        }

        debug!(workers = workers.len(), "All workers drained");
        info!("Worker pool shut down");
        Ok(())
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("name", &self.config.name)
            .field("workers", &self.workers_count())
            .field("queue", &self.queue)
            .finish()
    }
}
