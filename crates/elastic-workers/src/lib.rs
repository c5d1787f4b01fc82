//! # Elastic Workers
//!
//! A dynamically resizable pool of long-lived async workers draining one
//! shared task queue.
//!
//! ## Features
//!
//! - **One task abstraction**: implement [`Task`] or submit any async closure
//!   taking a [`CancellationToken`](tokio_util::sync::CancellationToken)
//! - **Live resizing**: [`WorkerPool::add_workers`] and
//!   [`WorkerPool::remove_workers`] while tasks are in flight
//! - **Backpressure**: submission waits while the bounded queue is full
//! - **Cooperative cancellation**: cancelling the pool's token stops every
//!   worker and is visible to running tasks
//! - **Graceful shutdown**: drain buffered tasks with a timeout
//!
//! ## Architecture
//!
//! ```text
//!   producers ──add_task()──▶ ┌────────────────────────────┐
//!                             │         TaskQueue          │
//!                             │ (bounded, multi-consumer)  │
//!                             └─────────────┬──────────────┘
//!                    ┌─────────────────────┼─────────────────────┐
//!                    ▼                     ▼                     ▼
//!               ┌─────────┐           ┌─────────┐           ┌─────────┐
//!               │ Worker 0│           │ Worker 1│    ...    │ Worker N│
//!               └─────────┘           └─────────┘           └─────────┘
//!                    ▲                     ▲                     ▲
//!                    └──── WorkerPool (membership, resize, stop) ┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use elastic_workers::prelude::*;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> elastic_workers::Result<()> {
//! let ctx = CancellationToken::new();
//! let config = WorkerPoolConfig::new("thumbnails")
//!     .with_initial_workers(2)
//!     .with_queue_capacity(32);
//! let pool = WorkerPool::from_config(ctx, config)?;
//!
//! for i in 0..100 {
//!     pool.add_task(move |ctx: CancellationToken| async move {
//!         if ctx.is_cancelled() {
//!             return;
//!         }
//!         println!("rendering {i}");
//!     })
//!     .await?;
//! }
//!
//! pool.add_workers(6);
//! pool.shutdown().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod pool;
pub mod queue;
pub mod task;
pub mod worker;

/// Prelude for common imports
pub mod prelude {
    pub use crate::config::WorkerPoolConfig;
    pub use crate::error::{Result, WorkerPoolError};
    pub use crate::pool::WorkerPool;
    pub use crate::queue::TaskQueue;
    pub use crate::task::{BoxedTask, Task};
    pub use crate::worker::{Worker, WorkerState};
}

// Re-export key types at crate root
pub use config::WorkerPoolConfig;
pub use error::{Result, WorkerPoolError};
pub use pool::WorkerPool;
pub use queue::TaskQueue;
pub use task::{BoxedTask, Task};
pub use worker::{Worker, WorkerState};
