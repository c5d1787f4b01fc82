//! Units of work executed by workers
//!
//! A task is anything that can be run once with a cancellation token and
//! produces no value the pool looks at. Two shapes are supported through a
//! single trait:
//!
//! - a type implementing [`Task`] directly
//! - any `FnOnce(CancellationToken) -> impl Future<Output = ()>` closure
//!
//! Result delivery, retries and error reporting are up to the task itself,
//! usually through a channel or shared state it carries.

use std::future::Future;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio_util::sync::CancellationToken;

/// A unit of work that a worker runs to completion
///
/// The worker never interrupts a running task. Long-running tasks should
/// watch `ctx` and return early once it is cancelled.
///
/// # Example
///
/// ```
/// use elastic_workers::Task;
/// use futures::future::BoxFuture;
/// use futures::FutureExt;
/// use tokio_util::sync::CancellationToken;
///
/// struct Greet(String);
///
/// impl Task for Greet {
///     fn run(self: Box<Self>, _ctx: CancellationToken) -> BoxFuture<'static, ()> {
///         async move { println!("hello, {}", self.0) }.boxed()
///     }
/// }
/// ```
pub trait Task: Send + 'static {
    /// Consume the task and produce the future that executes it
    fn run(self: Box<Self>, ctx: CancellationToken) -> BoxFuture<'static, ()>;
}

impl<F, Fut> Task for F
where
    F: FnOnce(CancellationToken) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    fn run(self: Box<Self>, ctx: CancellationToken) -> BoxFuture<'static, ()> {
        (*self)(ctx).boxed()
    }
}

/// Type-erased task as it travels through the queue
pub type BoxedTask = Box<dyn Task>;
