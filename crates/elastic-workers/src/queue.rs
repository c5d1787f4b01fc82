//! Shared task queue
//!
//! A bounded multi-producer, multi-consumer channel of [`BoxedTask`]s. Tokio's
//! `mpsc` channel only has a single receiver, so the receiver is shared
//! behind an async mutex: one consumer at a time waits on it, and each task
//! is handed to exactly one consumer.

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex, Notify};
use tokio_util::sync::CancellationToken;

use crate::error::{Result, WorkerPoolError};
use crate::task::{BoxedTask, Task};

/// Handle to a shared task queue
///
/// Cloning the handle does not create a new queue; all clones send to and
/// receive from the same channel.
#[derive(Clone)]
pub struct TaskQueue {
    tx: mpsc::Sender<BoxedTask>,
    rx: Arc<Mutex<mpsc::Receiver<BoxedTask>>>,
    /// Tasks handed back by consumers that stopped right after receiving
    returned: Arc<parking_lot::Mutex<VecDeque<BoxedTask>>>,
    returned_notify: Arc<Notify>,
    closed: CancellationToken,
    capacity: usize,
}

impl TaskQueue {
    /// Create a queue holding at most `capacity` pending tasks
    ///
    /// A capacity of 0 is raised to 1: every submission past the buffer waits
    /// for a consumer to take a task.
    pub fn bounded(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, rx) = mpsc::channel(capacity);
        Self {
            tx,
            rx: Arc::new(Mutex::new(rx)),
            returned: Arc::new(parking_lot::Mutex::new(VecDeque::new())),
            returned_notify: Arc::new(Notify::new()),
            closed: CancellationToken::new(),
            capacity,
        }
    }

    /// Maximum number of buffered tasks
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Check if the queue was closed
    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Enqueue a task, waiting for free capacity
    pub async fn send<T: Task>(&self, task: T) -> Result<()> {
        self.send_boxed(Box::new(task)).await
    }

    /// Enqueue an already boxed task, waiting for free capacity
    pub async fn send_boxed(&self, task: BoxedTask) -> Result<()> {
        if self.is_closed() {
            return Err(WorkerPoolError::QueueClosed);
        }
        tokio::select! {
            sent = self.tx.send(task) => sent.map_err(|_| WorkerPoolError::QueueClosed),
            _ = self.closed.cancelled() => Err(WorkerPoolError::QueueClosed),
        }
    }

    /// Enqueue a task without waiting
    pub fn try_send<T: Task>(&self, task: T) -> Result<()> {
        if self.is_closed() {
            return Err(WorkerPoolError::QueueClosed);
        }
        self.tx
            .try_send(Box::new(task))
            .map_err(|err| match err {
                mpsc::error::TrySendError::Full(_) => WorkerPoolError::QueueFull,
                mpsc::error::TrySendError::Closed(_) => WorkerPoolError::QueueClosed,
            })
    }

    /// Receive the next task
    ///
    /// Returns `None` once the queue is closed and every buffered task has
    /// been handed out. Cancel-safe: dropping the future never loses a task.
    pub async fn recv(&self) -> Option<BoxedTask> {
        let mut rx = self.rx.lock().await;
        loop {
            let returned = self.returned.lock().pop_front();
            if let Some(task) = returned {
                return Some(task);
            }
            if self.closed.is_cancelled() {
                break;
            }
            tokio::select! {
                task = rx.recv() => return task,
                _ = self.returned_notify.notified() => {}
                _ = self.closed.cancelled() => {}
            }
        }
        // Closed: hand out what is still buffered, then report the end.
        rx.close();
        rx.recv().await
    }

    /// Put a received task back at the front of the queue
    ///
    /// Used by a consumer that was stopped between receiving a task and
    /// starting it. The task is the next one handed out.
    pub(crate) fn requeue(&self, task: BoxedTask) {
        self.returned.lock().push_front(task);
        self.returned_notify.notify_one();
    }

    /// Close the queue
    ///
    /// Further sends fail with [`WorkerPoolError::QueueClosed`]. Tasks already
    /// buffered are still delivered. Closing twice is a no-op.
    pub fn close(&self) {
        self.closed.cancel();
    }
}

impl std::fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskQueue")
            .field("capacity", &self.capacity)
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn counting_task(counter: &Arc<AtomicUsize>) -> impl Task {
        let counter = counter.clone();
        move |_ctx: CancellationToken| async move {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_zero_capacity_is_raised() {
        let queue = TaskQueue::bounded(0);
        assert_eq!(queue.capacity(), 1);
        assert!(!queue.is_closed());
    }

    #[tokio::test]
    async fn test_send_and_recv() {
        let counter = Arc::new(AtomicUsize::new(0));
        let queue = TaskQueue::bounded(4);

        queue.send(counting_task(&counter)).await.unwrap();
        queue.send(counting_task(&counter)).await.unwrap();

        for _ in 0..2 {
            let task = queue.recv().await.unwrap();
            task.run(CancellationToken::new()).await;
        }

        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_try_send_full() {
        let counter = Arc::new(AtomicUsize::new(0));
        let queue = TaskQueue::bounded(1);

        queue.try_send(counting_task(&counter)).unwrap();
        let result = queue.try_send(counting_task(&counter));

        assert!(matches!(result, Err(WorkerPoolError::QueueFull)));
    }

    #[tokio::test]
    async fn test_close_drains_buffered_tasks() {
        let counter = Arc::new(AtomicUsize::new(0));
        let queue = TaskQueue::bounded(4);

        queue.send(counting_task(&counter)).await.unwrap();
        queue.send(counting_task(&counter)).await.unwrap();
        queue.close();
        queue.close();

        assert!(matches!(
            queue.send(counting_task(&counter)).await,
            Err(WorkerPoolError::QueueClosed)
        ));
        assert!(matches!(
            queue.try_send(counting_task(&counter)),
            Err(WorkerPoolError::QueueClosed)
        ));

        assert!(queue.recv().await.is_some());
        assert!(queue.recv().await.is_some());
        assert!(queue.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_close_wakes_waiting_receiver() {
        let queue = TaskQueue::bounded(1);
        let consumer = queue.clone();
        let waiter = tokio::spawn(async move { consumer.recv().await.is_none() });

        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.close();

        let ended = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("receiver should wake on close")
            .unwrap();
        assert!(ended);
    }

    #[tokio::test]
    async fn test_close_wakes_blocked_sender() {
        let counter = Arc::new(AtomicUsize::new(0));
        let queue = TaskQueue::bounded(1);
        queue.send(counting_task(&counter)).await.unwrap();

        let producer = queue.clone();
        let task = counting_task(&counter);
        let blocked = tokio::spawn(async move { producer.send(task).await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.close();

        let result = tokio::time::timeout(Duration::from_secs(1), blocked)
            .await
            .expect("sender should wake on close")
            .unwrap();
        assert!(matches!(result, Err(WorkerPoolError::QueueClosed)));
    }

    #[tokio::test]
    async fn test_requeued_task_is_delivered_first() {
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let queue = TaskQueue::bounded(4);

        for id in [1, 2] {
            let order = order.clone();
            queue
                .send(move |_ctx: CancellationToken| async move {
                    order.lock().push(id);
                })
                .await
                .unwrap();
        }

        let first = queue.recv().await.unwrap();
        queue.requeue(first);

        while let Ok(Some(task)) =
            tokio::time::timeout(Duration::from_millis(20), queue.recv()).await
        {
            task.run(CancellationToken::new()).await;
        }

        assert_eq!(*order.lock(), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_requeue_wakes_waiting_receiver() {
        let counter = Arc::new(AtomicUsize::new(0));
        let queue = TaskQueue::bounded(1);
        queue.send(counting_task(&counter)).await.unwrap();
        let task = queue.recv().await.unwrap();

        let consumer = queue.clone();
        let waiter = tokio::spawn(async move { consumer.recv().await.is_some() });
        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.requeue(task);

        let received = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("receiver should wake on requeue")
            .unwrap();
        assert!(received);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_each_task_delivered_once() {
        let counter = Arc::new(AtomicUsize::new(0));
        let queue = TaskQueue::bounded(8);

        let mut consumers = Vec::new();
        for _ in 0..4 {
            let queue = queue.clone();
            consumers.push(tokio::spawn(async move {
                let mut received = 0;
                while let Some(task) = queue.recv().await {
                    task.run(CancellationToken::new()).await;
                    received += 1;
                }
                received
            }));
        }

        for _ in 0..100 {
            queue.send(counting_task(&counter)).await.unwrap();
        }
        queue.close();

        let mut total = 0;
        for consumer in consumers {
            total += consumer.await.unwrap();
        }

        assert_eq!(total, 100);
        assert_eq!(counter.load(Ordering::SeqCst), 100);
    }
}
