//! Bounded worker pool for generation tasks.
//!
//! At most `workers` tasks run at once; up to `queue_capacity` more may wait
//! for a worker slot. Submissions beyond that are rejected immediately so the
//! scheduler's timer never blocks on a saturated backend.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

/// Default number of concurrently running tasks.
pub const DEFAULT_WORKERS: usize = 10;

/// Default number of tasks allowed to wait for a worker.
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// Errors that can occur when submitting to the pool.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    /// Every worker is busy and the queue is full
    #[error("Worker pool queue is full ({capacity} tasks pending)")]
    QueueFull { capacity: usize },
}

/// Releases a pending slot when the task finishes (or is dropped).
struct PendingSlot(Arc<AtomicUsize>);

impl Drop for PendingSlot {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Fixed-width async worker pool with a bounded wait queue.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    workers: usize,
    capacity: usize,
    permits: Arc<Semaphore>,
    pending: Arc<AtomicUsize>,
}

impl WorkerPool {
    pub fn new(workers: usize, queue_capacity: usize) -> Self {
        let workers = workers.max(1);
        Self {
            workers,
            capacity: workers + queue_capacity,
            permits: Arc::new(Semaphore::new(workers)),
            pending: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_WORKERS, DEFAULT_QUEUE_CAPACITY)
    }

    /// Submit a task without waiting.
    ///
    /// The task is spawned immediately but does not start its work until a
    /// worker permit is free. Returns `PoolError::QueueFull` if the pool
    /// already holds `workers + queue_capacity` tasks.
    pub fn try_spawn<F>(&self, task: F) -> Result<JoinHandle<F::Output>, PoolError>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let reserved = self
            .pending
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < self.capacity).then_some(n + 1)
            });
        if reserved.is_err() {
            return Err(PoolError::QueueFull {
                capacity: self.capacity,
            });
        }

        let slot = PendingSlot(self.pending.clone());
        let permits = self.permits.clone();

        Ok(tokio::spawn(async move {
            let _slot = slot;
            // The semaphore is never closed, so this only waits
            let _permit = permits.acquire_owned().await.ok();
            task.await
        }))
    }

    /// Tasks currently running or waiting for a worker.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    /// Number of worker slots not currently in use.
    pub fn idle_workers(&self) -> usize {
        self.permits.available_permits()
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn test_runs_submitted_task() {
        let pool = WorkerPool::new(2, 2);
        let handle = pool.try_spawn(async { 40 + 2 }).unwrap();
        assert_eq!(handle.await.unwrap(), 42);

        tokio::task::yield_now().await;
        assert_eq!(pool.pending(), 0);
    }

    #[tokio::test]
    async fn test_rejects_when_queue_full() {
        let pool = WorkerPool::new(1, 1);
        let (release_tx, release_rx) = oneshot::channel::<()>();

        let first = pool
            .try_spawn(async move {
                release_rx.await.ok();
            })
            .unwrap();
        let second = pool.try_spawn(async {}).unwrap();

        let result = pool.try_spawn(async {});
        assert_eq!(result.unwrap_err(), PoolError::QueueFull { capacity: 2 });
        assert_eq!(pool.pending(), 2);

        release_tx.send(()).unwrap();
        first.await.unwrap();
        second.await.unwrap();

        tokio::task::yield_now().await;
        assert_eq!(pool.pending(), 0);
        assert!(pool.try_spawn(async {}).is_ok());
    }

    #[tokio::test]
    async fn test_concurrency_bounded_by_workers() {
        let pool = WorkerPool::new(2, 10);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..6)
            .map(|_| {
                let running = running.clone();
                let peak = peak.clone();
                pool.try_spawn(async move {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                })
                .unwrap()
            })
            .collect();

        for handle in handles {
            handle.await.unwrap();
        }

        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(pool.idle_workers(), 2);
    }

    #[test]
    fn test_zero_workers_is_clamped() {
        let pool = WorkerPool::new(0, 5);
        assert_eq!(pool.workers(), 1);
        assert_eq!(pool.capacity(), 6);
    }
}
