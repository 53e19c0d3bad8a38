//! Bounded worker pool shared by every batch of one repository
//!
//! Concurrency is capped by a semaphore owned by the pool; each batch gets
//! its own `JoinSet`, so dropping a batch aborts whatever it still runs.

use crate::error::ArtifactError;
use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::debug;

/// Upper bound for the CPU-derived worker count
pub const MAX_WORKERS_CAP: usize = 20;
/// Assumed CPU count when the platform cannot report one
const FALLBACK_CPU_COUNT: usize = 10;

/// `min(cpu_count * 2, 20)`, with an unknown count treated as 10
pub fn compute_max_workers(cpu_count: Option<usize>) -> usize {
    let cpus = cpu_count.unwrap_or(FALLBACK_CPU_COUNT).max(1);
    cpus.saturating_mul(2).min(MAX_WORKERS_CAP)
}

/// Worker count for this machine
pub fn default_max_workers() -> usize {
    compute_max_workers(std::thread::available_parallelism().ok().map(|n| n.get()))
}

/// A fixed-size pool of transfer slots
#[derive(Debug)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    size: usize,
}

impl WorkerPool {
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            permits: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Start a new batch of tasks keyed by `K`
    pub fn batch<K: Send + 'static>(&self) -> Batch<K> {
        Batch {
            permits: Arc::clone(&self.permits),
            tasks: JoinSet::new(),
            submitted: 0,
        }
    }

    /// Stop admitting work. Tasks waiting for a slot fail; running ones finish.
    pub fn shutdown(&self) {
        if !self.permits.is_closed() {
            debug!("Shutting down worker pool of size {}", self.size);
            self.permits.close();
        }
    }

    pub fn is_shutdown(&self) -> bool {
        self.permits.is_closed()
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Result of one task, tagged with the key it was submitted under
#[derive(Debug)]
pub struct TaskOutcome<K> {
    pub key: K,
    pub result: Result<(), ArtifactError>,
}

/// A set of tasks submitted to a [`WorkerPool`] and joined together
pub struct Batch<K> {
    permits: Arc<Semaphore>,
    tasks: JoinSet<TaskOutcome<K>>,
    submitted: usize,
}

impl<K: Send + 'static> Batch<K> {
    /// Queue `work`; it starts once a pool slot is free
    pub fn submit<F>(&mut self, key: K, work: F)
    where
        F: Future<Output = Result<(), ArtifactError>> + Send + 'static,
    {
        let permits = Arc::clone(&self.permits);
        self.submitted += 1;
        self.tasks.spawn(async move {
            let _permit = match permits.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    return TaskOutcome {
                        key,
                        result: Err(ArtifactError::TaskFailed(
                            "worker pool is shut down".to_string(),
                        )),
                    }
                }
            };

            let result = match AssertUnwindSafe(work).catch_unwind().await {
                Ok(result) => result,
                Err(panic) => Err(ArtifactError::TaskFailed(panic_message(panic))),
            };
            TaskOutcome { key, result }
        });
    }

    pub fn submitted(&self) -> usize {
        self.submitted
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Next finished task, in completion order
    pub async fn next(&mut self) -> Option<Result<TaskOutcome<K>, ArtifactError>> {
        let joined = self.tasks.join_next().await?;
        Some(joined.map_err(|e| ArtifactError::TaskFailed(e.to_string())))
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        format!("task panicked: {}", message)
    } else if let Some(message) = panic.downcast_ref::<String>() {
        format!("task panicked: {}", message)
    } else {
        "task panicked".to_string()
    }
}
