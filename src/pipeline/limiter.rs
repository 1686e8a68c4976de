// src/pipeline/limiter.rs

//! Bounded concurrency for outbound work.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Caps how many tasks run at once.
///
/// Waiters are granted slots in the order they asked for them. A [`Slot`]
/// returns its capacity when dropped, which also covers tasks that fail or
/// panic while holding one.
#[derive(Debug, Clone)]
pub struct Limiter {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

/// One unit of limiter capacity.
#[derive(Debug)]
pub struct Slot {
    _permit: OwnedSemaphorePermit,
}

impl Limiter {
    /// A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    pub async fn acquire(&self) -> Slot {
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .expect("limiter semaphore is never closed");
        Slot { _permit: permit }
    }

    /// Run `task` while holding a slot.
    pub async fn with_slot<F, T>(&self, task: F) -> T
    where
        F: Future<Output = T>,
    {
        let _slot = self.acquire().await;
        task.await
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }
}
