//! Bounded worker pool for action execution.
//!
//! Workers are plain OS threads gated by an atomic permit counter. The
//! dispatch loop acquires a permit before spawning; when the pool is
//! exhausted the acquisition fails immediately and the caller refuses the
//! request rather than queueing it.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Default maximum number of concurrent action workers.
pub const DEFAULT_MAX_WORKERS: usize = 8;

/// Permit-gated worker accounting.
#[derive(Debug)]
pub struct WorkerPool {
    active: Arc<AtomicUsize>,
    max: usize,
}

impl WorkerPool {
    /// Creates a pool admitting at most `max` concurrent workers.
    #[must_use]
    pub fn new(max: usize) -> Self {
        Self {
            active: Arc::new(AtomicUsize::new(0)),
            max,
        }
    }

    /// Returns the configured worker ceiling.
    #[must_use]
    pub const fn max(&self) -> usize {
        self.max
    }

    /// Returns the number of currently held permits.
    #[must_use]
    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Attempts to acquire a worker permit.
    ///
    /// Returns `None` when the pool is at capacity. The permit is released
    /// when dropped.
    #[must_use]
    pub fn try_acquire(&self) -> Option<WorkerPermit> {
        let mut current = self.active.load(Ordering::SeqCst);
        loop {
            if current >= self.max {
                return None;
            }
            match self.active.compare_exchange(
                current,
                current + 1,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return Some(WorkerPermit::new(Arc::clone(&self.active))),
                Err(next) => current = next,
            }
        }
    }
}

/// Held while a worker runs; releases its slot on drop.
#[derive(Debug)]
pub struct WorkerPermit {
    active: Arc<AtomicUsize>,
}

impl WorkerPermit {
    fn new(active: Arc<AtomicUsize>) -> Self {
        Self { active }
    }
}

impl Drop for WorkerPermit {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}
