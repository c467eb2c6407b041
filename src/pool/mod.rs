//! Bounded worker pools with admission control.
//!
//! A pool runs at most `threads` units at a time. Submissions are admitted
//! while fewer than `threshold` units are running or waiting; beyond that a
//! submission fails fast with [`PoolError::Overloaded`] instead of queuing
//! without bound. Callers treat that as "retry later", never as a semantic
//! failure of the work itself.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::PoolLimits;

/// Errors submitting work to a pool.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    #[error("{pool} pool overloaded ({threshold} units admitted), retry later")]
    Overloaded { pool: String, threshold: usize },
}

/// Decrements the admitted count when a unit finishes, panics or is aborted.
struct Admission(Arc<AtomicUsize>);

impl Drop for Admission {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Fixed-size async worker pool.
#[derive(Clone)]
pub struct WorkerPool {
    name: Arc<str>,
    workers: Arc<Semaphore>,
    admitted: Arc<AtomicUsize>,
    threshold: usize,
}

impl WorkerPool {
    pub fn new(name: impl Into<String>, limits: &PoolLimits) -> Self {
        let name: String = name.into();
        Self {
            name: Arc::from(name),
            workers: Arc::new(Semaphore::new(limits.threads.max(1))),
            admitted: Arc::new(AtomicUsize::new(0)),
            threshold: limits.effective_threshold(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Units currently admitted (running or waiting for a worker).
    pub fn admitted(&self) -> usize {
        self.admitted.load(Ordering::Acquire)
    }

    /// Submit a unit of work.
    ///
    /// Returns the task handle on admission; the unit starts as soon as a
    /// worker is free.
    pub fn submit<F, T>(&self, work: F) -> Result<JoinHandle<T>, PoolError>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let admission = self.admit()?;
        let workers = Arc::clone(&self.workers);

        Ok(tokio::spawn(async move {
            let _admission = admission;
            // The semaphore is never closed, so acquisition only fails if it were.
            let _worker = workers.acquire_owned().await.ok();
            work.await
        }))
    }

    fn admit(&self) -> Result<Admission, PoolError> {
        let mut current = self.admitted.load(Ordering::Acquire);
        loop {
            if current >= self.threshold {
                warn!(
                    pool = %self.name,
                    threshold = self.threshold,
                    "Rejecting work, pool at capacity"
                );
                return Err(PoolError::Overloaded {
                    pool: self.name.to_string(),
                    threshold: self.threshold,
                });
            }
            match self.admitted.compare_exchange(
                current,
                current + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(actual) => current = actual,
            }
        }
        debug!(pool = %self.name, admitted = current + 1, "Admitted unit of work");
        Ok(Admission(Arc::clone(&self.admitted)))
    }
}
