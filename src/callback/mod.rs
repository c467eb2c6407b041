//! Callback delivery with scheduled redelivery.
//!
//! A callback is an HTTP request carrying the JSON result of a promotion to
//! a caller-supplied URL. Only `200 OK` counts as delivered. A failed
//! delivery is queued for redelivery after `base * 2^n` for attempt `n`;
//! once the attempt ceiling is reached the callback is dropped with a
//! warning. Delivery is at-least-once and never surfaces errors to the
//! promotion that produced the result.
//!
//! The redelivery queue is a min-heap ordered by due time, drained by one
//! background task that is woken when an earlier entry arrives.

use std::cmp::{Ordering as CmpOrdering, Reverse};
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use reqwest::{Client, Method, StatusCode};
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::{CallbackConfig, ConfigError};
use crate::model::{CallbackMethod, CallbackTarget, PromoteResult};
use crate::utils::retry::redelivery_schedule;

/// A single delivery attempt failed.
#[derive(Debug, thiserror::Error)]
pub enum CallbackError {
    #[error("Callback request to {url} failed: {reason}")]
    Request { url: String, reason: String },

    #[error("Callback to {url} returned HTTP {status}")]
    Status { url: String, status: u16 },
}

/// What became of one delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    /// Queued as redelivery number `attempt`, due after `delay`.
    Scheduled { attempt: usize, delay: Duration },
    /// Attempt ceiling reached.
    Dropped,
}

struct Job {
    target: CallbackTarget,
    result: Arc<PromoteResult>,
    /// Redeliveries already scheduled for this callback.
    attempt: usize,
}

struct Scheduled {
    due: Instant,
    seq: u64,
    job: Job,
}

impl PartialEq for Scheduled {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == CmpOrdering::Equal
    }
}

impl Eq for Scheduled {}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scheduled {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        (self.due, self.seq).cmp(&(other.due, other.seq))
    }
}

type Queue = BinaryHeap<Reverse<Scheduled>>;

struct Shared {
    client: Client,
    schedule: Vec<Duration>,
    queue: Mutex<Queue>,
    wake: Notify,
    next_seq: AtomicU64,
    shutdown: watch::Sender<bool>,
}

fn lock(queue: &Mutex<Queue>) -> MutexGuard<'_, Queue> {
    queue.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Shared {
    async fn send(&self, target: &CallbackTarget, result: &PromoteResult) -> Result<(), CallbackError> {
        let method = match target.method {
            CallbackMethod::Post => Method::POST,
            CallbackMethod::Put => Method::PUT,
        };

        let mut request = self.client.request(method, &target.url).json(result);
        for (key, value) in &target.headers {
            request = request.header(key, value);
        }

        let response = request.send().await.map_err(|e| CallbackError::Request {
            url: target.url.clone(),
            reason: e.to_string(),
        })?;

        let status = response.status();
        if status == StatusCode::OK {
            Ok(())
        } else {
            Err(CallbackError::Status {
                url: target.url.clone(),
                status: status.as_u16(),
            })
        }
    }

    async fn deliver(&self, job: Job) -> Delivery {
        match self.send(&job.target, &job.result).await {
            Ok(()) => {
                info!(
                    promotion_id = %job.result.promotion_id(),
                    url = %job.target.url,
                    attempt = job.attempt,
                    "Callback delivered"
                );
                Delivery::Delivered
            }
            Err(e) => {
                warn!(
                    promotion_id = %job.result.promotion_id(),
                    url = %job.target.url,
                    attempt = job.attempt,
                    error = %e,
                    "Callback delivery failed"
                );
                self.reschedule(job)
            }
        }
    }

    fn reschedule(&self, job: Job) -> Delivery {
        let Some(delay) = self.schedule.get(job.attempt).copied() else {
            warn!(
                promotion_id = %job.result.promotion_id(),
                url = %job.target.url,
                attempts = job.attempt,
                "Dropping callback after final redelivery"
            );
            return Delivery::Dropped;
        };

        let attempt = job.attempt + 1;
        let scheduled = Scheduled {
            due: Instant::now() + delay,
            seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
            job: Job { attempt, ..job },
        };
        debug!(attempt, delay = ?delay, "Scheduled callback redelivery");
        lock(&self.queue).push(Reverse(scheduled));
        self.wake.notify_one();
        Delivery::Scheduled { attempt, delay }
    }

    /// Remove every entry due by `now`, returning them with the next due time.
    fn take_due(&self, now: Instant) -> (Vec<Job>, Option<Instant>) {
        let mut queue = lock(&self.queue);
        let mut due = Vec::new();
        while queue.peek().is_some_and(|Reverse(next)| next.due <= now) {
            if let Some(Reverse(scheduled)) = queue.pop() {
                due.push(scheduled.job);
            }
        }
        (due, queue.peek().map(|Reverse(next)| next.due))
    }
}

async fn drain(shared: Arc<Shared>, mut shutdown: watch::Receiver<bool>) {
    debug!("Callback redelivery worker started");
    loop {
        let (due, next) = shared.take_due(Instant::now());
        for job in due {
            let shared = Arc::clone(&shared);
            tokio::spawn(async move {
                shared.deliver(job).await;
            });
        }

        let sleep = async {
            match next {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            _ = shared.wake.notified() => {}
            _ = sleep => {}
        }
    }
    debug!("Callback redelivery worker stopped");
}

/// Delivers promotion results to caller-supplied webhooks.
pub struct CallbackDispatcher {
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl CallbackDispatcher {
    pub fn new(config: &CallbackConfig) -> Result<Self, ConfigError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;
        let (shutdown, _) = watch::channel(false);

        Ok(Self {
            shared: Arc::new(Shared {
                client,
                schedule: redelivery_schedule(config.base_delay(), config.max_attempts),
                queue: Mutex::new(BinaryHeap::new()),
                wake: Notify::new(),
                next_seq: AtomicU64::new(0),
                shutdown,
            }),
            worker: Mutex::new(None),
        })
    }

    /// Start the redelivery worker. Idempotent, and a no-op after
    /// [`shutdown`](Self::shutdown); must run inside a tokio runtime.
    pub fn start(&self) {
        let mut worker = self.worker.lock().unwrap_or_else(|p| p.into_inner());
        if worker.is_none() && !*self.shared.shutdown.borrow() {
            let receiver = self.shared.shutdown.subscribe();
            *worker = Some(tokio::spawn(drain(Arc::clone(&self.shared), receiver)));
        }
    }

    /// Stop the redelivery worker. Queued redeliveries are abandoned.
    pub async fn shutdown(&self) {
        let _ = self.shared.shutdown.send(true);
        let worker = self
            .worker
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .take();
        if let Some(worker) = worker {
            let _ = worker.await;
        }
        info!(abandoned = self.pending(), "Callback dispatcher stopped");
    }

    /// Hand `result` to `target` in the background.
    pub fn dispatch(&self, target: CallbackTarget, result: PromoteResult) {
        self.start();
        let shared = Arc::clone(&self.shared);
        tokio::spawn(async move {
            shared
                .deliver(Job {
                    target,
                    result: Arc::new(result),
                    attempt: 0,
                })
                .await;
        });
    }

    /// Attempt delivery now. `attempt` counts redeliveries already made;
    /// a failure queues the next one.
    pub async fn deliver(
        &self,
        target: &CallbackTarget,
        result: &PromoteResult,
        attempt: usize,
    ) -> Delivery {
        self.start();
        self.shared
            .deliver(Job {
                target: target.clone(),
                result: Arc::new(result.clone()),
                attempt,
            })
            .await
    }

    /// Redeliveries waiting in the queue.
    pub fn pending(&self) -> usize {
        lock(&self.shared.queue).len()
    }

    /// Waits before each redelivery, in order.
    pub fn schedule(&self) -> &[Duration] {
        &self.shared.schedule
    }
}

#[cfg(test)]
mod tests;
