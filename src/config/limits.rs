//! Resource limits for the worker pools and remote batching.
//!
//! Both pools enforce an admission threshold: work submitted while
//! `threshold` units are already admitted (running or waiting for a worker)
//! is rejected as overloaded instead of queuing without bound.

use serde::Deserialize;

/// Default number of concurrently running promotion/rollback units.
pub const DEFAULT_PROMOTION_THREADS: usize = 8;

/// Default admission threshold of the promotion pool.
pub const DEFAULT_PROMOTION_THRESHOLD: usize = 64;

/// Default number of concurrently running validation rules.
pub const DEFAULT_RULE_THREADS: usize = 16;

/// Default admission threshold of the rule pool.
pub const DEFAULT_RULE_THRESHOLD: usize = 256;

/// Default maximum paths per cache-presence check against a remote source.
pub const DEFAULT_REMOTE_BATCH_SIZE: usize = 1000;

/// Sizing of one worker pool.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PoolLimits {
    /// Units allowed to run at the same time.
    pub threads: usize,

    /// Units allowed to be admitted (running plus waiting).
    ///
    /// Always treated as at least `threads`.
    pub threshold: usize,
}

impl PoolLimits {
    pub fn new(threads: usize, threshold: usize) -> Self {
        Self { threads, threshold }
    }

    /// Limits for the promotion/rollback pool.
    pub fn promotion() -> Self {
        Self::new(DEFAULT_PROMOTION_THREADS, DEFAULT_PROMOTION_THRESHOLD)
    }

    /// Limits for the validation-rule pool.
    pub fn rules() -> Self {
        Self::new(DEFAULT_RULE_THREADS, DEFAULT_RULE_THRESHOLD)
    }

    /// Threshold actually enforced.
    pub fn effective_threshold(&self) -> usize {
        self.threshold.max(self.threads).max(1)
    }
}

impl Default for PoolLimits {
    fn default() -> Self {
        Self::promotion()
    }
}

/// Limits applied when re-hydrating paths from a remote source.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RemoteLimits {
    /// Maximum paths per cache-presence check.
    pub batch_size: usize,
}

impl Default for RemoteLimits {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_REMOTE_BATCH_SIZE,
        }
    }
}
