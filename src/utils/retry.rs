//! Retry utilities: backoff builders for callback redelivery.
//!
//! Uses `backon` for exponential backoff. Callback redelivery waits
//! `base * 2^n` for attempt `n`, without jitter, so the schedule is
//! predictable for the receiving side.

use std::time::Duration;

use backon::{BackoffBuilder, ExponentialBuilder};

/// Default delay before the first callback redelivery.
pub const DEFAULT_CALLBACK_BASE_DELAY: Duration = Duration::from_secs(60);

/// Default number of redelivery attempts before a callback is dropped.
pub const DEFAULT_CALLBACK_MAX_ATTEMPTS: usize = 8;

/// Backoff for callback redelivery.
///
/// - Min delay: `base`
/// - Factor: 2
/// - Max attempts: `max_attempts`
/// - No jitter
pub fn callback_backoff(base: Duration, max_attempts: usize) -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(base)
        .with_factor(2.0)
        .without_max_delay()
        .with_max_times(max_attempts)
}

/// Materialize the redelivery schedule: entry `n` is the wait before
/// redelivery attempt `n + 1`.
pub fn redelivery_schedule(base: Duration, max_attempts: usize) -> Vec<Duration> {
    callback_backoff(base, max_attempts).build().collect()
}
