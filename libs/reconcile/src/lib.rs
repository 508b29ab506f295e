//! Reconciliation polling primitives.
//!
//! Provider-side actions run asynchronously and are observed by polling a
//! handle until it reaches a terminal state. This library provides the
//! bounded loop used for that:
//!
//! - **Check**: one fetch of the observed state, reporting `Done` or `Pending`.
//! - **Interval**: fixed sleep between two attempts.
//! - **Timeout**: overall budget; once another sleep would exceed it, the loop
//!   gives up and hands back the last pending snapshot.
//!
//! # Invariants
//!
//! - The first attempt runs immediately, without sleeping
//! - A check error aborts the loop at once, no further attempts are issued
//! - Time is read from `tokio::time`, so a paused test clock drives the loop

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;
use tracing::trace;

/// Default interval between two attempts.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Default overall polling budget.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(180);

/// Polling errors.
#[derive(Debug, Error)]
pub enum PollError<T, E> {
    /// The observed state never became terminal within the budget.
    #[error("timed out after {elapsed:?} ({attempts} attempts)")]
    Timeout {
        elapsed: Duration,
        attempts: u32,
        /// Last pending snapshot, kept for diagnostics.
        last: Option<T>,
    },

    /// The check failed.
    #[error(transparent)]
    Aborted(E),
}

/// Result of a single attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Progress<T> {
    /// Terminal state reached.
    Done(T),

    /// Not terminal yet.
    Pending(T),
}

/// Interval and timeout for a polling loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    /// Sleep between two attempts.
    pub interval: Duration,

    /// Overall budget.
    pub timeout: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_POLL_TIMEOUT,
        }
    }
}

impl PollConfig {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }

    /// Upper bound on the number of attempts a never-terminal loop issues.
    pub fn max_attempts(&self) -> u32 {
        if self.interval.is_zero() {
            return u32::MAX;
        }
        (self.timeout.as_nanos() / self.interval.as_nanos()) as u32 + 1
    }
}

/// Check until `Done`, a check error, or the timeout.
///
/// Returns the terminal value together with the number of attempts issued.
pub async fn poll_until<T, E, F, Fut>(
    config: &PollConfig,
    mut check: F,
) -> Result<(T, u32), PollError<T, E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Progress<T>, E>>,
{
    let started = Instant::now();
    let deadline = started + config.timeout;
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        let last = match check().await {
            Ok(Progress::Done(value)) => return Ok((value, attempts)),
            Ok(Progress::Pending(value)) => value,
            Err(e) => return Err(PollError::Aborted(e)),
        };

        if Instant::now() + config.interval > deadline {
            return Err(PollError::Timeout {
                elapsed: started.elapsed(),
                attempts,
                last: Some(last),
            });
        }

        trace!(attempts, interval_ms = config.interval.as_millis() as u64, "Still pending");
        tokio::time::sleep(config.interval).await;
    }
}
