//! Bounded retries for callers of the engine.
//!
//! The engine never retries on its own. It reports [`Error::Conflict`] and
//! [`Error::Unavailable`] as retryable and leaves the decision to the
//! caller. [`RetryPolicy`] is a ready-made way to act on that.

use core::cmp;
use core::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio::time::sleep;
use tracing::debug;

use crate::error::Error;

//------------ RetryPolicy ---------------------------------------------------

/// Exponential backoff with jitter.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct RetryPolicy {
    /// The number of attempts including the first one.
    max_attempts: usize,

    initial_backoff: Duration,
    max_backoff: Duration,

    /// Whether to add up to half the backoff at random.
    jitter: bool,
}

impl RetryPolicy {
    pub fn new() -> Self {
        Default::default()
    }

    /// A policy that tries exactly once.
    pub fn never() -> Self {
        RetryPolicy {
            max_attempts: 1,
            ..Default::default()
        }
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    pub fn set_max_attempts(&mut self, value: usize) {
        self.max_attempts = cmp::max(value, 1);
    }

    pub fn set_backoff(&mut self, initial: Duration, max: Duration) {
        self.initial_backoff = initial;
        self.max_backoff = cmp::max(initial, max);
    }

    pub fn set_jitter(&mut self, jitter: bool) {
        self.jitter = jitter;
    }

    /// Returns the delay before the given retry, counting from zero.
    pub fn backoff(&self, retry: usize) -> Duration {
        let factor = 1u32.checked_shl(retry as u32).unwrap_or(u32::MAX);
        cmp::min(
            self.initial_backoff.saturating_mul(factor),
            self.max_backoff,
        )
    }

    /// Runs an operation until it succeeds, fails for good, or runs out of
    /// attempts.
    ///
    /// Only errors for which [`Error::is_retryable()`] is true are retried.
    /// The last error is returned.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T, Error>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, Error>>,
    {
        let mut retry = 0;
        loop {
            match op().await {
                Ok(res) => return Ok(res),
                Err(err)
                    if err.is_retryable()
                        && retry + 1 < self.max_attempts =>
                {
                    let delay = self.delay(retry);
                    debug!("Retrying in {delay:?} after: {err}");
                    sleep(delay).await;
                    retry += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn delay(&self, retry: usize) -> Duration {
        let backoff = self.backoff(retry);
        if !self.jitter {
            return backoff;
        }
        let extra = rand::thread_rng().gen_range(0..=backoff.as_millis() / 2);
        backoff + Duration::from_millis(extra as u64)
    }
}

//--- Default

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(5),
            jitter: true,
        }
    }
}

//============ Testing =======================================================
