use std::sync::Arc;
use std::time::Duration;

use rand::Rng;

use crate::error::Error;

/// Context handed to a [BackoffStrategy] before each retry.
pub struct BackoffContext<'a> {
    /// Number of attempts performed so far (the first attempt counts as 1).
    pub retries_attempted: u32,
    /// The error that failed the last attempt.
    pub last_error: &'a Error,
}

/// BackoffStrategy computes the delay before the next attempt. Strategies
/// are pure: given the same context they may jitter but must not block or
/// perform I/O.
pub trait BackoffStrategy: Send + Sync {
    fn delay(&self, ctx: &BackoffContext<'_>) -> Duration;
}

/// RetryPolicy bounds how many times a transaction is replayed and how long
/// to pause between attempts.
#[derive(Clone)]
pub struct RetryPolicy {
    max_retries: u32,
    backoff: Arc<dyn BackoffStrategy>,
}

pub const DEFAULT_MAX_RETRIES: u32 = 4;

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        RetryPolicy {
            max_retries,
            backoff: Arc::new(ExponentialJitterBackoff::default()),
        }
    }

    pub fn with_backoff(mut self, backoff: Arc<dyn BackoffStrategy>) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub(crate) fn delay(&self, retries_attempted: u32, last_error: &Error) -> Duration {
        self.backoff.delay(&BackoffContext {
            retries_attempted,
            last_error,
        })
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::new(DEFAULT_MAX_RETRIES)
    }
}

/// ExponentialJitterBackoff selects a random delay between zero and an
/// envelope that doubles per attempt, capped at `cap`. It might seem
/// counterintuitive to have so much jitter, but
/// <https://www.awsarchitectureblog.com/2015/03/backoff.html> argues that
/// that is the best strategy.
#[derive(Clone, Debug)]
pub struct ExponentialJitterBackoff {
    pub base: Duration,
    pub cap: Duration,
}

impl Default for ExponentialJitterBackoff {
    fn default() -> Self {
        ExponentialJitterBackoff {
            base: Duration::from_millis(10),
            cap: Duration::from_millis(5000),
        }
    }
}

impl BackoffStrategy for ExponentialJitterBackoff {
    fn delay(&self, ctx: &BackoffContext<'_>) -> Duration {
        let exponent = ctx.retries_attempted.min(32);
        let envelope = (self.base.as_millis() as u64)
            .saturating_mul(1u64 << exponent)
            .min(self.cap.as_millis() as u64);
        let mut rng = rand::thread_rng();
        Duration::from_millis(rng.gen_range(0..=envelope))
    }
}
