//! Retry with exponential backoff around external calls.
//!
//! The outcome of a retried call is a tagged value rather than an early
//! return so the caller decides whether exhaustion is fatal.

use crate::defaults;
use crate::error::{CallsumError, Result};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Blocks the calling worker between attempts.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration);
}

/// Real sleeper using `std::thread::sleep`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Sleeper that records requested delays and returns immediately.
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    sleeps: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        if let Ok(mut sleeps) = self.sleeps.lock() {
            sleeps.push(duration);
        }
    }
}

/// Result of a retried call.
#[derive(Debug)]
pub enum RetryOutcome<T> {
    /// The call succeeded on attempt number `attempts`.
    Ok { value: T, attempts: u32 },
    /// Every attempt failed; `cause` is the last error.
    Exhausted { attempts: u32, cause: CallsumError },
    /// A non-retryable error stopped the loop early.
    Fatal(CallsumError),
}

impl<T> RetryOutcome<T> {
    /// Convert into a `Result`, wrapping exhaustion into `RetryExhausted`.
    pub fn into_result(self, operation: &str) -> Result<T> {
        match self {
            RetryOutcome::Ok { value, .. } => Ok(value),
            RetryOutcome::Exhausted { attempts, cause } => Err(CallsumError::RetryExhausted {
                operation: operation.to_string(),
                attempts,
                source: Box::new(cause),
            }),
            RetryOutcome::Fatal(cause) => Err(cause),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, RetryOutcome::Ok { .. })
    }
}

/// Bounded retry with a delay that doubles after every failed attempt.
#[derive(Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    sleeper: Arc<dyn Sleeper>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(
            defaults::MAX_ATTEMPTS,
            Duration::from_millis(defaults::BASE_DELAY_MS),
        )
    }
}

impl std::fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("base_delay", &self.base_delay)
            .finish()
    }
}

impl RetryPolicy {
    /// `max_attempts` is clamped to at least one.
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            sleeper: Arc::new(ThreadSleeper),
        }
    }

    /// Sets a custom sleeper (for deterministic testing).
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay after the failed attempt with 0-based index `attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
    }

    /// Run `call` until it succeeds, fails non-retryably, or runs out of attempts.
    pub fn run<T, F>(&self, operation: &str, mut call: F) -> RetryOutcome<T>
    where
        F: FnMut() -> Result<T>,
    {
        let mut attempt = 0;
        loop {
            match call() {
                Ok(value) => {
                    return RetryOutcome::Ok {
                        value,
                        attempts: attempt + 1,
                    };
                }
                Err(e) if !e.is_retryable() => return RetryOutcome::Fatal(e),
                Err(e) if attempt + 1 >= self.max_attempts => {
                    tracing::error!(
                        "{operation}: attempt {}/{} failed, giving up: {e}",
                        attempt + 1,
                        self.max_attempts
                    );
                    return RetryOutcome::Exhausted {
                        attempts: attempt + 1,
                        cause: e,
                    };
                }
                Err(e) => {
                    let delay = self.delay_for(attempt);
                    tracing::warn!(
                        "{operation}: attempt {}/{} failed, retrying in {}: {e}",
                        attempt + 1,
                        self.max_attempts,
                        humantime::format_duration(delay)
                    );
                    self.sleeper.sleep(delay);
                    attempt += 1;
                }
            }
        }
    }

    /// [`run`](Self::run) followed by [`RetryOutcome::into_result`].
    pub fn call<T, F>(&self, operation: &str, call: F) -> Result<T>
    where
        F: FnMut() -> Result<T>,
    {
        self.run(operation, call).into_result(operation)
    }
}
