//! Backoff strategies.
//!
//! Attempt numbers are 1-based and name the attempt that just failed, so the
//! wait before the second attempt is `next_interval(1, ..)`.

use std::marker::PhantomData;
use std::time::Duration;

use callguard_core::{JitterBackoff, PolicyError};

/// Computes how long to wait before the next attempt.
pub trait IntervalFunction<E>: Send + Sync {
    /// Delay after `attempt` failed with `error`.
    fn next_interval(&self, attempt: u32, error: &PolicyError<E>) -> Duration;
}

/// Waits the same duration before every retry.
#[derive(Debug, Clone)]
pub struct FixedInterval {
    duration: Duration,
}

impl FixedInterval {
    /// Creates a fixed interval backoff.
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }
}

impl<E> IntervalFunction<E> for FixedInterval {
    fn next_interval(&self, _attempt: u32, _error: &PolicyError<E>) -> Duration {
        self.duration
    }
}

/// Exponential backoff with configurable multiplier.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    initial_interval: Duration,
    multiplier: f64,
    max_interval: Option<Duration>,
}

impl ExponentialBackoff {
    /// Creates an exponential backoff with a multiplier of 2.0.
    pub fn new(initial_interval: Duration) -> Self {
        Self {
            initial_interval,
            multiplier: 2.0,
            max_interval: None,
        }
    }

    /// Sets the growth factor.
    ///
    /// Values below 1.0, and NaN, are treated as 1.0 so intervals never shrink.
    pub fn multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = if multiplier >= 1.0 { multiplier } else { 1.0 };
        self
    }

    /// Caps the interval.
    pub fn max_interval(mut self, max_interval: Duration) -> Self {
        self.max_interval = Some(max_interval);
        self
    }

    fn interval(&self, attempt: u32) -> Duration {
        if self.initial_interval.is_zero() {
            return Duration::ZERO;
        }
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.initial_interval.as_secs_f64() * self.multiplier.powi(exponent);
        let interval = Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX);

        match self.max_interval {
            Some(max) => interval.min(max),
            None => interval,
        }
    }
}

impl<E> IntervalFunction<E> for ExponentialBackoff {
    fn next_interval(&self, attempt: u32, _error: &PolicyError<E>) -> Duration {
        self.interval(attempt)
    }
}

/// Full-jitter backoff: uniform in `[0, min(cap, base * 2^attempt)]`.
#[derive(Debug, Clone)]
pub struct FullJitterBackoff {
    jitter: JitterBackoff,
}

impl FullJitterBackoff {
    /// Creates a full-jitter backoff with no cap.
    pub fn new(base: Duration) -> Self {
        Self {
            jitter: JitterBackoff::new(base),
        }
    }

    /// Caps every delay at `max_delay`.
    pub fn max_delay(mut self, max_delay: Duration) -> Self {
        self.jitter = self.jitter.max_delay(max_delay);
        self
    }
}

impl From<JitterBackoff> for FullJitterBackoff {
    fn from(jitter: JitterBackoff) -> Self {
        Self { jitter }
    }
}

impl<E> IntervalFunction<E> for FullJitterBackoff {
    fn next_interval(&self, attempt: u32, _error: &PolicyError<E>) -> Duration {
        self.jitter.delay(attempt)
    }
}

/// Closure-backed interval, for delays that depend on the error.
///
/// ```rust
/// use callguard_core::PolicyError;
/// use callguard_retry::{FnInterval, IntervalFunction};
/// use std::time::Duration;
///
/// // Back off harder after timeouts.
/// let interval = FnInterval::new(|attempt, err: &PolicyError<std::io::Error>| {
///     let base = if err.is_timeout() { 500 } else { 50 };
///     Duration::from_millis(base * u64::from(attempt))
/// });
///
/// let timeout = PolicyError::Timeout { timeout: Duration::from_secs(1) };
/// assert_eq!(interval.next_interval(2, &timeout), Duration::from_secs(1));
/// ```
pub struct FnInterval<F, E> {
    f: F,
    _error: PhantomData<fn(&E)>,
}

impl<F, E> FnInterval<F, E>
where
    F: Fn(u32, &PolicyError<E>) -> Duration + Send + Sync,
{
    /// Wraps `f`.
    pub fn new(f: F) -> Self {
        Self {
            f,
            _error: PhantomData,
        }
    }
}

impl<F, E> IntervalFunction<E> for FnInterval<F, E>
where
    F: Fn(u32, &PolicyError<E>) -> Duration + Send + Sync,
{
    fn next_interval(&self, attempt: u32, error: &PolicyError<E>) -> Duration {
        (self.f)(attempt, error)
    }
}
