//! Full-jitter exponential backoff.
//!
//! The delay for attempt `n` is drawn uniformly from
//! `[0, min(max_delay, base * 2^n)]`. Spreading retries over the whole window
//! keeps a crowd of failing clients from retrying in lockstep.

use std::time::Duration;

use rand::Rng;

/// Stateless full-jitter delay calculator.
///
/// ```rust
/// use callguard_core::JitterBackoff;
/// use std::time::Duration;
///
/// let backoff = JitterBackoff::new(Duration::from_millis(100))
///     .max_delay(Duration::from_secs(2));
///
/// assert_eq!(backoff.ceiling(1), Duration::from_millis(200));
/// assert_eq!(backoff.ceiling(10), Duration::from_secs(2));
/// assert!(backoff.delay(3) <= Duration::from_millis(800));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JitterBackoff {
    base: Duration,
    max_delay: Option<Duration>,
}

impl JitterBackoff {
    /// Creates a calculator with no upper bound.
    pub fn new(base: Duration) -> Self {
        Self {
            base,
            max_delay: None,
        }
    }

    /// Caps every delay at `max_delay`.
    pub fn max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = Some(max_delay);
        self
    }

    /// The base delay.
    pub fn base(&self) -> Duration {
        self.base
    }

    /// The configured cap, if any.
    pub fn cap(&self) -> Option<Duration> {
        self.max_delay
    }

    /// Upper bound of the window for `attempt`: `min(cap, base * 2^attempt)`.
    ///
    /// Saturates instead of overflowing. A zero base stays at zero for every
    /// attempt.
    pub fn ceiling(&self, attempt: u32) -> Duration {
        if self.base.is_zero() {
            return Duration::ZERO;
        }
        let grown = 1u32
            .checked_shl(attempt)
            .and_then(|factor| self.base.checked_mul(factor))
            .unwrap_or(Duration::MAX);

        match self.max_delay {
            Some(cap) => grown.min(cap),
            None => grown,
        }
    }

    /// Draws a delay for `attempt` from the thread-local RNG.
    pub fn delay(&self, attempt: u32) -> Duration {
        self.delay_with_rng(attempt, &mut rand::rng())
    }

    /// Draws a delay for `attempt` from `rng`.
    pub fn delay_with_rng<R: Rng + ?Sized>(&self, attempt: u32, rng: &mut R) -> Duration {
        let ceiling = self.ceiling(attempt);
        if ceiling.is_zero() {
            return Duration::ZERO;
        }
        let nanos = u64::try_from(ceiling.as_nanos()).unwrap_or(u64::MAX);
        Duration::from_nanos(rng.random_range(0..=nanos))
    }
}
