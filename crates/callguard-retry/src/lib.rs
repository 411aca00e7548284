//! Retry policy for callguard pipelines.
//!
//! [`RetryPolicy`] re-invokes the wrapped operation until it succeeds, the
//! retry predicate rejects the failure, or `max_attempts` is reached. The
//! last observed error is surfaced unchanged.
//!
//! Caller cancellation is never retried: once the caller's token has fired the
//! policy stops at once and returns `Cancelled`. The backoff wait itself races
//! the caller's token. A [`PolicyError::Cancelled`] reported by an inner layer
//! while the caller's token is still live is an ordinary failure.
//!
//! ## Example
//!
//! ```rust
//! use callguard_core::{operation, CancellationToken, Policy};
//! use callguard_retry::RetryPolicy;
//! use std::sync::atomic::{AtomicU32, Ordering};
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread", start_paused = true)]
//! # async fn main() {
//! let policy = RetryPolicy::<std::io::Error>::builder()
//!     .max_attempts(5)
//!     .jitter_backoff(Duration::from_millis(50), Duration::from_secs(2))
//!     .retry_transient()
//!     .on_retry(|attempt, delay| println!("attempt {attempt} failed, waiting {delay:?}"))
//!     .build();
//!
//! let calls = AtomicU32::new(0);
//! let op = operation(|_cancel| {
//!     let n = calls.fetch_add(1, Ordering::SeqCst);
//!     async move {
//!         if n < 2 {
//!             Err(std::io::Error::from(std::io::ErrorKind::ConnectionReset))
//!         } else {
//!             Ok("connected")
//!         }
//!     }
//! });
//!
//! let value = policy.execute(op, CancellationToken::new()).await.unwrap();
//! assert_eq!(value, "connected");
//! assert_eq!(calls.load(Ordering::SeqCst), 3);
//! # }
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use callguard_core::{CancellationToken, Operation, OperationFuture, Policy, PolicyError};

#[cfg(feature = "metrics")]
use metrics::{counter, describe_counter};
#[cfg(feature = "metrics")]
use std::sync::Once;

#[cfg(feature = "tracing")]
use tracing::{debug, warn};

mod backoff;
mod config;
mod events;

pub use backoff::{
    ExponentialBackoff, FixedInterval, FnInterval, FullJitterBackoff, IntervalFunction,
};
pub use config::RetryPolicyBuilder;
pub use events::RetryEvent;

use config::RetryConfig;

#[cfg(feature = "metrics")]
static METRICS_INIT: Once = Once::new();

/// Re-invokes a failing operation with backoff between attempts.
pub struct RetryPolicy<E> {
    config: Arc<RetryConfig<E>>,
}

impl<E> Clone for RetryPolicy<E> {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
        }
    }
}

impl<E> RetryPolicy<E> {
    /// Returns a builder.
    pub fn builder() -> RetryPolicyBuilder<E> {
        RetryPolicyBuilder::new()
    }

    /// Creates a policy making up to `max_attempts` attempts with the default
    /// backoff.
    ///
    /// # Panics
    ///
    /// Panics if `max_attempts` is 0.
    pub fn new(max_attempts: u32) -> Self {
        Self::builder().max_attempts(max_attempts).build()
    }

    pub(crate) fn from_config(config: Arc<RetryConfig<E>>) -> Self {
        #[cfg(feature = "metrics")]
        {
            METRICS_INIT.call_once(|| {
                describe_counter!(
                    "retry_calls_total",
                    "Total number of calls through the retry policy by final outcome"
                );
                describe_counter!(
                    "retry_attempts_total",
                    "Total number of retries scheduled"
                );
            });
        }
        Self { config }
    }

    /// Total attempts, including the first.
    pub fn max_attempts(&self) -> u32 {
        self.config.max_attempts
    }

    /// The instance name.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    fn finish(&self, event: RetryEvent) {
        #[cfg(feature = "metrics")]
        {
            let outcome = match &event {
                RetryEvent::Success { .. } => "success",
                RetryEvent::Error { .. } => "exhausted",
                RetryEvent::IgnoredError { .. } => "ignored",
                RetryEvent::Retry { .. } => "retry",
            };
            counter!("retry_calls_total", "policy" => self.config.name.clone(), "outcome" => outcome)
                .increment(1);
        }

        #[cfg(feature = "tracing")]
        {
            match &event {
                RetryEvent::Error { attempts, .. } => warn!(
                    policy = %self.config.name,
                    attempts = *attempts,
                    "Retries exhausted"
                ),
                RetryEvent::Success { attempts, .. } if *attempts > 1 => debug!(
                    policy = %self.config.name,
                    attempts = *attempts,
                    "Succeeded after retrying"
                ),
                _ => {}
            }
        }

        self.config.event_listeners.emit(&event);
    }

    fn schedule(&self, attempt: u32, error: &PolicyError<E>, delay: Duration) {
        #[cfg(feature = "metrics")]
        counter!("retry_attempts_total", "policy" => self.config.name.clone()).increment(1);

        #[cfg(feature = "tracing")]
        debug!(
            policy = %self.config.name,
            attempt,
            error_kind = error.kind(),
            delay_ms = delay.as_millis() as u64,
            "Scheduling retry"
        );

        for observer in &self.config.retry_observers {
            observer(attempt, error, delay);
        }

        self.config.event_listeners.emit(&RetryEvent::Retry {
            policy_name: self.config.name.clone(),
            timestamp: Instant::now(),
            attempt,
            delay,
            error_kind: error.kind(),
        });
    }
}

impl<T, E> Policy<T, E> for RetryPolicy<E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    fn execute<'a>(
        &'a self,
        operation: Operation<'a, T, E>,
        cancel: CancellationToken,
    ) -> OperationFuture<'a, T, E> {
        Box::pin(async move {
            let config = &self.config;
            let mut attempt: u32 = 0;

            loop {
                attempt += 1;

                let error = match operation(cancel.clone()).await {
                    Ok(value) => {
                        self.finish(RetryEvent::Success {
                            policy_name: config.name.clone(),
                            timestamp: Instant::now(),
                            attempts: attempt,
                        });
                        return Ok(value);
                    }
                    Err(error) => error,
                };

                if cancel.is_cancelled() {
                    return Err(PolicyError::Cancelled);
                }

                if attempt >= config.max_attempts {
                    self.finish(RetryEvent::Error {
                        policy_name: config.name.clone(),
                        timestamp: Instant::now(),
                        attempts: attempt,
                    });
                    return Err(error);
                }

                if !config.should_retry(&error) {
                    self.finish(RetryEvent::IgnoredError {
                        policy_name: config.name.clone(),
                        timestamp: Instant::now(),
                    });
                    return Err(error);
                }

                let delay = config.interval_fn.next_interval(attempt, &error);
                self.schedule(attempt, &error, delay);
                drop(error);

                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(PolicyError::Cancelled),
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        })
    }
}
