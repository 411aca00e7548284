//! Deadline policy for callguard pipelines.
//!
//! [`TimeoutPolicy`] races the wrapped operation against a timer and against
//! the caller's cancellation token:
//!
//! - the operation finishes first: its result is returned unchanged;
//! - the timer fires first: the operation's token is cancelled, its future is
//!   dropped, and [`PolicyError::Timeout`] is returned;
//! - the caller cancels first: [`PolicyError::Cancelled`] is returned, never a
//!   timeout.
//!
//! The operation receives a child of the caller's token, so cancelling the
//! caller also cancels it.
//!
//! ## Example
//!
//! ```rust
//! use callguard_core::{operation, CancellationToken, Policy};
//! use callguard_timeout::TimeoutPolicy;
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread", start_paused = true)]
//! # async fn main() {
//! let policy = TimeoutPolicy::builder()
//!     .timeout_duration(Duration::from_millis(100))
//!     .name("profile-lookup")
//!     .on_timeout(|limit| eprintln!("gave up after {limit:?}"))
//!     .build();
//!
//! let slow = operation(|_cancel| async {
//!     tokio::time::sleep(Duration::from_secs(1)).await;
//!     Ok::<_, std::io::Error>("profile")
//! });
//!
//! let err = policy.execute(slow, CancellationToken::new()).await.unwrap_err();
//! assert!(err.is_timeout());
//! # }
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use callguard_core::{CancellationToken, Operation, OperationFuture, Policy, PolicyError};

#[cfg(feature = "metrics")]
use metrics::{counter, describe_counter, describe_histogram, histogram};
#[cfg(feature = "metrics")]
use std::sync::Once;

#[cfg(feature = "tracing")]
use tracing::{debug, warn};

pub use config::TimeoutPolicyBuilder;
pub use events::TimeoutEvent;

mod config;
mod events;

use config::TimeoutConfig;

#[cfg(feature = "metrics")]
static METRICS_INIT: Once = Once::new();

/// Bounds how long a single call may run.
#[derive(Clone)]
pub struct TimeoutPolicy {
    config: Arc<TimeoutConfig>,
}

enum Outcome<T, E> {
    Completed(Result<T, PolicyError<E>>),
    TimedOut,
    Cancelled,
}

impl TimeoutPolicy {
    /// Creates a policy with the given deadline and default settings.
    pub fn new(timeout: Duration) -> Self {
        Self::builder().timeout_duration(timeout).build()
    }

    /// Returns a builder.
    pub fn builder() -> TimeoutPolicyBuilder {
        TimeoutPolicyBuilder::new()
    }

    pub(crate) fn from_config(config: Arc<TimeoutConfig>) -> Self {
        #[cfg(feature = "metrics")]
        {
            METRICS_INIT.call_once(|| {
                describe_counter!(
                    "timeout_calls_total",
                    "Total number of calls through the timeout policy (success, error, timeout)"
                );
                describe_histogram!(
                    "timeout_call_duration_seconds",
                    "Duration of calls that completed before the deadline"
                );
            });
        }
        Self { config }
    }

    /// The configured deadline.
    pub fn timeout(&self) -> Duration {
        self.config.timeout_duration
    }

    /// The instance name.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    fn record_completion<T, E>(&self, result: &Result<T, PolicyError<E>>, elapsed: Duration) {
        let config = &self.config;
        let (event, _outcome) = match result {
            Ok(_) => (
                TimeoutEvent::Success {
                    policy_name: config.name.clone(),
                    timestamp: Instant::now(),
                    duration: elapsed,
                },
                "success",
            ),
            Err(_) => (
                TimeoutEvent::Error {
                    policy_name: config.name.clone(),
                    timestamp: Instant::now(),
                    duration: elapsed,
                },
                "error",
            ),
        };
        config.event_listeners.emit(&event);

        #[cfg(feature = "metrics")]
        {
            counter!("timeout_calls_total", "policy" => config.name.clone(), "outcome" => _outcome)
                .increment(1);
            histogram!("timeout_call_duration_seconds", "policy" => config.name.clone())
                .record(elapsed.as_secs_f64());
        }

        #[cfg(feature = "tracing")]
        debug!(
            policy = %config.name,
            outcome = _outcome,
            duration_ms = elapsed.as_millis() as u64,
            "Call completed within deadline"
        );
    }

    fn record_timeout(&self) {
        let config = &self.config;
        config.event_listeners.emit(&TimeoutEvent::Timeout {
            policy_name: config.name.clone(),
            timestamp: Instant::now(),
            timeout: config.timeout_duration,
        });

        #[cfg(feature = "metrics")]
        counter!("timeout_calls_total", "policy" => config.name.clone(), "outcome" => "timeout")
            .increment(1);

        #[cfg(feature = "tracing")]
        warn!(
            policy = %config.name,
            timeout_ms = config.timeout_duration.as_millis() as u64,
            "Call timed out"
        );
    }
}

impl<T, E> Policy<T, E> for TimeoutPolicy
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
            let timeout = self.config.timeout_duration;
            let child = cancel.child_token();
            let start = tokio::time::Instant::now();

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => Outcome::Cancelled,
                result = operation(child.clone()) => Outcome::Completed(result),
                _ = tokio::time::sleep(timeout) => Outcome::TimedOut,
            };

            match outcome {
                Outcome::Completed(result) => {
                    if result.is_err() && cancel.is_cancelled() {
                        return result;
                    }
                    self.record_completion(&result, start.elapsed());
                    result
                }
                Outcome::TimedOut => {
                    child.cancel();
                    self.record_timeout();
                    Err(PolicyError::Timeout { timeout })
                }
                Outcome::Cancelled => Err(PolicyError::Cancelled),
            }
        })
    }
}
