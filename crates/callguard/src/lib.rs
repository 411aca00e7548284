//! Composable async resilience pipelines.
//!
//! `callguard` wraps a cancellable async operation in an ordered list of
//! policies. Each policy decorates the one inside it, so a pipeline of
//! `[retry, circuit breaker, timeout]` retries calls that go through a breaker,
//! each attempt bounded by its own deadline.
//!
//! | Policy | Feature | What it does |
//! |---|---|---|
//! | [`timeout::TimeoutPolicy`] | `timeout` | Bounds a call with a deadline |
//! | [`retry::RetryPolicy`] | `retry` | Re-invokes failed calls with backoff |
//! | [`circuitbreaker::CircuitBreakerPolicy`] | `circuitbreaker` | Stops calling a failing dependency |
//! | [`bulkhead::BulkheadPolicy`] | `bulkhead` | Bounds parallelism with an optional queue |
//! | [`debounce::DebouncePolicy`] | `debounce` | Waits a quiet period before calling |
//!
//! The `full` feature enables all of them.
//!
//! ## Composition
//!
//! [`PolicyRunner`] folds a slice of policies around one operation, first
//! policy outermost. [`PolicyStack`] keeps a named list of shared policies and
//! reports one [`PipelineEvent`] per call. [`PolicyLayer`] runs a stack around
//! a tower service.
//!
//! ```rust
//! use std::time::Duration;
//! use callguard::{operation, CancellationToken, PolicyStack};
//! use callguard::circuitbreaker::CircuitBreakerPolicy;
//! use callguard::retry::RetryPolicy;
//! use callguard::timeout::TimeoutPolicy;
//!
//! # #[tokio::main(flavor = "current_thread", start_paused = true)]
//! # async fn main() {
//! let stack = PolicyStack::<String, std::io::Error>::builder()
//!     .name("avatar-fetch")
//!     .policy(RetryPolicy::<std::io::Error>::builder().max_attempts(3).retry_transient().build())
//!     .policy(CircuitBreakerPolicy::new(5, Duration::from_secs(30)))
//!     .policy(TimeoutPolicy::new(Duration::from_millis(500)))
//!     .on_failed(|kind, elapsed| eprintln!("avatar fetch failed ({kind}) after {elapsed:?}"))
//!     .build();
//!
//! let fetch = operation(|_cancel| async { Ok::<_, std::io::Error>("avatar.png".to_string()) });
//! let file = stack.execute(fetch, CancellationToken::new()).await.unwrap();
//! assert_eq!(file, "avatar.png");
//! # }
//! ```
//!
//! ## Cancellation
//!
//! Every call takes a [`CancellationToken`]. Every policy races it at each
//! point where it waits, returns [`PolicyError::Cancelled`] promptly, and
//! leaves its own state untouched: cancellation is never retried, never
//! counted as a breaker failure, and never holds a bulkhead slot.

// Re-export core (always available)
pub use callguard_core as core;
pub use callguard_core::{
    is_transient, operation, policy_operation, AsyncMutex, AsyncMutexGuard, CancellationToken,
    Cancelled, JitterBackoff, Operation, OperationFuture, Policy, PolicyError,
};

// Re-export policies based on features
#[cfg(feature = "bulkhead")]
pub use callguard_bulkhead as bulkhead;

#[cfg(feature = "circuitbreaker")]
pub use callguard_circuitbreaker as circuitbreaker;

#[cfg(feature = "debounce")]
pub use callguard_debounce as debounce;

#[cfg(feature = "retry")]
pub use callguard_retry as retry;

#[cfg(feature = "timeout")]
pub use callguard_timeout as timeout;

mod runner;
mod service;
mod stack;

pub use runner::PolicyRunner;
pub use service::{PolicyLayer, PolicyService};
pub use stack::{PipelineEvent, PolicyStack, PolicyStackBuilder};
