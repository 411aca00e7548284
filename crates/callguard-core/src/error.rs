//! Error taxonomy shared by every policy.
//!
//! A pipeline surfaces exactly one error type, [`PolicyError<E>`], regardless of
//! how many policies are stacked. Each policy either passes an error through,
//! replaces it with its own variant, or (retry) swallows it until attempts run
//! out. The operation's own failure is carried unchanged in
//! [`PolicyError::Operation`].
//!
//! # Matching
//!
//! ```rust
//! use callguard_core::PolicyError;
//!
//! fn describe(error: &PolicyError<std::io::Error>) -> &'static str {
//!     match error {
//!         PolicyError::Operation(_) => "the operation failed",
//!         PolicyError::Timeout { .. } => "the deadline elapsed",
//!         PolicyError::Cancelled => "the caller gave up",
//!         PolicyError::BulkheadFull { .. } => "too many calls in flight",
//!         PolicyError::CircuitOpen { .. } => "the dependency is failing",
//!     }
//! }
//! ```

use std::time::Duration;

/// Error produced by a policy pipeline.
///
/// `E` is the error type of the wrapped operation.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PolicyError<E> {
    /// The wrapped operation failed.
    #[error("operation failed: {0}")]
    Operation(E),

    /// The operation did not complete before the timeout policy's deadline.
    #[error("operation timed out after {timeout:?}")]
    Timeout {
        /// The deadline that elapsed.
        timeout: Duration,
    },

    /// The caller's cancellation token fired.
    #[error("operation was cancelled")]
    Cancelled,

    /// The bulkhead had no free execution slot and no free queue slot.
    #[error("bulkhead is full ({max_parallel} running, {max_queue} queued)")]
    BulkheadFull {
        /// Configured number of execution slots.
        max_parallel: usize,
        /// Configured number of queue slots.
        max_queue: usize,
    },

    /// The circuit breaker rejected the call.
    #[error("circuit breaker '{name}' is open")]
    CircuitOpen {
        /// Name of the breaker instance.
        name: String,
        /// `true` when the rejection was caused by a half-open probe already in flight.
        half_open: bool,
    },
}

impl<E> PolicyError<E> {
    /// Returns `true` if this is a timeout error.
    pub fn is_timeout(&self) -> bool {
        matches!(self, PolicyError::Timeout { .. })
    }

    /// Returns `true` if this is a cancellation error.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, PolicyError::Cancelled)
    }

    /// Returns `true` if a bulkhead rejected the call.
    pub fn is_bulkhead_full(&self) -> bool {
        matches!(self, PolicyError::BulkheadFull { .. })
    }

    /// Returns `true` if a circuit breaker rejected the call.
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, PolicyError::CircuitOpen { .. })
    }

    /// Returns `true` if the operation itself failed.
    pub fn is_operation(&self) -> bool {
        matches!(self, PolicyError::Operation(_))
    }

    /// Short label for the variant, used in events, logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            PolicyError::Operation(_) => "operation",
            PolicyError::Timeout { .. } => "timeout",
            PolicyError::Cancelled => "cancelled",
            PolicyError::BulkheadFull { .. } => "bulkhead_full",
            PolicyError::CircuitOpen { .. } => "circuit_open",
        }
    }

    /// Returns a reference to the operation's error, if any.
    pub fn operation_error(&self) -> Option<&E> {
        match self {
            PolicyError::Operation(e) => Some(e),
            _ => None,
        }
    }

    /// Extracts the operation's error, if any.
    pub fn into_operation_error(self) -> Option<E> {
        match self {
            PolicyError::Operation(e) => Some(e),
            _ => None,
        }
    }

    /// Maps the operation error, leaving policy errors untouched.
    ///
    /// ```
    /// use callguard_core::PolicyError;
    ///
    /// let err: PolicyError<String> = PolicyError::Operation("boom".to_string());
    /// let mapped: PolicyError<usize> = err.map_operation(|s| s.len());
    /// assert_eq!(mapped.into_operation_error(), Some(4));
    /// ```
    pub fn map_operation<F, T>(self, f: F) -> PolicyError<T>
    where
        F: FnOnce(E) -> T,
    {
        match self {
            PolicyError::Operation(e) => PolicyError::Operation(f(e)),
            PolicyError::Timeout { timeout } => PolicyError::Timeout { timeout },
            PolicyError::Cancelled => PolicyError::Cancelled,
            PolicyError::BulkheadFull {
                max_parallel,
                max_queue,
            } => PolicyError::BulkheadFull {
                max_parallel,
                max_queue,
            },
            PolicyError::CircuitOpen { name, half_open } => {
                PolicyError::CircuitOpen { name, half_open }
            }
        }
    }
}

/// The caller's cancellation token fired while waiting.
///
/// Returned by primitives that have no operation error of their own, such as
/// [`AsyncMutex::acquire`](crate::AsyncMutex::acquire).
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("wait was cancelled")]
pub struct Cancelled;

impl<E> From<Cancelled> for PolicyError<E> {
    fn from(_: Cancelled) -> Self {
        PolicyError::Cancelled
    }
}
