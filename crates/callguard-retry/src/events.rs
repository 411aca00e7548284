use std::time::{Duration, Instant};

use callguard_core::PolicyEvent;

/// Events emitted by [`RetryPolicy`](crate::RetryPolicy).
#[derive(Debug, Clone)]
pub enum RetryEvent {
    /// A retry is about to be scheduled.
    Retry {
        policy_name: String,
        timestamp: Instant,
        /// The attempt that just failed (1-based).
        attempt: u32,
        delay: Duration,
        /// [`PolicyError::kind`](callguard_core::PolicyError::kind) of the failure.
        error_kind: &'static str,
    },
    /// The operation succeeded, on the first try or after retries.
    Success {
        policy_name: String,
        timestamp: Instant,
        attempts: u32,
    },
    /// Every attempt failed.
    Error {
        policy_name: String,
        timestamp: Instant,
        attempts: u32,
    },
    /// A failure the retry predicate rejected.
    IgnoredError {
        policy_name: String,
        timestamp: Instant,
    },
}

impl PolicyEvent for RetryEvent {
    fn event_type(&self) -> &'static str {
        match self {
            RetryEvent::Retry { .. } => "Retry",
            RetryEvent::Success { .. } => "Success",
            RetryEvent::Error { .. } => "Error",
            RetryEvent::IgnoredError { .. } => "IgnoredError",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            RetryEvent::Retry { timestamp, .. }
            | RetryEvent::Success { timestamp, .. }
            | RetryEvent::Error { timestamp, .. }
            | RetryEvent::IgnoredError { timestamp, .. } => *timestamp,
        }
    }

    fn policy_name(&self) -> &str {
        match self {
            RetryEvent::Retry { policy_name, .. }
            | RetryEvent::Success { policy_name, .. }
            | RetryEvent::Error { policy_name, .. }
            | RetryEvent::IgnoredError { policy_name, .. } => policy_name,
        }
    }
}
