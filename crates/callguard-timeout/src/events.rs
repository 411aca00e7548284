//! Event types for the timeout policy.

use std::time::{Duration, Instant};

use callguard_core::PolicyEvent;

/// Events emitted by [`TimeoutPolicy`](crate::TimeoutPolicy).
#[derive(Debug, Clone)]
pub enum TimeoutEvent {
    /// The operation succeeded before the deadline.
    Success {
        /// Name of the policy instance.
        policy_name: String,
        /// When the event occurred.
        timestamp: Instant,
        /// How long the operation took.
        duration: Duration,
    },
    /// The operation failed before the deadline.
    Error {
        /// Name of the policy instance.
        policy_name: String,
        /// When the event occurred.
        timestamp: Instant,
        /// How long before the operation failed.
        duration: Duration,
    },
    /// The deadline elapsed first.
    Timeout {
        /// Name of the policy instance.
        policy_name: String,
        /// When the event occurred.
        timestamp: Instant,
        /// The configured deadline.
        timeout: Duration,
    },
}

impl PolicyEvent for TimeoutEvent {
    fn event_type(&self) -> &'static str {
        match self {
            TimeoutEvent::Success { .. } => "success",
            TimeoutEvent::Error { .. } => "error",
            TimeoutEvent::Timeout { .. } => "timeout",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            TimeoutEvent::Success { timestamp, .. }
            | TimeoutEvent::Error { timestamp, .. }
            | TimeoutEvent::Timeout { timestamp, .. } => *timestamp,
        }
    }

    fn policy_name(&self) -> &str {
        match self {
            TimeoutEvent::Success { policy_name, .. }
            | TimeoutEvent::Error { policy_name, .. }
            | TimeoutEvent::Timeout { policy_name, .. } => policy_name,
        }
    }
}
