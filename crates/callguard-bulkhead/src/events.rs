//! Events emitted by the bulkhead policy.

use std::time::{Duration, Instant};

use callguard_core::PolicyEvent;

/// Events emitted by [`BulkheadPolicy`](crate::BulkheadPolicy).
#[derive(Debug, Clone)]
pub enum BulkheadEvent {
    /// A call took an execution slot.
    CallPermitted {
        policy_name: String,
        timestamp: Instant,
        /// Calls running after this one was admitted.
        concurrent_calls: usize,
    },
    /// No slot was free and the call joined the wait queue.
    CallQueued {
        policy_name: String,
        timestamp: Instant,
        /// Waiting calls, this one included.
        queued_calls: usize,
    },
    /// The bulkhead and its queue were full.
    CallRejected {
        policy_name: String,
        timestamp: Instant,
        max_parallel: usize,
        max_queue: usize,
    },
    /// An admitted call succeeded.
    CallFinished {
        policy_name: String,
        timestamp: Instant,
        duration: Duration,
    },
    /// An admitted call failed or was cancelled.
    CallFailed {
        policy_name: String,
        timestamp: Instant,
        duration: Duration,
    },
}

impl PolicyEvent for BulkheadEvent {
    fn event_type(&self) -> &'static str {
        match self {
            BulkheadEvent::CallPermitted { .. } => "call_permitted",
            BulkheadEvent::CallQueued { .. } => "call_queued",
            BulkheadEvent::CallRejected { .. } => "call_rejected",
            BulkheadEvent::CallFinished { .. } => "call_finished",
            BulkheadEvent::CallFailed { .. } => "call_failed",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            BulkheadEvent::CallPermitted { timestamp, .. }
            | BulkheadEvent::CallQueued { timestamp, .. }
            | BulkheadEvent::CallRejected { timestamp, .. }
            | BulkheadEvent::CallFinished { timestamp, .. }
            | BulkheadEvent::CallFailed { timestamp, .. } => *timestamp,
        }
    }

    fn policy_name(&self) -> &str {
        match self {
            BulkheadEvent::CallPermitted { policy_name, .. }
            | BulkheadEvent::CallQueued { policy_name, .. }
            | BulkheadEvent::CallRejected { policy_name, .. }
            | BulkheadEvent::CallFinished { policy_name, .. }
            | BulkheadEvent::CallFailed { policy_name, .. } => policy_name,
        }
    }
}
