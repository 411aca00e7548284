use std::time::Instant;

use callguard_core::PolicyEvent;

use crate::CircuitState;

/// Events emitted by [`CircuitBreakerPolicy`](crate::CircuitBreakerPolicy).
#[derive(Debug, Clone)]
pub enum CircuitBreakerEvent {
    /// A call was let through.
    CallPermitted {
        policy_name: String,
        timestamp: Instant,
        state: CircuitState,
    },
    /// A call was rejected without invoking the operation.
    CallRejected {
        policy_name: String,
        timestamp: Instant,
        state: CircuitState,
    },
    /// The breaker moved between states.
    StateTransition {
        policy_name: String,
        timestamp: Instant,
        from_state: CircuitState,
        to_state: CircuitState,
    },
    /// A successful call was recorded.
    SuccessRecorded {
        policy_name: String,
        timestamp: Instant,
        state: CircuitState,
    },
    /// A failed call was recorded.
    FailureRecorded {
        policy_name: String,
        timestamp: Instant,
        state: CircuitState,
    },
}

impl PolicyEvent for CircuitBreakerEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CircuitBreakerEvent::CallPermitted { .. } => "call_permitted",
            CircuitBreakerEvent::CallRejected { .. } => "call_rejected",
            CircuitBreakerEvent::StateTransition { .. } => "state_transition",
            CircuitBreakerEvent::SuccessRecorded { .. } => "success_recorded",
            CircuitBreakerEvent::FailureRecorded { .. } => "failure_recorded",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            CircuitBreakerEvent::CallPermitted { timestamp, .. }
            | CircuitBreakerEvent::CallRejected { timestamp, .. }
            | CircuitBreakerEvent::StateTransition { timestamp, .. }
            | CircuitBreakerEvent::SuccessRecorded { timestamp, .. }
            | CircuitBreakerEvent::FailureRecorded { timestamp, .. } => *timestamp,
        }
    }

    fn policy_name(&self) -> &str {
        match self {
            CircuitBreakerEvent::CallPermitted { policy_name, .. }
            | CircuitBreakerEvent::CallRejected { policy_name, .. }
            | CircuitBreakerEvent::StateTransition { policy_name, .. }
            | CircuitBreakerEvent::SuccessRecorded { policy_name, .. }
            | CircuitBreakerEvent::FailureRecorded { policy_name, .. } => policy_name,
        }
    }
}
