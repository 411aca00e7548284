use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[cfg(feature = "metrics")]
use metrics::{counter, gauge};
use tokio::time::Instant;

use crate::config::CircuitBreakerConfig;
use crate::events::CircuitBreakerEvent;

/// State of a circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum CircuitState {
    /// Calls pass through; consecutive failures are counted.
    Closed = 0,
    /// Calls are rejected until the break duration has elapsed.
    Open = 1,
    /// A single probe call decides between Closed and Open.
    HalfOpen = 2,
}

impl CircuitState {
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            1 => CircuitState::Open,
            2 => CircuitState::HalfOpen,
            _ => CircuitState::Closed,
        }
    }

    /// Label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "Closed",
            CircuitState::Open => "Open",
            CircuitState::HalfOpen => "HalfOpen",
        }
    }
}

/// Point-in-time view of a breaker.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct CircuitMetrics {
    /// Current state.
    pub state: CircuitState,
    /// Consecutive failures recorded since the last success or transition.
    pub consecutive_failures: u32,
    /// Failures that trip the breaker.
    pub failure_threshold: u32,
    /// Time spent in the current state.
    pub time_since_state_change: Duration,
}

/// How a call was let through, which decides what its outcome may change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AdmittedAs {
    Closed,
    Probe,
}

pub(crate) enum Admission {
    Permitted,
    /// Breaker is HalfOpen; the caller must still win the probe slot.
    ProbeCandidate,
    Rejected(CircuitState),
}

pub(crate) struct Circuit {
    state: CircuitState,
    state_atomic: Arc<AtomicU8>,
    consecutive_failures: u32,
    last_state_change: Instant,
}

impl Circuit {
    pub(crate) fn new(state_atomic: Arc<AtomicU8>) -> Self {
        state_atomic.store(CircuitState::Closed as u8, Ordering::Release);
        Self {
            state: CircuitState::Closed,
            state_atomic,
            consecutive_failures: 0,
            last_state_change: Instant::now(),
        }
    }

    #[cfg(test)]
    pub(crate) fn state(&self) -> CircuitState {
        self.state
    }

    pub(crate) fn metrics(&self, config: &CircuitBreakerConfig) -> CircuitMetrics {
        CircuitMetrics {
            state: self.state,
            consecutive_failures: self.consecutive_failures,
            failure_threshold: config.failure_threshold,
            time_since_state_change: self.last_state_change.elapsed(),
        }
    }

    /// Decides whether a call may start.
    ///
    /// An Open breaker whose break duration has elapsed moves to HalfOpen here.
    pub(crate) fn admit(
        &mut self,
        config: &CircuitBreakerConfig,
        events: &mut Vec<CircuitBreakerEvent>,
    ) -> Admission {
        if self.state == CircuitState::Open {
            if self.last_state_change.elapsed() < config.break_duration {
                return Admission::Rejected(CircuitState::Open);
            }
            self.transition_to(CircuitState::HalfOpen, config, events);
        }

        match self.state {
            CircuitState::Closed => Admission::Permitted,
            _ => Admission::ProbeCandidate,
        }
    }

    pub(crate) fn record_success(
        &mut self,
        admitted_as: AdmittedAs,
        config: &CircuitBreakerConfig,
        events: &mut Vec<CircuitBreakerEvent>,
    ) {
        events.push(CircuitBreakerEvent::SuccessRecorded {
            policy_name: config.name.clone(),
            timestamp: std::time::Instant::now(),
            state: self.state,
        });

        match (admitted_as, self.state) {
            (AdmittedAs::Closed, CircuitState::Closed) => self.consecutive_failures = 0,
            (AdmittedAs::Probe, CircuitState::HalfOpen) => {
                self.transition_to(CircuitState::Closed, config, events)
            }
            // A late result from a call admitted under an older state.
            _ => {}
        }
    }

    pub(crate) fn record_failure(
        &mut self,
        admitted_as: AdmittedAs,
        config: &CircuitBreakerConfig,
        events: &mut Vec<CircuitBreakerEvent>,
    ) {
        events.push(CircuitBreakerEvent::FailureRecorded {
            policy_name: config.name.clone(),
            timestamp: std::time::Instant::now(),
            state: self.state,
        });

        match (admitted_as, self.state) {
            (AdmittedAs::Closed, CircuitState::Closed) => {
                self.consecutive_failures = self.consecutive_failures.saturating_add(1);
                if self.consecutive_failures >= config.failure_threshold {
                    self.transition_to(CircuitState::Open, config, events);
                }
            }
            (AdmittedAs::Probe, CircuitState::HalfOpen) => {
                self.transition_to(CircuitState::Open, config, events)
            }
            _ => {}
        }
    }

    pub(crate) fn force_open(
        &mut self,
        config: &CircuitBreakerConfig,
        events: &mut Vec<CircuitBreakerEvent>,
    ) {
        self.transition_to(CircuitState::Open, config, events);
        // Restart the break even if the breaker was already open.
        self.last_state_change = Instant::now();
    }

    pub(crate) fn reset(
        &mut self,
        config: &CircuitBreakerConfig,
        events: &mut Vec<CircuitBreakerEvent>,
    ) {
        self.transition_to(CircuitState::Closed, config, events);
        self.consecutive_failures = 0;
    }

    fn transition_to(
        &mut self,
        state: CircuitState,
        config: &CircuitBreakerConfig,
        events: &mut Vec<CircuitBreakerEvent>,
    ) {
        if self.state == state {
            return;
        }

        let from_state = self.state;

        events.push(CircuitBreakerEvent::StateTransition {
            policy_name: config.name.clone(),
            timestamp: std::time::Instant::now(),
            from_state,
            to_state: state,
        });

        #[cfg(feature = "tracing")]
        tracing::info!(
            policy = %config.name,
            from = from_state.as_str(),
            to = state.as_str(),
            consecutive_failures = self.consecutive_failures,
            "Circuit state transition"
        );

        #[cfg(feature = "metrics")]
        {
            counter!(
                "circuitbreaker_transitions_total",
                "policy" => config.name.clone(),
                "from" => from_state.as_str(),
                "to" => state.as_str()
            )
            .increment(1);
            gauge!("circuitbreaker_state", "policy" => config.name.clone())
                .set(f64::from(state as u8));
        }

        self.state = state;
        self.state_atomic.store(state as u8, Ordering::Release);
        self.last_state_change = Instant::now();
        self.consecutive_failures = 0;
    }
}
