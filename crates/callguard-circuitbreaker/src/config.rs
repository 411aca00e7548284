use std::time::Duration;

use callguard_core::{EventListeners, FnListener};

use crate::circuit::CircuitState;
use crate::events::CircuitBreakerEvent;
use crate::CircuitBreakerPolicy;

pub(crate) struct CircuitBreakerConfig {
    pub(crate) failure_threshold: u32,
    pub(crate) break_duration: Duration,
    pub(crate) event_listeners: EventListeners<CircuitBreakerEvent>,
    pub(crate) name: String,
}

/// Builder for [`CircuitBreakerPolicy`].
pub struct CircuitBreakerPolicyBuilder {
    failure_threshold: u32,
    break_duration: Duration,
    event_listeners: EventListeners<CircuitBreakerEvent>,
    name: String,
}

impl CircuitBreakerPolicyBuilder {
    /// Creates a new builder with default values.
    pub fn new() -> Self {
        Self {
            failure_threshold: 5,
            break_duration: Duration::from_secs(30),
            event_listeners: EventListeners::new(),
            name: String::from("<unnamed>"),
        }
    }

    /// Sets how many consecutive failures trip the breaker.
    ///
    /// Default: 5
    ///
    /// # Panics
    ///
    /// [`build`](Self::build) panics if this is 0.
    pub fn failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    /// Sets how long the breaker stays open before admitting a probe.
    ///
    /// Default: 30 seconds
    pub fn break_duration(mut self, duration: Duration) -> Self {
        self.break_duration = duration;
        self
    }

    /// Sets the name of this breaker, used in errors, events and logs.
    ///
    /// Default: `"<unnamed>"`
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Registers a callback for state transitions, receiving `(from, to)`.
    pub fn on_state_transition<F>(mut self, f: F) -> Self
    where
        F: Fn(CircuitState, CircuitState) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let CircuitBreakerEvent::StateTransition {
                from_state,
                to_state,
                ..
            } = event
            {
                f(*from_state, *to_state);
            }
        }));
        self
    }

    /// Registers a callback for calls let through, with the state that admitted them.
    pub fn on_call_permitted<F>(mut self, f: F) -> Self
    where
        F: Fn(CircuitState) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let CircuitBreakerEvent::CallPermitted { state, .. } = event {
                f(*state);
            }
        }));
        self
    }

    /// Registers a callback for rejected calls.
    ///
    /// Receives `Open` for a tripped breaker and `HalfOpen` when a probe was
    /// already in flight.
    pub fn on_call_rejected<F>(mut self, f: F) -> Self
    where
        F: Fn(CircuitState) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let CircuitBreakerEvent::CallRejected { state, .. } = event {
                f(*state);
            }
        }));
        self
    }

    /// Registers a callback for recorded successes.
    pub fn on_success<F>(mut self, f: F) -> Self
    where
        F: Fn(CircuitState) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let CircuitBreakerEvent::SuccessRecorded { state, .. } = event {
                f(*state);
            }
        }));
        self
    }

    /// Registers a callback for recorded failures.
    pub fn on_failure<F>(mut self, f: F) -> Self
    where
        F: Fn(CircuitState) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let CircuitBreakerEvent::FailureRecorded { state, .. } = event {
                f(*state);
            }
        }));
        self
    }

    pub(crate) fn into_config(self) -> CircuitBreakerConfig {
        assert!(
            self.failure_threshold >= 1,
            "failure_threshold must be at least 1"
        );
        CircuitBreakerConfig {
            failure_threshold: self.failure_threshold,
            break_duration: self.break_duration,
            event_listeners: self.event_listeners,
            name: self.name,
        }
    }

    /// Builds the breaker.
    ///
    /// # Panics
    ///
    /// Panics if `failure_threshold` is 0.
    pub fn build(self) -> CircuitBreakerPolicy {
        CircuitBreakerPolicy::from_config(self.into_config())
    }
}

impl Default for CircuitBreakerPolicyBuilder {
    fn default() -> Self {
        Self::new()
    }
}
