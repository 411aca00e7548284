//! Configuration for the timeout policy.

use std::sync::Arc;
use std::time::Duration;

use callguard_core::{EventListeners, FnListener};

use crate::events::TimeoutEvent;
use crate::TimeoutPolicy;

pub(crate) struct TimeoutConfig {
    pub(crate) timeout_duration: Duration,
    pub(crate) event_listeners: EventListeners<TimeoutEvent>,
    pub(crate) name: String,
}

/// Builder for [`TimeoutPolicy`].
pub struct TimeoutPolicyBuilder {
    timeout_duration: Duration,
    event_listeners: EventListeners<TimeoutEvent>,
    name: String,
}

impl TimeoutPolicyBuilder {
    /// Creates a new builder with default values.
    pub fn new() -> Self {
        Self {
            timeout_duration: Duration::from_secs(5),
            event_listeners: EventListeners::new(),
            name: String::from("<unnamed>"),
        }
    }

    /// Sets the deadline for each call.
    ///
    /// Default: 5 seconds
    pub fn timeout_duration(mut self, duration: Duration) -> Self {
        self.timeout_duration = duration;
        self
    }

    /// Sets the name of this policy instance for observability.
    ///
    /// Default: `"<unnamed>"`
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Registers a callback for calls that succeed before the deadline.
    pub fn on_success<F>(mut self, f: F) -> Self
    where
        F: Fn(Duration) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let TimeoutEvent::Success { duration, .. } = event {
                f(*duration);
            }
        }));
        self
    }

    /// Registers a callback for calls that fail before the deadline.
    pub fn on_error<F>(mut self, f: F) -> Self
    where
        F: Fn(Duration) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let TimeoutEvent::Error { duration, .. } = event {
                f(*duration);
            }
        }));
        self
    }

    /// Registers a callback for calls cut off by the deadline.
    ///
    /// Receives the configured timeout.
    pub fn on_timeout<F>(mut self, f: F) -> Self
    where
        F: Fn(Duration) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let TimeoutEvent::Timeout { timeout, .. } = event {
                f(*timeout);
            }
        }));
        self
    }

    /// Builds the policy.
    pub fn build(self) -> TimeoutPolicy {
        TimeoutPolicy::from_config(Arc::new(TimeoutConfig {
            timeout_duration: self.timeout_duration,
            event_listeners: self.event_listeners,
            name: self.name,
        }))
    }
}

impl Default for TimeoutPolicyBuilder {
    fn default() -> Self {
        Self::new()
    }
}
