//! Configuration for the bulkhead policy.

use std::time::Duration;

use callguard_core::{EventListeners, FnListener};
use tokio::sync::Semaphore;

use crate::events::BulkheadEvent;
use crate::BulkheadPolicy;

pub(crate) struct BulkheadConfig {
    pub(crate) max_parallel: usize,
    pub(crate) max_queue: usize,
    pub(crate) name: String,
    pub(crate) event_listeners: EventListeners<BulkheadEvent>,
}

/// Builder for [`BulkheadPolicy`].
pub struct BulkheadPolicyBuilder {
    max_parallel: usize,
    max_queue: usize,
    name: String,
    event_listeners: EventListeners<BulkheadEvent>,
}

impl BulkheadPolicyBuilder {
    /// Creates a new builder with default values.
    pub fn new() -> Self {
        Self {
            max_parallel: 10,
            max_queue: 0,
            name: String::from("<unnamed>"),
            event_listeners: EventListeners::new(),
        }
    }

    /// Sets how many calls may run at once.
    ///
    /// Default: 10
    pub fn max_parallel(mut self, max: usize) -> Self {
        self.max_parallel = max;
        self
    }

    /// Sets how many calls may wait for a slot. 0 rejects immediately when
    /// every slot is busy.
    ///
    /// Default: 0
    pub fn max_queue(mut self, max: usize) -> Self {
        self.max_queue = max;
        self
    }

    /// Sets the name of this bulkhead instance.
    ///
    /// Default: `"<unnamed>"`
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Registers a callback when a call takes a slot.
    ///
    /// Called with the number of running calls, this one included.
    pub fn on_call_permitted<F>(mut self, f: F) -> Self
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let BulkheadEvent::CallPermitted {
                concurrent_calls, ..
            } = event
            {
                f(*concurrent_calls);
            }
        }));
        self
    }

    /// Registers a callback when a call starts waiting for a slot.
    pub fn on_call_queued<F>(mut self, f: F) -> Self
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let BulkheadEvent::CallQueued { queued_calls, .. } = event {
                f(*queued_calls);
            }
        }));
        self
    }

    /// Registers a callback when a call is rejected.
    ///
    /// Called with `(max_parallel, max_queue)`.
    ///
    /// # Example
    /// ```rust
    /// use callguard_bulkhead::BulkheadPolicy;
    ///
    /// let bulkhead = BulkheadPolicy::builder()
    ///     .max_parallel(4)
    ///     .max_queue(16)
    ///     .on_call_rejected(|parallel, queue| {
    ///         eprintln!("saturated: {parallel} running, {queue} waiting");
    ///     })
    ///     .build();
    /// assert_eq!(bulkhead.available_slots(), 4);
    /// ```
    pub fn on_call_rejected<F>(mut self, f: F) -> Self
    where
        F: Fn(usize, usize) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let BulkheadEvent::CallRejected {
                max_parallel,
                max_queue,
                ..
            } = event
            {
                f(*max_parallel, *max_queue);
            }
        }));
        self
    }

    /// Registers a callback when an admitted call succeeds.
    pub fn on_call_finished<F>(mut self, f: F) -> Self
    where
        F: Fn(Duration) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let BulkheadEvent::CallFinished { duration, .. } = event {
                f(*duration);
            }
        }));
        self
    }

    /// Registers a callback when an admitted call fails.
    pub fn on_call_failed<F>(mut self, f: F) -> Self
    where
        F: Fn(Duration) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let BulkheadEvent::CallFailed { duration, .. } = event {
                f(*duration);
            }
        }));
        self
    }

    /// Builds the bulkhead.
    ///
    /// # Panics
    ///
    /// Panics if `max_parallel` is 0 or larger than the semaphore can hold.
    pub fn build(self) -> BulkheadPolicy {
        assert!(self.max_parallel >= 1, "max_parallel must be at least 1");
        assert!(
            self.max_parallel <= Semaphore::MAX_PERMITS,
            "max_parallel exceeds Semaphore::MAX_PERMITS"
        );
        BulkheadPolicy::from_config(BulkheadConfig {
            max_parallel: self.max_parallel,
            max_queue: self.max_queue,
            name: self.name,
            event_listeners: self.event_listeners,
        })
    }
}

impl Default for BulkheadPolicyBuilder {
    fn default() -> Self {
        Self::new()
    }
}
