//! Event hooks for policies.
//!
//! Policies never log to a user. They emit typed events to listeners registered
//! on their builders; the builder helpers (`on_retry`, `on_state_transition`,
//! `on_call_rejected`, ...) are thin filters over [`FnListener`].

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// An event emitted by a policy instance.
pub trait PolicyEvent: Send + Sync + fmt::Debug {
    /// Short machine-friendly kind, e.g. `"state_transition"`.
    fn event_type(&self) -> &'static str;

    /// When the event occurred.
    fn timestamp(&self) -> Instant;

    /// Name of the policy instance that emitted the event.
    fn policy_name(&self) -> &str;
}

/// Receives events of type `E`.
pub trait EventListener<E: PolicyEvent>: Send + Sync {
    /// Called synchronously from inside the policy.
    fn on_event(&self, event: &E);
}

/// Shared, type-erased listener.
pub type BoxedEventListener<E> = Arc<dyn EventListener<E>>;

/// The listeners registered on one policy instance.
#[derive(Clone)]
pub struct EventListeners<E: PolicyEvent> {
    listeners: Vec<BoxedEventListener<E>>,
}

impl<E: PolicyEvent> EventListeners<E> {
    /// Creates an empty collection.
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
        }
    }

    /// Adds a listener.
    pub fn add<L>(&mut self, listener: L)
    where
        L: EventListener<E> + 'static,
    {
        self.listeners.push(Arc::new(listener));
    }

    /// Delivers `event` to every listener in registration order.
    ///
    /// A panicking listener is isolated: the panic is caught and the remaining
    /// listeners still run, so a faulty hook can never poison breaker or
    /// bulkhead bookkeeping.
    pub fn emit(&self, event: &E) {
        for listener in &self.listeners {
            let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                listener.on_event(event);
            }));
            if outcome.is_err() {
                #[cfg(feature = "tracing")]
                tracing::warn!(
                    policy = event.policy_name(),
                    event = event.event_type(),
                    "policy event listener panicked"
                );
            }
        }
    }

    /// Returns true if there are no listeners.
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Returns the number of listeners.
    pub fn len(&self) -> usize {
        self.listeners.len()
    }
}

impl<E: PolicyEvent> Default for EventListeners<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: PolicyEvent> fmt::Debug for EventListeners<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventListeners")
            .field("len", &self.listeners.len())
            .finish()
    }
}

/// A closure-backed listener.
pub struct FnListener<E, F>
where
    F: Fn(&E) + Send + Sync,
{
    f: F,
    _phantom: std::marker::PhantomData<fn(&E)>,
}

impl<E, F> FnListener<E, F>
where
    F: Fn(&E) + Send + Sync,
{
    /// Wraps `f` as a listener.
    pub fn new(f: F) -> Self {
        Self {
            f,
            _phantom: std::marker::PhantomData,
        }
    }
}

impl<E, F> EventListener<E> for FnListener<E, F>
where
    E: PolicyEvent,
    F: Fn(&E) + Send + Sync,
{
    fn on_event(&self, event: &E) {
        (self.f)(event)
    }
}
