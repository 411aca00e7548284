use std::sync::Arc;
use std::time::Duration;

use callguard_core::{is_transient, EventListeners, FnListener, PolicyError};

use crate::backoff::{ExponentialBackoff, FixedInterval, FullJitterBackoff, IntervalFunction};
use crate::events::RetryEvent;
use crate::RetryPolicy;

pub(crate) type RetryPredicate<E> = Arc<dyn Fn(&PolicyError<E>) -> bool + Send + Sync>;
pub(crate) type RetryObserver<E> = Arc<dyn Fn(u32, &PolicyError<E>, Duration) + Send + Sync>;

pub(crate) struct RetryConfig<E> {
    pub(crate) max_attempts: u32,
    pub(crate) interval_fn: Arc<dyn IntervalFunction<E>>,
    pub(crate) retry_predicate: Option<RetryPredicate<E>>,
    pub(crate) event_listeners: EventListeners<RetryEvent>,
    pub(crate) retry_observers: Vec<RetryObserver<E>>,
    pub(crate) name: String,
}

impl<E> RetryConfig<E> {
    pub(crate) fn should_retry(&self, error: &PolicyError<E>) -> bool {
        self.retry_predicate
            .as_ref()
            .map(|predicate| predicate(error))
            .unwrap_or(true)
    }
}

/// Builder for [`RetryPolicy`].
pub struct RetryPolicyBuilder<E> {
    max_attempts: u32,
    interval_fn: Option<Arc<dyn IntervalFunction<E>>>,
    retry_predicate: Option<RetryPredicate<E>>,
    event_listeners: EventListeners<RetryEvent>,
    retry_observers: Vec<RetryObserver<E>>,
    name: String,
}

impl<E> Default for RetryPolicyBuilder<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> RetryPolicyBuilder<E> {
    /// Creates a new builder with defaults.
    ///
    /// Defaults:
    /// - max_attempts: 3
    /// - backoff: exponential with a 100ms initial interval
    /// - predicate: retry every failure
    /// - name: `"<unnamed>"`
    pub fn new() -> Self {
        Self {
            max_attempts: 3,
            interval_fn: None,
            retry_predicate: None,
            event_listeners: EventListeners::new(),
            retry_observers: Vec::new(),
            name: "<unnamed>".to_string(),
        }
    }

    /// Sets the total number of attempts, including the first.
    ///
    /// `max_attempts(3)` means one attempt plus at most two retries.
    ///
    /// # Panics
    ///
    /// [`build`](Self::build) panics if this is 0.
    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Waits `duration` between attempts.
    pub fn fixed_backoff(mut self, duration: Duration) -> Self {
        self.interval_fn = Some(Arc::new(FixedInterval::new(duration)));
        self
    }

    /// Doubles the wait after each failed attempt, starting at `initial_interval`.
    pub fn exponential_backoff(mut self, initial_interval: Duration) -> Self {
        self.interval_fn = Some(Arc::new(ExponentialBackoff::new(initial_interval)));
        self
    }

    /// Draws each wait uniformly from `[0, min(max_delay, base * 2^attempt)]`.
    pub fn jitter_backoff(mut self, base: Duration, max_delay: Duration) -> Self {
        self.interval_fn = Some(Arc::new(FullJitterBackoff::new(base).max_delay(max_delay)));
        self
    }

    /// Sets a custom interval function.
    pub fn backoff<I>(mut self, interval_fn: I) -> Self
    where
        I: IntervalFunction<E> + 'static,
    {
        self.interval_fn = Some(Arc::new(interval_fn));
        self
    }

    /// Retries only failures for which `predicate` returns `true`.
    ///
    /// Caller cancellation is never retried, whatever the predicate says.
    pub fn retry_on<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&PolicyError<E>) -> bool + Send + Sync + 'static,
    {
        self.retry_predicate = Some(Arc::new(predicate));
        self
    }

    /// Sets the name of this policy instance for observability.
    pub fn name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    /// Adds an event listener for every [`RetryEvent`].
    pub fn on_event<F>(mut self, listener: F) -> Self
    where
        F: Fn(&RetryEvent) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(listener));
        self
    }

    /// Registers a callback invoked before each wait.
    ///
    /// Receives the attempt that just failed (1-based) and the delay before
    /// the next one. For `N` attempts that all fail it runs `N - 1` times.
    pub fn on_retry<F>(mut self, f: F) -> Self
    where
        F: Fn(u32, Duration) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let RetryEvent::Retry { attempt, delay, .. } = event {
                f(*attempt, *delay);
            }
        }));
        self
    }

    /// Registers a callback invoked before each wait with the failure itself.
    ///
    /// Receives the attempt that just failed (1-based), its error and the
    /// delay before the next attempt. Runs alongside any
    /// [`on_retry`](Self::on_retry) callbacks.
    pub fn on_retry_error<F>(mut self, f: F) -> Self
    where
        F: Fn(u32, &PolicyError<E>, Duration) + Send + Sync + 'static,
    {
        self.retry_observers.push(Arc::new(f));
        self
    }

    /// Registers a callback invoked on success with the number of attempts made.
    pub fn on_success<F>(mut self, f: F) -> Self
    where
        F: Fn(u32) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let RetryEvent::Success { attempts, .. } = event {
                f(*attempts);
            }
        }));
        self
    }

    /// Registers a callback invoked when every attempt failed.
    pub fn on_error<F>(mut self, f: F) -> Self
    where
        F: Fn(u32) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let RetryEvent::Error { attempts, .. } = event {
                f(*attempts);
            }
        }));
        self
    }

    /// Registers a callback invoked when the predicate rejects a failure.
    pub fn on_ignored_error<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if matches!(event, RetryEvent::IgnoredError { .. }) {
                f();
            }
        }));
        self
    }

    /// Builds the policy.
    ///
    /// # Panics
    ///
    /// Panics if `max_attempts` is 0.
    pub fn build(self) -> RetryPolicy<E> {
        assert!(self.max_attempts >= 1, "max_attempts must be at least 1");

        let interval_fn = self
            .interval_fn
            .unwrap_or_else(|| Arc::new(ExponentialBackoff::new(Duration::from_millis(100))));

        RetryPolicy::from_config(Arc::new(RetryConfig {
            max_attempts: self.max_attempts,
            interval_fn,
            retry_predicate: self.retry_predicate,
            event_listeners: self.event_listeners,
            retry_observers: self.retry_observers,
            name: self.name,
        }))
    }
}

impl<E> RetryPolicyBuilder<E>
where
    E: std::error::Error + 'static,
{
    /// Retries only transient failures, as classified by
    /// [`is_transient`](callguard_core::is_transient).
    pub fn retry_transient(self) -> Self {
        self.retry_on(|err| is_transient(err))
    }
}
