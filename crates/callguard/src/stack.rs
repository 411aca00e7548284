//! Named, reusable policy lists with per-call telemetry.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use callguard_core::{
    CancellationToken, EventListeners, FnListener, Operation, OperationFuture, Policy, PolicyEvent,
};

use crate::runner::PolicyRunner;

/// Emitted once per [`PolicyStack::execute`] call.
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    /// The pipeline produced a value.
    Succeeded {
        policy_name: String,
        timestamp: Instant,
        elapsed: Duration,
    },
    /// The pipeline ended with an error other than caller cancellation.
    Failed {
        policy_name: String,
        timestamp: Instant,
        elapsed: Duration,
        /// [`PolicyError::kind`](callguard_core::PolicyError::kind) of the error.
        error_kind: &'static str,
    },
    /// The caller cancelled the call.
    Cancelled {
        policy_name: String,
        timestamp: Instant,
        elapsed: Duration,
    },
}

impl PipelineEvent {
    /// Wall time spent in the pipeline.
    pub fn elapsed(&self) -> Duration {
        match self {
            PipelineEvent::Succeeded { elapsed, .. }
            | PipelineEvent::Failed { elapsed, .. }
            | PipelineEvent::Cancelled { elapsed, .. } => *elapsed,
        }
    }
}

impl PolicyEvent for PipelineEvent {
    fn event_type(&self) -> &'static str {
        match self {
            PipelineEvent::Succeeded { .. } => "succeeded",
            PipelineEvent::Failed { .. } => "failed",
            PipelineEvent::Cancelled { .. } => "cancelled",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            PipelineEvent::Succeeded { timestamp, .. }
            | PipelineEvent::Failed { timestamp, .. }
            | PipelineEvent::Cancelled { timestamp, .. } => *timestamp,
        }
    }

    fn policy_name(&self) -> &str {
        match self {
            PipelineEvent::Succeeded { policy_name, .. }
            | PipelineEvent::Failed { policy_name, .. }
            | PipelineEvent::Cancelled { policy_name, .. } => policy_name,
        }
    }
}

/// A long-lived, named list of shared policies.
///
/// The stack only holds configuration. Every call to
/// [`execute`](Self::execute) builds a fresh [`PolicyRunner`] over the list,
/// so stateful policies such as circuit breakers and bulkheads are shared
/// across calls while the pipeline itself lives for one call.
///
/// A stack is itself a [`Policy`], so stacks nest.
pub struct PolicyStack<T, E> {
    name: String,
    policies: Vec<Arc<dyn Policy<T, E>>>,
    event_listeners: EventListeners<PipelineEvent>,
}

impl<T, E> Clone for PolicyStack<T, E> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            policies: self.policies.clone(),
            event_listeners: self.event_listeners.clone(),
        }
    }
}

impl<T, E> fmt::Debug for PolicyStack<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolicyStack")
            .field("name", &self.name)
            .field("policies", &self.policies.len())
            .field("event_listeners", &self.event_listeners)
            .finish()
    }
}

impl<T, E> PolicyStack<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    /// Returns a builder.
    pub fn builder() -> PolicyStackBuilder<T, E> {
        PolicyStackBuilder::new()
    }

    /// The stack name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The policies, outermost first.
    pub fn policies(&self) -> &[Arc<dyn Policy<T, E>>] {
        &self.policies
    }

    /// Runs `operation` through every policy and reports the outcome.
    pub fn execute<'a>(
        &'a self,
        operation: Operation<'a, T, E>,
        cancel: CancellationToken,
    ) -> OperationFuture<'a, T, E> {
        Box::pin(async move {
            let start = tokio::time::Instant::now();
            let result = PolicyRunner::new(&self.policies)
                .execute(operation, cancel.clone())
                .await;
            let elapsed = start.elapsed();

            let event = match &result {
                Ok(_) => PipelineEvent::Succeeded {
                    policy_name: self.name.clone(),
                    timestamp: Instant::now(),
                    elapsed,
                },
                Err(_) if cancel.is_cancelled() => PipelineEvent::Cancelled {
                    policy_name: self.name.clone(),
                    timestamp: Instant::now(),
                    elapsed,
                },
                Err(err) => PipelineEvent::Failed {
                    policy_name: self.name.clone(),
                    timestamp: Instant::now(),
                    elapsed,
                    error_kind: err.kind(),
                },
            };

            #[cfg(feature = "tracing")]
            tracing::debug!(
                stack = %self.name,
                outcome = event.event_type(),
                elapsed_ms = elapsed.as_millis() as u64,
                "Pipeline finished"
            );

            self.event_listeners.emit(&event);
            result
        })
    }
}

impl<T, E> Policy<T, E> for PolicyStack<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    fn execute<'a>(
        &'a self,
        operation: Operation<'a, T, E>,
        cancel: CancellationToken,
    ) -> OperationFuture<'a, T, E> {
        PolicyStack::execute(self, operation, cancel)
    }
}

/// Builder for [`PolicyStack`].
pub struct PolicyStackBuilder<T, E> {
    name: String,
    policies: Vec<Arc<dyn Policy<T, E>>>,
    event_listeners: EventListeners<PipelineEvent>,
}

impl<T, E> PolicyStackBuilder<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self {
            name: String::from("<unnamed>"),
            policies: Vec::new(),
            event_listeners: EventListeners::new(),
        }
    }

    /// Sets the stack name reported in events and logs.
    ///
    /// Default: `"<unnamed>"`
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Appends a policy. Policies added first wrap the ones added later.
    ///
    /// Pass an `Arc` to share a stateful policy with other stacks.
    pub fn policy<P>(mut self, policy: P) -> Self
    where
        P: Policy<T, E> + 'static,
    {
        self.policies.push(Arc::new(policy));
        self
    }

    /// Appends an already type-erased policy.
    pub fn shared_policy(mut self, policy: Arc<dyn Policy<T, E>>) -> Self {
        self.policies.push(policy);
        self
    }

    /// Registers a callback for every pipeline event.
    pub fn on_event<F>(mut self, f: F) -> Self
    where
        F: Fn(&PipelineEvent) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(f));
        self
    }

    /// Registers a callback for successful calls.
    pub fn on_succeeded<F>(mut self, f: F) -> Self
    where
        F: Fn(Duration) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let PipelineEvent::Succeeded { elapsed, .. } = event {
                f(*elapsed);
            }
        }));
        self
    }

    /// Registers a callback for failed calls, receiving the error kind.
    pub fn on_failed<F>(mut self, f: F) -> Self
    where
        F: Fn(&'static str, Duration) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let PipelineEvent::Failed {
                error_kind,
                elapsed,
                ..
            } = event
            {
                f(error_kind, *elapsed);
            }
        }));
        self
    }

    /// Registers a callback for calls the caller cancelled.
    pub fn on_cancelled<F>(mut self, f: F) -> Self
    where
        F: Fn(Duration) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let PipelineEvent::Cancelled { elapsed, .. } = event {
                f(*elapsed);
            }
        }));
        self
    }

    /// Builds the stack.
    pub fn build(self) -> PolicyStack<T, E> {
        PolicyStack {
            name: self.name,
            policies: self.policies,
            event_listeners: self.event_listeners,
        }
    }
}

impl<T, E> Default for PolicyStackBuilder<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
