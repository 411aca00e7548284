//! Quiet-period policy for callguard pipelines.
//!
//! [`DebouncePolicy`] waits a fixed quiet period before invoking the wrapped
//! operation. If the caller cancels during the wait the operation is never
//! invoked and [`PolicyError::Cancelled`] is returned. The policy keeps no
//! per-call state, so one instance can be shared freely.
//!
//! ```rust
//! use callguard_core::{operation, CancellationToken, Policy};
//! use callguard_debounce::DebouncePolicy;
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread", start_paused = true)]
//! # async fn main() {
//! let debounce = DebouncePolicy::new(Duration::from_millis(250));
//! let search = operation(|_| async { Ok::<_, std::io::Error>(vec!["alice", "alicia"]) });
//!
//! let hits = debounce.execute(search, CancellationToken::new()).await.unwrap();
//! assert_eq!(hits.len(), 2);
//! # }
//! ```

use std::time::Duration;

use callguard_core::{CancellationToken, Operation, OperationFuture, Policy, PolicyError};

/// Delays each call by a fixed quiet period.
#[derive(Debug, Clone)]
pub struct DebouncePolicy {
    quiet_period: Duration,
    name: String,
}

impl DebouncePolicy {
    /// Creates a policy with the given quiet period.
    pub fn new(quiet_period: Duration) -> Self {
        Self::builder().quiet_period(quiet_period).build()
    }

    /// Returns a builder.
    pub fn builder() -> DebouncePolicyBuilder {
        DebouncePolicyBuilder::new()
    }

    /// The configured quiet period.
    pub fn quiet_period(&self) -> Duration {
        self.quiet_period
    }

    /// The instance name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Builder for [`DebouncePolicy`].
#[derive(Debug)]
pub struct DebouncePolicyBuilder {
    quiet_period: Duration,
    name: String,
}

impl DebouncePolicyBuilder {
    /// Creates a new builder with default values.
    pub fn new() -> Self {
        Self {
            quiet_period: Duration::from_millis(300),
            name: String::from("<unnamed>"),
        }
    }

    /// Sets how long to wait before invoking the operation.
    ///
    /// Default: 300ms
    pub fn quiet_period(mut self, period: Duration) -> Self {
        self.quiet_period = period;
        self
    }

    /// Sets the name of this policy instance.
    ///
    /// Default: `"<unnamed>"`
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Builds the policy.
    pub fn build(self) -> DebouncePolicy {
        DebouncePolicy {
            quiet_period: self.quiet_period,
            name: self.name,
        }
    }
}

impl Default for DebouncePolicyBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> Policy<T, E> for DebouncePolicy
where
    T: Send + 'static,
    E: Send + 'static,
{
    fn execute<'a>(
        &'a self,
        operation: Operation<'a, T, E>,
        cancel: CancellationToken,
    ) -> OperationFuture<'a, T, E> {
        Box::pin(async move {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(policy = %self.name, "Cancelled during quiet period");
                    return Err(PolicyError::Cancelled);
                }
                _ = tokio::time::sleep(self.quiet_period) => {}
            }

            operation(cancel).await
        })
    }
}
