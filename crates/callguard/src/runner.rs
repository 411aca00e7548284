//! Composition of policies around a single call.

use std::sync::Arc;

use callguard_core::{CancellationToken, Operation, OperationFuture, Policy};

/// Folds an ordered list of policies around one operation.
///
/// The first policy is the outermost wrapper and the last one sits directly
/// around the operation:
/// `policies[0]` runs `policies[1]` runs ... runs `operation`.
///
/// A runner borrows the list and is meant to live for a single call; build a
/// new one for every call.
///
/// ```rust
/// use std::sync::Arc;
/// use std::time::Duration;
/// use callguard::{operation, CancellationToken, Policy, PolicyRunner};
/// use callguard::retry::RetryPolicy;
/// use callguard::timeout::TimeoutPolicy;
///
/// # #[tokio::main(flavor = "current_thread", start_paused = true)]
/// # async fn main() {
/// let policies: Vec<Arc<dyn Policy<u32, std::io::Error>>> = vec![
///     Arc::new(RetryPolicy::<std::io::Error>::builder().max_attempts(3).fixed_backoff(Duration::ZERO).build()),
///     Arc::new(TimeoutPolicy::new(Duration::from_millis(100))),
/// ];
///
/// let fetch = operation(|_| async { Ok::<_, std::io::Error>(7) });
/// let value = PolicyRunner::new(&policies)
///     .execute(fetch, CancellationToken::new())
///     .await
///     .unwrap();
/// assert_eq!(value, 7);
/// # }
/// ```
pub struct PolicyRunner<'a, T, E> {
    policies: &'a [Arc<dyn Policy<T, E>>],
}

impl<'a, T, E> PolicyRunner<'a, T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    /// Creates a runner over `policies`, outermost first.
    pub fn new(policies: &'a [Arc<dyn Policy<T, E>>]) -> Self {
        Self { policies }
    }

    /// Number of policies in the pipeline.
    pub fn len(&self) -> usize {
        self.policies.len()
    }

    /// Returns `true` if the pipeline has no policies.
    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }

    /// Returns the composed operation without running it.
    ///
    /// With no policies this is `operation` itself.
    pub fn compose(&self, operation: Operation<'a, T, E>) -> Operation<'a, T, E> {
        let policies: &'a [Arc<dyn Policy<T, E>>] = self.policies;
        policies.iter().rev().fold(operation, |inner, policy| {
            let policy: &'a dyn Policy<T, E> = policy.as_ref();
            let wrapped: Operation<'a, T, E> =
                Arc::new(move |cancel: CancellationToken| -> OperationFuture<'a, T, E> {
                    policy.execute(Arc::clone(&inner), cancel)
                });
            wrapped
        })
    }

    /// Runs `operation` through every policy.
    pub fn execute(
        &self,
        operation: Operation<'a, T, E>,
        cancel: CancellationToken,
    ) -> OperationFuture<'a, T, E> {
        let composed = self.compose(operation);
        composed(cancel)
    }
}
