//! The policy contract and the operation shape every policy wraps.
//!
//! An [`Operation`] is a shared, re-invocable function from a
//! [`CancellationToken`] to a boxed future. Policies receive one, decide when
//! (and how often) to invoke it, and hand a possibly derived token down to it.
//! Because the trait is object safe, heterogeneous policies stack as
//! `Arc<dyn Policy<T, E>>`.
//!
//! ```rust
//! use callguard_core::{operation, CancellationToken, Policy, PolicyError};
//! use futures::future::BoxFuture;
//!
//! /// A policy that does nothing but invoke the operation.
//! struct Passthrough;
//!
//! impl<T: Send + 'static, E: Send + 'static> Policy<T, E> for Passthrough {
//!     fn execute<'a>(
//!         &'a self,
//!         operation: callguard_core::Operation<'a, T, E>,
//!         cancel: CancellationToken,
//!     ) -> BoxFuture<'a, Result<T, PolicyError<E>>> {
//!         operation(cancel)
//!     }
//! }
//!
//! # futures::executor::block_on(async {
//! let op = operation(|_cancel| async { Ok::<_, std::io::Error>(7) });
//! let value = Passthrough.execute(op, CancellationToken::new()).await.unwrap();
//! assert_eq!(value, 7);
//! # });
//! ```

use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use crate::PolicyError;

/// The future an [`Operation`] or a [`Policy`] resolves to.
pub type OperationFuture<'a, T, E> = BoxFuture<'a, Result<T, PolicyError<E>>>;

/// A cancellable unit of asynchronous work.
///
/// Shared and `Fn` so that retry can invoke it repeatedly and composition can
/// re-enter inner layers.
pub type Operation<'a, T, E> =
    Arc<dyn Fn(CancellationToken) -> OperationFuture<'a, T, E> + Send + Sync + 'a>;

/// A decorator around an [`Operation`].
///
/// Implementations must observe `cancel` at every point where they suspend,
/// and must treat a cancelled token as neither success nor failure.
pub trait Policy<T, E>: Send + Sync {
    /// Runs `operation` under this policy.
    fn execute<'a>(
        &'a self,
        operation: Operation<'a, T, E>,
        cancel: CancellationToken,
    ) -> OperationFuture<'a, T, E>;
}

impl<T, E, P> Policy<T, E> for Arc<P>
where
    P: Policy<T, E> + ?Sized,
{
    fn execute<'a>(
        &'a self,
        operation: Operation<'a, T, E>,
        cancel: CancellationToken,
    ) -> OperationFuture<'a, T, E> {
        (**self).execute(operation, cancel)
    }
}

/// Adapts a closure returning `Result<T, E>` into an [`Operation`].
///
/// Errors are carried as [`PolicyError::Operation`].
pub fn operation<'a, T, E, F, Fut>(f: F) -> Operation<'a, T, E>
where
    T: 'a,
    E: 'a,
    F: Fn(CancellationToken) -> Fut + Send + Sync + 'a,
    Fut: Future<Output = Result<T, E>> + Send + 'a,
{
    Arc::new(move |cancel| -> OperationFuture<'a, T, E> {
        let fut = f(cancel);
        Box::pin(async move { fut.await.map_err(PolicyError::Operation) })
    })
}

/// Adapts a closure that already speaks [`PolicyError`] into an [`Operation`].
///
/// Useful when the operation is itself a pipeline, or wants to report
/// [`PolicyError::Cancelled`] after observing its token.
pub fn policy_operation<'a, T, E, F, Fut>(f: F) -> Operation<'a, T, E>
where
    T: 'a,
    E: 'a,
    F: Fn(CancellationToken) -> Fut + Send + Sync + 'a,
    Fut: Future<Output = Result<T, PolicyError<E>>> + Send + 'a,
{
    Arc::new(move |cancel| -> OperationFuture<'a, T, E> { Box::pin(f(cancel)) })
}
