//! Tower integration: run a [`PolicyStack`] around a tower service.

use std::sync::Arc;
use std::task::{Context, Poll};

use callguard_core::{operation, CancellationToken, PolicyError};
use futures::future::{poll_fn, BoxFuture};
use tower_layer::Layer;
use tower_service::Service;

use crate::stack::PolicyStack;

/// Layer that wraps a service in a [`PolicyStack`].
///
/// Requests must be `Clone` because retries re-send them. The response
/// future owns a cancellation token that is cancelled when the future is
/// dropped, so dropping a call stops every policy waiting inside it.
///
/// ```rust
/// use std::time::Duration;
/// use callguard::{PolicyLayer, PolicyStack};
/// use callguard::timeout::TimeoutPolicy;
/// use tower::{service_fn, Layer, ServiceExt};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let stack = PolicyStack::<String, std::io::Error>::builder()
///     .name("greeter")
///     .policy(TimeoutPolicy::new(Duration::from_secs(1)))
///     .build();
///
/// let svc = PolicyLayer::new(stack).layer(service_fn(|name: String| async move {
///     Ok::<_, std::io::Error>(format!("hello {name}"))
/// }));
///
/// let reply = svc.oneshot("ada".to_string()).await.unwrap();
/// assert_eq!(reply, "hello ada");
/// # }
/// ```
pub struct PolicyLayer<Res, Err> {
    stack: Arc<PolicyStack<Res, Err>>,
}

impl<Res, Err> PolicyLayer<Res, Err> {
    /// Creates a layer from a stack.
    pub fn new(stack: impl Into<Arc<PolicyStack<Res, Err>>>) -> Self {
        Self {
            stack: stack.into(),
        }
    }
}

impl<Res, Err> Clone for PolicyLayer<Res, Err> {
    fn clone(&self) -> Self {
        Self {
            stack: Arc::clone(&self.stack),
        }
    }
}

impl<S, Res, Err> Layer<S> for PolicyLayer<Res, Err> {
    type Service = PolicyService<S, Res, Err>;

    fn layer(&self, service: S) -> Self::Service {
        PolicyService {
            inner: service,
            stack: Arc::clone(&self.stack),
        }
    }
}

/// Service produced by [`PolicyLayer`].
pub struct PolicyService<S, Res, Err> {
    inner: S,
    stack: Arc<PolicyStack<Res, Err>>,
}

impl<S: Clone, Res, Err> Clone for PolicyService<S, Res, Err> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            stack: Arc::clone(&self.stack),
        }
    }
}

impl<S, Req, Res, Err> Service<Req> for PolicyService<S, Res, Err>
where
    S: Service<Req, Response = Res, Error = Err> + Clone + Send + Sync + 'static,
    S::Future: Send + 'static,
    Req: Clone + Send + Sync + 'static,
    Res: Send + 'static,
    Err: Send + 'static,
{
    type Response = Res;
    type Error = PolicyError<Err>;
    type Future = BoxFuture<'static, Result<Res, PolicyError<Err>>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(PolicyError::Operation)
    }

    fn call(&mut self, request: Req) -> Self::Future {
        let stack = Arc::clone(&self.stack);
        let inner = self.inner.clone();
        let cancel = CancellationToken::new();
        let guard = cancel.clone().drop_guard();

        Box::pin(async move {
            let call = operation(move |_cancel| {
                let mut svc = inner.clone();
                let request = request.clone();
                async move {
                    poll_fn(|cx| svc.poll_ready(cx)).await?;
                    svc.call(request).await
                }
            });

            let result = stack.execute(call, cancel).await;
            guard.disarm();
            result
        })
    }
}
