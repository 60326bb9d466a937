//! Operation routing: the innermost service, dispatching an `Invocation` to the
//! handler registered for its `OperationId`.

use std::collections::HashMap;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use std::task::{Context, Poll};

use async_trait::async_trait;
use cutpoint_core::{OperationId, Value};
use tower::Service;
use tracing::{debug, warn};

use super::invocation::{Invocation, InvocationError, InvocationFuture, InvocationResponse};

// ---------------------------------------------------------------------------
// OperationHandler
// ---------------------------------------------------------------------------

/// A real business operation: ordered arguments in, one value out.
#[async_trait]
pub trait OperationHandler: Send + Sync {
    async fn invoke(&self, arguments: &[Value]) -> anyhow::Result<Value>;
}

/// Adapter turning an async closure into an [`OperationHandler`].
pub struct HandlerFn<F, Fut> {
    f: F,
    _future: PhantomData<fn() -> Fut>,
}

/// Wrap `f` as an [`OperationHandler`]. The closure receives an owned copy of the arguments.
pub fn handler_fn<F, Fut>(f: F) -> HandlerFn<F, Fut>
where
    F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
{
    HandlerFn {
        f,
        _future: PhantomData,
    }
}

#[async_trait]
impl<F, Fut> OperationHandler for HandlerFn<F, Fut>
where
    F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
{
    async fn invoke(&self, arguments: &[Value]) -> anyhow::Result<Value> {
        (self.f)(arguments.to_vec()).await
    }
}

// ---------------------------------------------------------------------------
// OperationRouter
// ---------------------------------------------------------------------------

/// Routes an `Invocation` to the handler registered for its operation.
///
/// Cloning is cheap (the handler table is shared), so the router can sit at
/// the bottom of a cloneable service stack. Unregistered operations fail with
/// `InvocationError::UnknownOperation`; handler failures are wrapped once into
/// `InvocationError::Operation` and travel up the stack unchanged.
#[derive(Clone, Default)]
pub struct OperationRouter {
    handlers: Arc<HashMap<OperationId, Arc<dyn OperationHandler>>>,
}

impl OperationRouter {
    /// Create a new empty router.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the handler for `operation`, replacing any previous one.
    pub fn register<H>(&mut self, operation: OperationId, handler: H)
    where
        H: OperationHandler + 'static,
    {
        let handlers = Arc::make_mut(&mut self.handlers);
        if handlers.insert(operation.clone(), Arc::new(handler)).is_some() {
            warn!(%operation, "replaced existing operation handler");
        }
    }

    /// Whether a handler is registered for `operation`.
    #[must_use]
    pub fn contains(&self, operation: &OperationId) -> bool {
        self.handlers.contains_key(operation)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl Service<Invocation> for OperationRouter {
    type Response = InvocationResponse;
    type Error = InvocationError;
    type Future = InvocationFuture;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, invocation: Invocation) -> Self::Future {
        let Some(handler) = self.handlers.get(&invocation.operation).cloned() else {
            return Box::pin(async move {
                Err(InvocationError::UnknownOperation(invocation.operation))
            });
        };

        Box::pin(async move {
            debug!(
                operation = %invocation.operation,
                invocation_id = %invocation.id,
                "invoking operation"
            );
            match handler.invoke(&invocation.arguments).await {
                Ok(value) => Ok(InvocationResponse::executed(value)),
                Err(source) => Err(InvocationError::Operation {
                    operation: invocation.operation,
                    source,
                }),
            }
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use cutpoint_core::{OperationMetadata, Principal};
    use tower::ServiceExt;

    use super::*;
    use crate::service::invocation::ResponseOrigin;

    fn make_invocation(method: &str, arguments: Vec<Value>) -> Invocation {
        Invocation::new(
            OperationId::new("Wallet", method),
            Arc::new(OperationMetadata::default()),
            Principal::new("joey", "member"),
            arguments,
            0,
        )
    }

    struct EchoHandler;

    #[async_trait]
    impl OperationHandler for EchoHandler {
        async fn invoke(&self, arguments: &[Value]) -> anyhow::Result<Value> {
            Ok(Value::Array(arguments.to_vec()))
        }
    }

    #[tokio::test]
    async fn routes_to_registered_handler() {
        let mut router = OperationRouter::new();
        router.register(OperationId::new("Wallet", "echo"), EchoHandler);

        let resp = router
            .oneshot(make_invocation("echo", vec![Value::from("joey")]))
            .await
            .unwrap();
        assert_eq!(resp.value, Value::Array(vec![Value::from("joey")]));
        assert_eq!(resp.origin, ResponseOrigin::Operation);
    }

    #[tokio::test]
    async fn unknown_operation_returns_error() {
        let router = OperationRouter::new();
        let err = router
            .oneshot(make_invocation("missing", vec![]))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            InvocationError::UnknownOperation(op) if op.method == "missing"
        ));
    }

    #[tokio::test]
    async fn handler_failure_is_wrapped_with_operation() {
        let mut router = OperationRouter::new();
        router.register(
            OperationId::new("Wallet", "broken"),
            handler_fn(|_args| async { Err::<Value, _>(anyhow::anyhow!("ledger offline")) }),
        );

        let err = router
            .oneshot(make_invocation("broken", vec![]))
            .await
            .unwrap_err();
        match err {
            InvocationError::Operation { operation, source } => {
                assert_eq!(operation, OperationId::new("Wallet", "broken"));
                assert_eq!(source.to_string(), "ledger offline");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn clones_share_the_handler_table() {
        let calls = Arc::new(AtomicU32::new(0));
        let mut router = OperationRouter::new();
        let counter = calls.clone();
        router.register(
            OperationId::new("Wallet", "count"),
            handler_fn(move |_args| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, anyhow::Error>(Value::Null) }
            }),
        );

        let clone = router.clone();
        router.oneshot(make_invocation("count", vec![])).await.unwrap();
        clone.oneshot(make_invocation("count", vec![])).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn register_replaces_previous_handler() {
        let mut router = OperationRouter::new();
        router.register(OperationId::new("Wallet", "echo"), EchoHandler);
        router.register(OperationId::new("Wallet", "echo"), EchoHandler);
        assert_eq!(router.len(), 1);
        assert!(router.contains(&OperationId::new("Wallet", "echo")));
    }
}
