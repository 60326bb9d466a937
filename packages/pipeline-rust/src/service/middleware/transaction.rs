//! Transactional execution stage.
//!
//! Operations marked `Transaction` run inside a scope opened by the
//! [`TransactionManager`]. A successful call is committed. Any failure
//! (begin, operation, commit) releases the scope, then notifies the declared
//! role before the failure is returned. Delivery is bounded by
//! [`NOTIFY_TIMEOUT`]. The scope is released on every path, including when the
//! call's future is dropped mid-flight.

use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use cutpoint_core::{OperationId, Role};
use tower::{Layer, Service};
use tracing::{debug, warn};

use crate::service::invocation::{Invocation, InvocationError, InvocationFuture, InvocationResponse};
use crate::traits::{Notifier, TransactionManager, TransactionScope};

/// Longest a failing call waits for its abort notification to be delivered.
pub const NOTIFY_TIMEOUT: Duration = Duration::from_secs(5);

// ---------------------------------------------------------------------------
// TransactionLayer
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct TransactionLayer {
    manager: Arc<dyn TransactionManager>,
    notifier: Arc<dyn Notifier>,
}

impl TransactionLayer {
    #[must_use]
    pub fn new(manager: Arc<dyn TransactionManager>, notifier: Arc<dyn Notifier>) -> Self {
        Self { manager, notifier }
    }
}

impl<S> Layer<S> for TransactionLayer {
    type Service = TransactionService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TransactionService {
            inner,
            manager: Arc::clone(&self.manager),
            notifier: Arc::clone(&self.notifier),
        }
    }
}

// ---------------------------------------------------------------------------
// TransactionService
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct TransactionService<S> {
    inner: S,
    manager: Arc<dyn TransactionManager>,
    notifier: Arc<dyn Notifier>,
}

impl<S> Service<Invocation> for TransactionService<S>
where
    S: Service<Invocation, Response = InvocationResponse, Error = InvocationError> + Send,
    S::Future: Send + 'static,
{
    type Response = InvocationResponse;
    type Error = InvocationError;
    type Future = InvocationFuture;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, invocation: Invocation) -> Self::Future {
        let Some(policy) = invocation.metadata.transaction.clone() else {
            return Box::pin(self.inner.call(invocation));
        };

        let operation = invocation.operation.clone();
        let notifier = Arc::clone(&self.notifier);

        let scope = match self.manager.begin(&operation) {
            Ok(scope) => scope,
            Err(e) => {
                let error = InvocationError::TransactionAborted {
                    operation: operation.clone(),
                    reason: e.to_string(),
                };
                return Box::pin(async move {
                    notify_abort(notifier.as_ref(), &policy.notify, &operation, &error).await;
                    Err(error)
                });
            }
        };

        let mut guard = ReleaseGuard { scope };
        let fut = self.inner.call(invocation);
        Box::pin(async move {
            let result = match fut.await {
                Ok(response) => match guard.scope.commit() {
                    Ok(()) => {
                        debug!(%operation, "transaction committed");
                        Ok(response)
                    }
                    Err(e) => Err(InvocationError::TransactionAborted {
                        operation: operation.clone(),
                        reason: e.to_string(),
                    }),
                },
                Err(e) => Err(e),
            };
            drop(guard);

            if let Err(error) = &result {
                notify_abort(notifier.as_ref(), &policy.notify, &operation, error).await;
            }
            result
        })
    }
}

/// Releases the scope when dropped, whether or not it was committed.
struct ReleaseGuard {
    scope: Box<dyn TransactionScope>,
}

impl Drop for ReleaseGuard {
    fn drop(&mut self) {
        self.scope.release();
    }
}

async fn notify_abort(
    notifier: &dyn Notifier,
    role: &Role,
    operation: &OperationId,
    error: &InvocationError,
) {
    metrics::counter!("cutpoint_transaction_aborts_total").increment(1);
    warn!(%operation, notify = %role, error = %error, "transaction aborted");

    let message = format!("{operation} aborted: {error}");
    match tokio::time::timeout(NOTIFY_TIMEOUT, notifier.notify(role, &message)).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            warn!(%operation, notify = %role, error = %e, "failed to deliver abort notification");
        }
        Err(_) => {
            warn!(
                %operation,
                notify = %role,
                timeout_ms = NOTIFY_TIMEOUT.as_millis(),
                "abort notification timed out"
            );
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
