//! Role-based authorization stage.
//!
//! Operations with one or more `Authorized` markers admit only callers whose
//! role is in the declared set. A rejected call never reaches later stages.

use std::task::{Context, Poll};

use tower::{Layer, Service};
use tracing::warn;

use crate::service::invocation::{Invocation, InvocationError, InvocationFuture, InvocationResponse};

// ---------------------------------------------------------------------------
// AuthorizationLayer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct AuthorizationLayer;

impl<S> Layer<S> for AuthorizationLayer {
    type Service = AuthorizationService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthorizationService { inner }
    }
}

// ---------------------------------------------------------------------------
// AuthorizationService
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct AuthorizationService<S> {
    inner: S,
}

impl<S> Service<Invocation> for AuthorizationService<S>
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
        if invocation.metadata.permits(&invocation.caller.role) {
            return Box::pin(self.inner.call(invocation));
        }

        metrics::counter!("cutpoint_authorization_denied_total").increment(1);
        warn!(
            caller = %invocation.caller.id,
            role = %invocation.caller.role,
            operation = %invocation.operation,
            "authorization denied"
        );
        let Invocation {
            caller, operation, ..
        } = invocation;
        Box::pin(async move {
            Err(InvocationError::Unauthorized {
                caller_id: caller.id,
                role: caller.role,
                operation,
            })
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use cutpoint_core::{Marker, OperationId, Principal, Role, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::testing::{invocation, member, StubOperation};

    fn store_value() -> OperationId {
        OperationId::new("Wallet", "store_value")
    }

    fn member_or_admin() -> Vec<Marker> {
        vec![
            Marker::Authorized {
                role: Role::new("member"),
            },
            Marker::Authorized {
                role: Role::new("admin"),
            },
        ]
    }

    #[tokio::test]
    async fn caller_outside_role_set_is_rejected() {
        let inner = StubOperation::returning(Value::Null);
        let svc = AuthorizationLayer.layer(inner.clone());

        let err = svc
            .oneshot(invocation(
                store_value(),
                member_or_admin(),
                Principal::new("Kyo", "guest"),
                vec![],
            ))
            .await
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "Kyo is guest without authorization for Wallet.store_value()"
        );
        assert_eq!(inner.call_count(), 0);
    }

    #[tokio::test]
    async fn any_declared_role_is_admitted() {
        let inner = StubOperation::returning(Value::from(1_i64));
        let svc = AuthorizationLayer.layer(inner.clone());

        svc.clone()
            .oneshot(invocation(store_value(), member_or_admin(), member(), vec![]))
            .await
            .unwrap();
        svc.oneshot(invocation(
            store_value(),
            member_or_admin(),
            Principal::new("root", "admin"),
            vec![],
        ))
        .await
        .unwrap();

        assert_eq!(inner.call_count(), 2);
    }

    #[tokio::test]
    async fn unrestricted_operation_admits_everyone() {
        let inner = StubOperation::returning(Value::Null);
        let svc = AuthorizationLayer.layer(inner.clone());

        svc.oneshot(invocation(
            store_value(),
            vec![],
            Principal::new("anon", ""),
            vec![],
        ))
        .await
        .unwrap();
        assert_eq!(inner.call_count(), 1);
    }

    #[tokio::test]
    async fn role_comparison_is_exact() {
        let inner = StubOperation::returning(Value::Null);
        let svc = AuthorizationLayer.layer(inner.clone());

        let err = svc
            .oneshot(invocation(
                store_value(),
                member_or_admin(),
                Principal::new("joey", "Member"),
                vec![],
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, InvocationError::Unauthorized { .. }));
        assert_eq!(inner.call_count(), 0);
    }
}
