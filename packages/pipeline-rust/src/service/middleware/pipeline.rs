//! Pipeline composition: wraps the `OperationRouter` with every interceptor stage.

use std::sync::Arc;

use tower::util::BoxCloneService;
use tower::ServiceBuilder;

use super::authorization::AuthorizationLayer;
use super::caching::CachingLayer;
use super::logging::LoggingLayer;
use super::transaction::TransactionLayer;
use crate::cache::CacheStore;
use crate::service::invocation::{Invocation, InvocationError, InvocationResponse};
use crate::service::router::OperationRouter;
use crate::traits::{InvocationLog, Notifier, TransactionManager};

/// The fully composed interceptor stack.
pub type InterceptorPipeline = BoxCloneService<Invocation, InvocationResponse, InvocationError>;

/// Collaborators needed by the interceptor stages.
#[derive(Clone)]
pub struct PipelineDeps {
    pub invocation_log: Arc<dyn InvocationLog>,
    pub cache: Arc<dyn CacheStore>,
    pub transactions: Arc<dyn TransactionManager>,
    pub notifier: Arc<dyn Notifier>,
}

/// Build the interceptor pipeline around `router`.
///
/// Stage order (outermost to innermost):
/// 1. `LoggingLayer` -- every attempted call is logged, even if later rejected
/// 2. `AuthorizationLayer` -- reject before any cache lookup or transaction
/// 3. `CachingLayer` -- a hit skips the transaction and the operation
/// 4. `TransactionLayer` -- closest to the operation it commits
#[must_use]
pub fn build_interceptor_pipeline(router: OperationRouter, deps: PipelineDeps) -> InterceptorPipeline {
    let svc = ServiceBuilder::new()
        .layer(LoggingLayer::new(deps.invocation_log))
        .layer(AuthorizationLayer)
        .layer(CachingLayer::new(deps.cache))
        .layer(TransactionLayer::new(deps.transactions, deps.notifier))
        .service(router);
    BoxCloneService::new(svc)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use cutpoint_core::{ManualClock, Marker, OperationId, Principal, Role, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::cache::InMemoryCacheStore;
    use crate::service::router::handler_fn;
    use crate::testing::{invocation, member, RecordingLog, RecordingNotifier, RecordingTransactions};

    struct Harness {
        log: Arc<RecordingLog>,
        cache: Arc<InMemoryCacheStore>,
        tx: Arc<RecordingTransactions>,
        notifier: Arc<RecordingNotifier>,
        calls: Arc<AtomicU32>,
        pipeline: InterceptorPipeline,
    }

    fn harness() -> Harness {
        let log = Arc::new(RecordingLog::default());
        let cache = Arc::new(InMemoryCacheStore::with_clock(Arc::new(ManualClock::new(0))));
        let tx = Arc::new(RecordingTransactions::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let calls = Arc::new(AtomicU32::new(0));

        let mut router = OperationRouter::new();
        let counter = Arc::clone(&calls);
        router.register(
            OperationId::new("Wallet", "op"),
            handler_fn(move |_args| {
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                async move { Ok::<_, anyhow::Error>(Value::Int(i64::from(n))) }
            }),
        );

        let pipeline = build_interceptor_pipeline(
            router,
            PipelineDeps {
                invocation_log: log.clone(),
                cache: cache.clone(),
                transactions: tx.clone(),
                notifier: notifier.clone(),
            },
        );
        Harness {
            log,
            cache,
            tx,
            notifier,
            calls,
            pipeline,
        }
    }

    fn all_markers() -> Vec<Marker> {
        vec![
            Marker::LogParameters,
            Marker::Authorized {
                role: Role::new("member"),
            },
            Marker::CacheResult { duration_ms: 1000 },
            Marker::Transaction {
                notify: Role::new("admin"),
            },
        ]
    }

    fn op() -> OperationId {
        OperationId::new("Wallet", "op")
    }

    #[tokio::test]
    async fn rejected_call_is_logged_but_touches_nothing_else() {
        let h = harness();

        let err = h
            .pipeline
            .clone()
            .oneshot(invocation(
                op(),
                all_markers(),
                Principal::new("Kyo", "guest"),
                vec![Value::from("x")],
            ))
            .await
            .unwrap_err();

        assert!(matches!(err, InvocationError::Unauthorized { .. }));
        assert_eq!(h.log.records.lock().len(), 1);
        assert!(h.cache.is_empty());
        assert!(h.tx.events().is_empty());
        assert!(h.notifier.messages.lock().is_empty());
        assert_eq!(h.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn guest_cannot_read_a_warm_cache_entry() {
        let h = harness();
        let args = vec![Value::from("Joey"), Value::from(91_i64)];

        let warmed = h
            .pipeline
            .clone()
            .oneshot(invocation(op(), all_markers(), member(), args.clone()))
            .await
            .unwrap();
        assert_eq!(warmed.value, Value::Int(1));
        assert_eq!(h.cache.len(), 1);

        let err = h
            .pipeline
            .clone()
            .oneshot(invocation(
                op(),
                all_markers(),
                Principal::new("Kyo", "guest"),
                args,
            ))
            .await
            .unwrap_err();

        match err {
            InvocationError::Unauthorized { caller_id, .. } => assert_eq!(caller_id, "Kyo"),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(h.calls.load(Ordering::SeqCst), 1);
        assert_eq!(h.tx.events(), vec!["begin", "commit", "release"]);
        assert_eq!(h.log.records.lock().len(), 2);
    }

    #[tokio::test]
    async fn cache_hit_skips_transaction_and_operation() {
        let h = harness();
        let args = vec![Value::from("Joey"), Value::from(91_i64)];

        let first = h
            .pipeline
            .clone()
            .oneshot(invocation(op(), all_markers(), member(), args.clone()))
            .await
            .unwrap();
        let second = h
            .pipeline
            .clone()
            .oneshot(invocation(op(), all_markers(), member(), args))
            .await
            .unwrap();

        assert_eq!(first.value, second.value);
        assert!(second.is_cached());
        assert_eq!(h.calls.load(Ordering::SeqCst), 1);
        assert_eq!(h.tx.events(), vec!["begin", "commit", "release"]);
        assert_eq!(h.log.records.lock().len(), 2);
    }

    #[tokio::test]
    async fn unmarked_operation_runs_every_time() {
        let h = harness();

        for _ in 0..2 {
            h.pipeline
                .clone()
                .oneshot(invocation(op(), vec![], member(), vec![Value::from("a")]))
                .await
                .unwrap();
        }

        assert_eq!(h.calls.load(Ordering::SeqCst), 2);
        assert!(h.log.records.lock().is_empty());
        assert!(h.tx.events().is_empty());
    }

    #[tokio::test]
    async fn unknown_operation_inside_transaction_notifies() {
        let h = harness();

        let err = h
            .pipeline
            .clone()
            .oneshot(invocation(
                OperationId::new("Wallet", "missing"),
                vec![Marker::Transaction {
                    notify: Role::new("admin"),
                }],
                member(),
                vec![],
            ))
            .await
            .unwrap_err();

        assert!(matches!(err, InvocationError::UnknownOperation(_)));
        assert_eq!(h.tx.events(), vec!["begin", "release"]);
        assert_eq!(h.notifier.messages.lock().len(), 1);
    }
}
