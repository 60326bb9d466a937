//! Recording fakes shared by the pipeline's unit tests.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use async_trait::async_trait;
use cutpoint_core::{Marker, OperationId, OperationMetadata, Principal, Role, Value};
use parking_lot::Mutex;
use tower::Service;

use crate::service::invocation::{Invocation, InvocationError, InvocationFuture, InvocationResponse};
use crate::traits::{
    InvocationLog, InvocationRecord, Notifier, TransactionError, TransactionManager,
    TransactionScope,
};

// ---------------------------------------------------------------------------
// Invocations
// ---------------------------------------------------------------------------

pub fn metadata(operation: &OperationId, markers: Vec<Marker>) -> Arc<OperationMetadata> {
    Arc::new(OperationMetadata::from_markers(operation, markers).unwrap())
}

pub fn invocation(
    operation: OperationId,
    markers: Vec<Marker>,
    caller: Principal,
    arguments: Vec<Value>,
) -> Invocation {
    let metadata = metadata(&operation, markers);
    Invocation::new(operation, metadata, caller, arguments, 1_000)
}

pub fn member() -> Principal {
    Principal::new("joey", "member")
}

// ---------------------------------------------------------------------------
// StubOperation
// ---------------------------------------------------------------------------

/// Innermost service standing in for the real operation. Counts calls.
#[derive(Clone)]
pub struct StubOperation {
    pub calls: Arc<AtomicU32>,
    outcome: Arc<dyn Fn(u32) -> anyhow::Result<Value> + Send + Sync>,
}

impl StubOperation {
    /// Always returns `value`.
    pub fn returning(value: Value) -> Self {
        Self::with(move |_| Ok(value.clone()))
    }

    /// Returns the call number (starting at 1) so repeated runs are distinguishable.
    pub fn counting() -> Self {
        Self::with(|n| Ok(Value::Int(i64::from(n))))
    }

    pub fn failing(message: &'static str) -> Self {
        Self::with(move |_| Err(anyhow::anyhow!(message)))
    }

    fn with(outcome: impl Fn(u32) -> anyhow::Result<Value> + Send + Sync + 'static) -> Self {
        Self {
            calls: Arc::new(AtomicU32::new(0)),
            outcome: Arc::new(outcome),
        }
    }

    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Service<Invocation> for StubOperation {
    type Response = InvocationResponse;
    type Error = InvocationError;
    type Future = InvocationFuture;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, invocation: Invocation) -> Self::Future {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let result = (self.outcome)(n);
        Box::pin(async move {
            result
                .map(InvocationResponse::executed)
                .map_err(|source| InvocationError::Operation {
                    operation: invocation.operation,
                    source,
                })
        })
    }
}

// ---------------------------------------------------------------------------
// RecordingLog
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct RecordingLog {
    pub records: Mutex<Vec<InvocationRecord>>,
    pub fail: AtomicBool,
}

impl InvocationLog for RecordingLog {
    fn record(&self, record: &InvocationRecord) -> anyhow::Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("log sink unavailable");
        }
        self.records.lock().push(record.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// RecordingNotifier
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct RecordingNotifier {
    pub messages: Mutex<Vec<(Role, String)>>,
    pub fail: AtomicBool,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, role: &Role, message: &str) -> anyhow::Result<()> {
        self.messages.lock().push((role.clone(), message.to_string()));
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("mail relay down");
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// RecordingTransactions
// ---------------------------------------------------------------------------

/// Transaction manager that records every lifecycle event in order.
#[derive(Default)]
pub struct RecordingTransactions {
    pub events: Arc<Mutex<Vec<&'static str>>>,
    pub fail_begin: AtomicBool,
    pub fail_commit: Arc<AtomicBool>,
}

impl RecordingTransactions {
    pub fn events(&self) -> Vec<&'static str> {
        self.events.lock().clone()
    }

    pub fn count(&self, event: &str) -> usize {
        self.events.lock().iter().filter(|e| **e == event).count()
    }
}

impl TransactionManager for RecordingTransactions {
    fn begin(&self, _operation: &OperationId) -> Result<Box<dyn TransactionScope>, TransactionError> {
        if self.fail_begin.load(Ordering::SeqCst) {
            return Err(TransactionError::Begin("connection pool exhausted".to_string()));
        }
        self.events.lock().push("begin");
        Ok(Box::new(RecordingScope {
            events: Arc::clone(&self.events),
            fail_commit: Arc::clone(&self.fail_commit),
        }))
    }
}

struct RecordingScope {
    events: Arc<Mutex<Vec<&'static str>>>,
    fail_commit: Arc<AtomicBool>,
}

impl TransactionScope for RecordingScope {
    fn commit(&mut self) -> Result<(), TransactionError> {
        if self.fail_commit.load(Ordering::SeqCst) {
            return Err(TransactionError::Commit("serialization failure".to_string()));
        }
        self.events.lock().push("commit");
        Ok(())
    }

    fn release(&mut self) {
        self.events.lock().push("release");
    }
}
