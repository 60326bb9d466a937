//! Invocation types carried through the interceptor pipeline.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use cutpoint_core::{OperationId, OperationMetadata, Principal, Role, Value};
use uuid::Uuid;

/// Separator placed between rendered arguments in log signatures.
pub const ARGUMENT_SEPARATOR: &str = "-";

/// Boxed future returned by every stage of the pipeline.
pub type InvocationFuture =
    Pin<Box<dyn Future<Output = Result<InvocationResponse, InvocationError>> + Send>>;

/// One in-flight call. Created fresh by the dispatcher, never shared across calls.
#[derive(Debug, Clone)]
pub struct Invocation {
    /// Unique id of this call, for correlating log lines.
    pub id: Uuid,
    pub operation: OperationId,
    /// Metadata declared for `operation`, looked up once by the dispatcher.
    pub metadata: Arc<OperationMetadata>,
    /// Caller resolved once per call.
    pub caller: Principal,
    /// Arguments in call order.
    pub arguments: Vec<Value>,
    /// Milliseconds since Unix epoch when the call entered the pipeline.
    pub started_at_ms: u64,
}

impl Invocation {
    #[must_use]
    pub fn new(
        operation: OperationId,
        metadata: Arc<OperationMetadata>,
        caller: Principal,
        arguments: Vec<Value>,
        started_at_ms: u64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            operation,
            metadata,
            caller,
            arguments,
            started_at_ms,
        }
    }

    /// Rendered arguments joined by [`ARGUMENT_SEPARATOR`]. `Null` renders empty.
    #[must_use]
    pub fn rendered_arguments(&self) -> String {
        self.arguments
            .iter()
            .map(Value::render)
            .collect::<Vec<_>>()
            .join(ARGUMENT_SEPARATOR)
    }

    /// Human-readable call signature: `service-method-arg1-arg2...`.
    ///
    /// Only for logs. Distinct calls may share a signature; cache keys use
    /// [`crate::cache::CacheKey`] instead.
    #[must_use]
    pub fn signature(&self) -> String {
        let mut signature = format!(
            "{}{sep}{}",
            self.operation.service,
            self.operation.method,
            sep = ARGUMENT_SEPARATOR
        );
        if !self.arguments.is_empty() {
            signature.push_str(ARGUMENT_SEPARATOR);
            signature.push_str(&self.rendered_arguments());
        }
        signature
    }
}

/// Where the value of a successful call came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseOrigin {
    /// The real operation ran.
    Operation,
    /// The caching stage answered; the operation did not run.
    Cache,
}

/// Result of a completed call travelling back up the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct InvocationResponse {
    pub value: Value,
    pub origin: ResponseOrigin,
}

impl InvocationResponse {
    #[must_use]
    pub fn executed(value: Value) -> Self {
        Self {
            value,
            origin: ResponseOrigin::Operation,
        }
    }

    #[must_use]
    pub fn cached(value: Value) -> Self {
        Self {
            value,
            origin: ResponseOrigin::Cache,
        }
    }

    #[must_use]
    pub fn is_cached(&self) -> bool {
        self.origin == ResponseOrigin::Cache
    }
}

/// Errors surfaced to the caller of the pipeline. None are retried.
#[derive(Debug, thiserror::Error)]
pub enum InvocationError {
    #[error("{caller_id} is {role} without authorization for {operation}()")]
    Unauthorized {
        caller_id: String,
        role: Role,
        operation: OperationId,
    },
    #[error("transaction aborted for {operation}: {reason}")]
    TransactionAborted {
        operation: OperationId,
        reason: String,
    },
    #[error("{operation} failed: {source}")]
    Operation {
        operation: OperationId,
        #[source]
        source: anyhow::Error,
    },
    #[error("no handler registered for {0}")]
    UnknownOperation(OperationId),
}
