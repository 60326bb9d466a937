//! Collaborator ports consumed by the interceptor stages.
//!
//! Implementations live outside the pipeline core; the defaults in
//! [`crate::adapters`] log through `tracing` and are suitable for demos and tests.

use async_trait::async_trait;
use cutpoint_core::{OperationId, Principal, Role};
use uuid::Uuid;

/// Supplies the identity of the caller on whose behalf a call runs.
/// Invoked once per call by the dispatcher.
pub trait CallerContext: Send + Sync {
    fn current_user(&self) -> Principal;
}

/// One parameter-log record produced by the logging stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationRecord {
    pub invocation_id: Uuid,
    pub caller_id: String,
    pub operation: OperationId,
    /// Rendered arguments joined by [`crate::service::ARGUMENT_SEPARATOR`].
    pub arguments: String,
    /// Milliseconds since Unix epoch when the call entered the pipeline.
    pub timestamp_ms: u64,
}

/// Process-wide sink for parameter-log records. Best-effort: the logging
/// stage reports a failed write and carries on with the call.
pub trait InvocationLog: Send + Sync {
    /// Write one record.
    fn record(&self, record: &InvocationRecord) -> anyhow::Result<()>;
}

/// Delivers transaction-abort notifications to a role.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Push `message` to whoever holds `role`. Failures never mask the abort.
    async fn notify(&self, role: &Role, message: &str) -> anyhow::Result<()>;
}

/// Errors reported by a transactional resource.
#[derive(Debug, thiserror::Error)]
pub enum TransactionError {
    #[error("failed to begin transaction: {0}")]
    Begin(String),
    #[error("commit rejected: {0}")]
    Commit(String),
}

/// Opens one transactional scope per call.
pub trait TransactionManager: Send + Sync {
    /// Acquire a fresh scope for `operation`.
    ///
    /// # Errors
    ///
    /// Returns [`TransactionError::Begin`] when no scope can be opened.
    fn begin(&self, operation: &OperationId) -> Result<Box<dyn TransactionScope>, TransactionError>;
}

/// A unit of work with explicit commit and release.
///
/// `release` is called exactly once per scope by the transaction stage,
/// after a successful commit, after a failed commit, or without any commit
/// when the operation failed. Releasing without a commit rolls back.
pub trait TransactionScope: Send {
    /// Make the work durable.
    ///
    /// # Errors
    ///
    /// Returns [`TransactionError::Commit`] when the resource aborts.
    fn commit(&mut self) -> Result<(), TransactionError>;

    /// Dispose of the scope.
    fn release(&mut self);
}
