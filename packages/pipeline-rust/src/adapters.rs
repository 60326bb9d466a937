//! Default collaborator implementations that report through `tracing`.
//!
//! Suitable for the demo binary and for embedding the pipeline where no real
//! notification channel or transactional resource exists yet.

use std::sync::Arc;

use arc_swap::ArcSwap;
use async_trait::async_trait;
use cutpoint_core::{OperationId, Principal, Role};
use tracing::{info, warn};

use crate::traits::{
    CallerContext, InvocationLog, InvocationRecord, Notifier, TransactionError,
    TransactionManager, TransactionScope,
};

// ---------------------------------------------------------------------------
// StaticCallerContext
// ---------------------------------------------------------------------------

/// Caller context holding one current principal, swappable at runtime.
///
/// Readers never block: each call takes a snapshot of the current principal.
pub struct StaticCallerContext {
    current: ArcSwap<Principal>,
}

impl StaticCallerContext {
    #[must_use]
    pub fn new(principal: Principal) -> Self {
        Self {
            current: ArcSwap::from_pointee(principal),
        }
    }

    /// Replace the principal seen by subsequent calls.
    pub fn switch_to(&self, principal: Principal) {
        info!(caller = %principal.id, role = %principal.role, "caller switched");
        self.current.store(Arc::new(principal));
    }
}

impl CallerContext for StaticCallerContext {
    fn current_user(&self) -> Principal {
        self.current.load().as_ref().clone()
    }
}

// ---------------------------------------------------------------------------
// TracingInvocationLog
// ---------------------------------------------------------------------------

/// Writes parameter-log records as `info` events on the `cutpoint::params` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingInvocationLog;

impl InvocationLog for TracingInvocationLog {
    fn record(&self, record: &InvocationRecord) -> anyhow::Result<()> {
        info!(
            target: "cutpoint::params",
            invocation_id = %record.invocation_id,
            caller = %record.caller_id,
            operation = %record.operation,
            arguments = %record.arguments,
            timestamp_ms = record.timestamp_ms,
            "{} invoked {}({})",
            record.caller_id,
            record.operation,
            record.arguments,
        );
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// TracingNotifier
// ---------------------------------------------------------------------------

/// Delivers notifications as `warn` events. Never fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn notify(&self, role: &Role, message: &str) -> anyhow::Result<()> {
        warn!(target: "cutpoint::notify", %role, "notify {role}: {message}");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// LoggingTransactionManager
// ---------------------------------------------------------------------------

/// Transaction manager whose scopes only log their lifecycle.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingTransactionManager;

impl TransactionManager for LoggingTransactionManager {
    fn begin(&self, operation: &OperationId) -> Result<Box<dyn TransactionScope>, TransactionError> {
        info!(%operation, "transaction begin");
        Ok(Box::new(LoggingTransactionScope {
            operation: operation.clone(),
            committed: false,
        }))
    }
}

struct LoggingTransactionScope {
    operation: OperationId,
    committed: bool,
}

impl TransactionScope for LoggingTransactionScope {
    fn commit(&mut self) -> Result<(), TransactionError> {
        self.committed = true;
        info!(operation = %self.operation, "transaction complete");
        Ok(())
    }

    fn release(&mut self) {
        info!(
            operation = %self.operation,
            committed = self.committed,
            "transaction dispose"
        );
    }
}
