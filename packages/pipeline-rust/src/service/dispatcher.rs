//! Entry point for callers: builds one `Invocation` per call and drives it
//! through the interceptor pipeline.

use std::future::Future;
use std::sync::Arc;

use cutpoint_core::{ClockSource, MetadataRegistry, OperationId, SystemClock, Value};
use tower::ServiceExt;
use tracing::{debug, info_span, Instrument};

use super::invocation::{Invocation, InvocationError, InvocationResponse};
use super::middleware::pipeline::InterceptorPipeline;
use crate::traits::CallerContext;

/// Runs calls through the interceptor pipeline.
///
/// Cloning is cheap: the pipeline's stages hold their collaborators behind
/// `Arc`. Every call clones the stack and drives the clone with `oneshot`,
/// so clones can be moved into as many tasks as needed.
#[derive(Clone)]
pub struct Dispatcher {
    pipeline: InterceptorPipeline,
    registry: Arc<MetadataRegistry>,
    caller: Arc<dyn CallerContext>,
    clock: Arc<dyn ClockSource>,
}

impl Dispatcher {
    #[must_use]
    pub fn new(
        pipeline: InterceptorPipeline,
        registry: Arc<MetadataRegistry>,
        caller: Arc<dyn CallerContext>,
    ) -> Self {
        Self {
            pipeline,
            registry,
            caller,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replaces the clock used to stamp invocations.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn ClockSource>) -> Self {
        self.clock = clock;
        self
    }

    /// Builds the invocation for one call: metadata lookup plus a single
    /// resolution of the current caller.
    #[must_use]
    pub fn prepare(&self, operation: OperationId, arguments: Vec<Value>) -> Invocation {
        let metadata = self.registry.lookup(&operation);
        let caller = self.caller.current_user();
        Invocation::new(operation, metadata, caller, arguments, self.clock.now())
    }

    /// Invoke `operation` and return its value.
    ///
    /// # Errors
    ///
    /// Returns whatever [`InvocationError`] a stage or the operation raised.
    pub fn invoke(
        &self,
        operation: OperationId,
        arguments: Vec<Value>,
    ) -> impl Future<Output = Result<Value, InvocationError>> + Send + 'static {
        let fut = self.invoke_detailed(operation, arguments);
        async move { fut.await.map(|response| response.value) }
    }

    /// Like [`Self::invoke`], but reports whether the value came from the cache.
    ///
    /// # Errors
    ///
    /// Returns whatever [`InvocationError`] a stage or the operation raised.
    pub fn invoke_detailed(
        &self,
        operation: OperationId,
        arguments: Vec<Value>,
    ) -> impl Future<Output = Result<InvocationResponse, InvocationError>> + Send + 'static {
        let invocation = self.prepare(operation, arguments);
        let span = info_span!(
            "invocation",
            operation = %invocation.operation,
            invocation_id = %invocation.id,
            caller = %invocation.caller.id,
        );
        debug!(parent: &span, signature = %invocation.signature(), "dispatching");
        self.pipeline.clone().oneshot(invocation).instrument(span)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
