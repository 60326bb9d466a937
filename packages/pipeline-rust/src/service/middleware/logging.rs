//! Parameter-logging stage.
//!
//! For operations marked `LogParameters`, writes one [`InvocationRecord`]
//! before delegating. The record never affects the outcome of the call.

use std::sync::Arc;
use std::task::{Context, Poll};

use tower::{Layer, Service};
use tracing::warn;

use crate::service::invocation::{Invocation, InvocationError, InvocationFuture, InvocationResponse};
use crate::traits::{InvocationLog, InvocationRecord};

// ---------------------------------------------------------------------------
// LoggingLayer
// ---------------------------------------------------------------------------

/// Tower layer that writes parameter-log records to an [`InvocationLog`].
#[derive(Clone)]
pub struct LoggingLayer {
    sink: Arc<dyn InvocationLog>,
}

impl LoggingLayer {
    #[must_use]
    pub fn new(sink: Arc<dyn InvocationLog>) -> Self {
        Self { sink }
    }
}

impl<S> Layer<S> for LoggingLayer {
    type Service = LoggingService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        LoggingService {
            inner,
            sink: Arc::clone(&self.sink),
        }
    }
}

// ---------------------------------------------------------------------------
// LoggingService
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct LoggingService<S> {
    inner: S,
    sink: Arc<dyn InvocationLog>,
}

impl<S> Service<Invocation> for LoggingService<S>
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
        if invocation.metadata.log_parameters {
            let record = InvocationRecord {
                invocation_id: invocation.id,
                caller_id: invocation.caller.id.clone(),
                operation: invocation.operation.clone(),
                arguments: invocation.rendered_arguments(),
                timestamp_ms: invocation.started_at_ms,
            };
            if let Err(e) = self.sink.record(&record) {
                warn!(
                    operation = %record.operation,
                    invocation_id = %record.invocation_id,
                    error = %e,
                    "failed to write parameter log"
                );
            }
        }
        Box::pin(self.inner.call(invocation))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
