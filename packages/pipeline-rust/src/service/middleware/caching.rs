//! Result-caching stage.
//!
//! Operations marked `CacheResult` are answered from the [`CacheStore`] while
//! an unexpired entry exists for the same operation and arguments. On a miss
//! the call proceeds and a non-null result is stored for the declared TTL.

use std::sync::Arc;
use std::task::{Context, Poll};

use tower::{Layer, Service};
use tracing::debug;

use crate::cache::{CacheKey, CacheStore};
use crate::service::invocation::{Invocation, InvocationError, InvocationFuture, InvocationResponse};

// ---------------------------------------------------------------------------
// CachingLayer
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct CachingLayer {
    store: Arc<dyn CacheStore>,
}

impl CachingLayer {
    #[must_use]
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store }
    }
}

impl<S> Layer<S> for CachingLayer {
    type Service = CachingService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        CachingService {
            inner,
            store: Arc::clone(&self.store),
        }
    }
}

// ---------------------------------------------------------------------------
// CachingService
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct CachingService<S> {
    inner: S,
    store: Arc<dyn CacheStore>,
}

impl<S> Service<Invocation> for CachingService<S>
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
        let Some(policy) = invocation.metadata.cache else {
            return Box::pin(self.inner.call(invocation));
        };

        let key = CacheKey::for_invocation(&invocation.operation, &invocation.arguments);
        if let Some(value) = self.store.get(&key) {
            metrics::counter!("cutpoint_cache_hits_total").increment(1);
            debug!(operation = %invocation.operation, signature = %invocation.signature(), "cache hit");
            return Box::pin(async move { Ok(InvocationResponse::cached(value)) });
        }

        metrics::counter!("cutpoint_cache_misses_total").increment(1);
        debug!(operation = %invocation.operation, signature = %invocation.signature(), "cache miss");

        let store = Arc::clone(&self.store);
        let fut = self.inner.call(invocation);
        Box::pin(async move {
            let response = fut.await?;
            if !response.value.is_null() {
                store.put(key, response.value.clone(), policy.ttl());
            }
            Ok(response)
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
