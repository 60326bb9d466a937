//! Interceptor pipeline and operation execution.
//!
//! 1. **Dispatch** (`dispatcher`): operation id + arguments -> `Invocation`
//! 2. **Middleware** (`middleware`): Tower layers (logging, authorization, caching, transaction)
//! 3. **Routing** (`router`): Dispatch to the registered `OperationHandler`
//! 4. **Domain** (`domain`): Sample business operations wired through the pipeline

pub mod config;
pub mod dispatcher;
pub mod domain;
pub mod invocation;
pub mod middleware;
pub mod router;

// Re-export key types for convenient access.
pub use config::PipelineConfig;
pub use dispatcher::Dispatcher;
pub use invocation::{
    Invocation, InvocationError, InvocationFuture, InvocationResponse, ResponseOrigin,
    ARGUMENT_SEPARATOR,
};
pub use middleware::pipeline::InterceptorPipeline;
pub use middleware::{build_interceptor_pipeline, PipelineDeps};
pub use router::{handler_fn, HandlerFn, OperationHandler, OperationRouter};
