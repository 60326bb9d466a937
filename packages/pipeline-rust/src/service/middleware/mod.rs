//! Tower layers implementing the interceptor stages.
//!
//! - [`logging`]: Parameter logging for operations marked `LogParameters`
//! - [`authorization`]: Role checks for operations marked `Authorized`
//! - [`caching`]: Result caching for operations marked `CacheResult`
//! - [`transaction`]: Commit/release and abort notification for `Transaction`
//! - [`pipeline`]: Composes all stages into a single service stack

pub mod authorization;
pub mod caching;
pub mod logging;
pub mod pipeline;
pub mod transaction;

pub use authorization::AuthorizationLayer;
pub use caching::CachingLayer;
pub use logging::LoggingLayer;
pub use pipeline::{build_interceptor_pipeline, PipelineDeps};
pub use transaction::TransactionLayer;
