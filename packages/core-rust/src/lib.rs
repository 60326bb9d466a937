//! Cutpoint Core: operation identity, values, caller identity, concern markers,
//! and the operation metadata registry.

pub mod clock;
pub mod context;
pub mod metadata;
pub mod operation;
pub mod types;

pub use clock::{ClockSource, ManualClock, SystemClock};
pub use context::{Principal, Role};
pub use metadata::{
    CachePolicy, ConfigurationError, Marker, MetadataManifest, MetadataRegistry,
    MetadataRegistryBuilder, OperationDeclaration, OperationMetadata, TransactionPolicy,
};
pub use operation::OperationId;
pub use types::Value;
