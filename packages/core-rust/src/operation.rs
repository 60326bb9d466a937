//! Operation identity: the stable key naming which business method a call targets.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity of a business operation: the owning service plus the method name.
///
/// Used for metadata lookup, handler routing, and cache-key construction.
/// Displays as `service.method`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OperationId {
    /// Name of the service (interface) exposing the operation, e.g. `"Wallet"`.
    pub service: String,
    /// Name of the method, e.g. `"withdraw"`.
    pub method: String,
}

impl OperationId {
    #[must_use]
    pub fn new(service: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            method: method.into(),
        }
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.service, self.method)
    }
}
