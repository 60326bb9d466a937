//! Concern markers and the process-wide operation metadata registry.
//!
//! Markers are declared per operation, folded into an [`OperationMetadata`]
//! and validated once when the [`MetadataRegistry`] is built. After that the
//! registry is immutable: the same [`OperationId`] always yields the same
//! metadata for the lifetime of the process.
//!
//! # Manifest format
//!
//! ```json
//! {
//!   "operations": [
//!     {
//!       "service": "Wallet",
//!       "method": "create_guid",
//!       "markers": [
//!         { "kind": "log_parameters" },
//!         { "kind": "cache_result", "duration_ms": 1000 }
//!       ]
//!     }
//!   ]
//! }
//! ```

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::context::Role;
use crate::operation::OperationId;

// ---------------------------------------------------------------------------
// Marker
// ---------------------------------------------------------------------------

/// A declared, queryable fact about an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Marker {
    /// Log caller, operation and arguments before the call.
    LogParameters,
    /// Permit callers acting under `role`. Repeatable; roles are unioned.
    Authorized { role: Role },
    /// Cache non-null results for `duration_ms`. At most one; must be positive.
    CacheResult { duration_ms: i64 },
    /// Run inside a transactional scope and notify `notify` on abort. At most one.
    Transaction { notify: Role },
}

// ---------------------------------------------------------------------------
// Policies
// ---------------------------------------------------------------------------

/// Validated caching policy. The TTL is always strictly positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    ttl: Duration,
}

impl CachePolicy {
    /// Builds a policy from a millisecond duration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::NonPositiveCacheDuration`] when
    /// `duration_ms <= 0`.
    pub fn from_millis(operation: &OperationId, duration_ms: i64) -> Result<Self, ConfigurationError> {
        match u64::try_from(duration_ms) {
            Ok(ms) if ms > 0 => Ok(Self {
                ttl: Duration::from_millis(ms),
            }),
            _ => Err(ConfigurationError::NonPositiveCacheDuration {
                operation: operation.clone(),
                duration_ms,
            }),
        }
    }

    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

/// Transactional execution policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionPolicy {
    /// Role notified when the transaction aborts.
    pub notify: Role,
}

// ---------------------------------------------------------------------------
// OperationMetadata
// ---------------------------------------------------------------------------

/// Folded view of all markers declared on one operation.
///
/// The default value carries no markers: every stage passes through.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperationMetadata {
    pub log_parameters: bool,
    /// Union of all `Authorized` roles. Empty means unrestricted.
    pub authorized_roles: BTreeSet<Role>,
    pub cache: Option<CachePolicy>,
    pub transaction: Option<TransactionPolicy>,
}

impl OperationMetadata {
    /// Folds and validates a marker list for `operation`.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigurationError`] for a non-positive cache duration or
    /// a repeated cache/transaction marker.
    pub fn from_markers(
        operation: &OperationId,
        markers: impl IntoIterator<Item = Marker>,
    ) -> Result<Self, ConfigurationError> {
        let mut metadata = Self::default();
        for marker in markers {
            match marker {
                Marker::LogParameters => metadata.log_parameters = true,
                Marker::Authorized { role } => {
                    metadata.authorized_roles.insert(role);
                }
                Marker::CacheResult { duration_ms } => {
                    if metadata.cache.is_some() {
                        return Err(ConfigurationError::DuplicateCacheMarker {
                            operation: operation.clone(),
                        });
                    }
                    metadata.cache = Some(CachePolicy::from_millis(operation, duration_ms)?);
                }
                Marker::Transaction { notify } => {
                    if metadata.transaction.is_some() {
                        return Err(ConfigurationError::DuplicateTransactionMarker {
                            operation: operation.clone(),
                        });
                    }
                    metadata.transaction = Some(TransactionPolicy { notify });
                }
            }
        }
        Ok(metadata)
    }

    /// Whether any `Authorized` marker restricts this operation.
    #[must_use]
    pub fn is_restricted(&self) -> bool {
        !self.authorized_roles.is_empty()
    }

    /// Whether a caller acting under `role` may invoke this operation.
    #[must_use]
    pub fn permits(&self, role: &Role) -> bool {
        !self.is_restricted() || self.authorized_roles.contains(role)
    }
}

// ---------------------------------------------------------------------------
// ConfigurationError
// ---------------------------------------------------------------------------

/// Errors raised while building the metadata registry. Never raised at call time.
#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    #[error("cache duration for {operation} must be positive, got {duration_ms}ms")]
    NonPositiveCacheDuration {
        operation: OperationId,
        duration_ms: i64,
    },
    #[error("{operation} declares more than one cache marker")]
    DuplicateCacheMarker { operation: OperationId },
    #[error("{operation} declares more than one transaction marker")]
    DuplicateTransactionMarker { operation: OperationId },
    #[error("{operation} is registered more than once")]
    DuplicateOperation { operation: OperationId },
    #[error("invalid metadata manifest: {0}")]
    InvalidManifest(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// Manifest
// ---------------------------------------------------------------------------

/// Serializable declaration of operation metadata, e.g. loaded from a file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetadataManifest {
    pub operations: Vec<OperationDeclaration>,
}

/// One operation and its markers within a [`MetadataManifest`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationDeclaration {
    pub service: String,
    pub method: String,
    #[serde(default)]
    pub markers: Vec<Marker>,
}

// ---------------------------------------------------------------------------
// MetadataRegistry
// ---------------------------------------------------------------------------

/// Immutable lookup table from operation identity to its metadata.
#[derive(Debug, Default)]
pub struct MetadataRegistry {
    entries: HashMap<OperationId, Arc<OperationMetadata>>,
    unmarked: Arc<OperationMetadata>,
}

impl MetadataRegistry {
    #[must_use]
    pub fn builder() -> MetadataRegistryBuilder {
        MetadataRegistryBuilder::default()
    }

    /// Builds a registry from a manifest.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigurationError`] found while validating.
    pub fn from_manifest(manifest: MetadataManifest) -> Result<Self, ConfigurationError> {
        manifest
            .operations
            .into_iter()
            .fold(Self::builder(), |builder, decl| {
                builder.operation(OperationId::new(decl.service, decl.method), decl.markers)
            })
            .build()
    }

    /// Parses a JSON manifest and builds a registry from it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::InvalidManifest`] for malformed JSON, or
    /// any validation error from [`Self::from_manifest`].
    pub fn from_json(json: &str) -> Result<Self, ConfigurationError> {
        let manifest: MetadataManifest = serde_json::from_str(json)?;
        Self::from_manifest(manifest)
    }

    /// Metadata for `operation`. Unregistered operations get empty metadata.
    #[must_use]
    pub fn lookup(&self, operation: &OperationId) -> Arc<OperationMetadata> {
        self.entries
            .get(operation)
            .map_or_else(|| Arc::clone(&self.unmarked), Arc::clone)
    }

    /// Metadata for `operation`, or `None` if it was never registered.
    #[must_use]
    pub fn get(&self, operation: &OperationId) -> Option<&OperationMetadata> {
        self.entries.get(operation).map(|m| m.as_ref())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Collects marker declarations; validation happens in [`Self::build`].
#[derive(Debug, Default)]
pub struct MetadataRegistryBuilder {
    declared: Vec<(OperationId, Vec<Marker>)>,
}

impl MetadataRegistryBuilder {
    /// Declares the markers of one operation.
    #[must_use]
    pub fn operation(mut self, operation: OperationId, markers: impl IntoIterator<Item = Marker>) -> Self {
        self.declared.push((operation, markers.into_iter().collect()));
        self
    }

    /// Validates every declaration and freezes the registry.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigurationError`] encountered, in declaration order.
    pub fn build(self) -> Result<MetadataRegistry, ConfigurationError> {
        let mut entries = HashMap::with_capacity(self.declared.len());
        for (operation, markers) in self.declared {
            if entries.contains_key(&operation) {
                return Err(ConfigurationError::DuplicateOperation { operation });
            }
            let metadata = OperationMetadata::from_markers(&operation, markers)?;
            entries.insert(operation, Arc::new(metadata));
        }
        debug!(operations = entries.len(), "metadata registry built");
        Ok(MetadataRegistry {
            entries,
            unmarked: Arc::new(OperationMetadata::default()),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
