//! Cache store trait.

use std::time::Duration;

use cutpoint_core::Value;

use super::key::CacheKey;

/// Key/value store with per-entry expiry.
///
/// An entry is visible to reads only while `now < expiry`; expired entries
/// behave as absent. All methods take `&self` and must be safe under
/// concurrent access, so the store can be shared as `Arc<dyn CacheStore>`.
pub trait CacheStore: Send + Sync + 'static {
    /// Returns the live value stored under `key`.
    fn get(&self, key: &CacheKey) -> Option<Value>;

    /// Stores `value` under `key`, expiring `ttl` from now.
    ///
    /// The caller validates `ttl` (the caching stage only passes positive
    /// TTLs from a `CachePolicy`). A zero TTL stores an entry that is never
    /// visible.
    fn put(&self, key: CacheKey, value: Value, ttl: Duration);

    /// Removes the entry under `key`, returning its value if it was still live.
    fn remove(&self, key: &CacheKey) -> Option<Value>;

    /// Drops every expired entry. Returns how many were removed.
    fn purge_expired(&self) -> usize;

    /// Drops every entry.
    fn clear(&self);

    /// Number of stored entries, including expired ones not yet purged.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
