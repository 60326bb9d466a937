//! In-memory [`CacheStore`] backed by [`DashMap`].
//!
//! Provides concurrent read/write access without external locking. Expired
//! entries are removed lazily on read and in bulk by [`CacheStore::purge_expired`].

use std::sync::Arc;
use std::time::Duration;

use cutpoint_core::{ClockSource, SystemClock, Value};
use dashmap::DashMap;

use super::key::CacheKey;
use super::store::CacheStore;

/// A cached value and the instant it stops being visible.
#[derive(Debug, Clone)]
struct CacheEntry {
    value: Value,
    /// Milliseconds since Unix epoch. Visible while `now < expires_at_ms`.
    expires_at_ms: u64,
}

impl CacheEntry {
    fn is_live(&self, now: u64) -> bool {
        now < self.expires_at_ms
    }
}

/// Process-local cache store. Entries do not survive a restart.
pub struct InMemoryCacheStore {
    entries: DashMap<CacheKey, CacheEntry>,
    clock: Arc<dyn ClockSource>,
}

impl InMemoryCacheStore {
    /// Creates an empty store reading time from the system clock.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Creates an empty store reading time from `clock`.
    #[must_use]
    pub fn with_clock(clock: Arc<dyn ClockSource>) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
        }
    }
}

impl Default for InMemoryCacheStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheStore for InMemoryCacheStore {
    fn get(&self, key: &CacheKey) -> Option<Value> {
        let now = self.clock.now();
        {
            // The shard read guard must be gone before `remove_if` below.
            let entry = self.entries.get(key)?;
            if entry.is_live(now) {
                return Some(entry.value.clone());
            }
        }
        self.entries.remove_if(key, |_, entry| !entry.is_live(now));
        None
    }

    fn put(&self, key: CacheKey, value: Value, ttl: Duration) {
        let ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
        let expires_at_ms = self.clock.now().saturating_add(ttl_ms);
        self.entries.insert(
            key,
            CacheEntry {
                value,
                expires_at_ms,
            },
        );
    }

    fn remove(&self, key: &CacheKey) -> Option<Value> {
        let now = self.clock.now();
        self.entries
            .remove(key)
            .and_then(|(_, entry)| entry.is_live(now).then_some(entry.value))
    }

    fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut purged = 0;
        self.entries.retain(|_, entry| {
            let live = entry.is_live(now);
            if !live {
                purged += 1;
            }
            live
        });
        purged
    }

    fn clear(&self) {
        self.entries.clear();
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}
