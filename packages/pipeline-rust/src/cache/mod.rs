//! Result cache used by the caching stage.
//!
//! - [`key`]: Structure-preserving cache keys
//! - [`store`]: The [`CacheStore`] trait
//! - [`memory`]: `DashMap`-backed store with per-entry expiry
//! - [`sweeper`]: Background task purging expired entries

pub mod key;
pub mod memory;
pub mod store;
pub mod sweeper;

pub use key::CacheKey;
pub use memory::InMemoryCacheStore;
pub use store::CacheStore;
pub use sweeper::{CacheSweeper, SweepTask};
