//! # Persisted result cache.
//!
//! The orchestrator writes every current, formatted success under its cache key
//! and, when `persisted` is enabled, reads that slot before executing. Storage
//! and expiry belong to the store:
//! - [`CacheStore`] - the collaborator contract
//! - [`MemoryCache`] - in-process TTL store (the default)

mod memory;
mod store;

pub use memory::MemoryCache;
pub use store::CacheStore;
