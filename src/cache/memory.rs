//! # In-memory TTL cache.
//!
//! [`MemoryCache`] is type-erased so a single process-wide instance can hold
//! results of different types; each key is read back as the type it was
//! written with.
//!
//! ## Rules
//! - Expired entries are dropped lazily on read (or by [`MemoryCache::purge_expired`])
//! - Reading a key as a different type than it was written is a [`RequestError::Cache`]
//! - Expiry uses `tokio::time::Instant`, so paused-clock tests see it
//! - A TTL too large for an `Instant` never expires

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

use super::CacheStore;
use crate::error::RequestError;

static GLOBAL: LazyLock<Arc<MemoryCache>> = LazyLock::new(|| Arc::new(MemoryCache::new()));

struct StoredEntry {
    value: Box<dyn Any + Send + Sync>,
    expires_at: Option<Instant>,
}

impl StoredEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Process-local TTL store.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, StoredEntry>>,
}

impl MemoryCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide cache used by orchestrators built without an explicit store.
    pub fn global() -> Arc<Self> {
        Arc::clone(&GLOBAL)
    }

    /// Removes `key`; returns whether an entry existed.
    pub fn remove(&self, key: &str) -> bool {
        self.entries.lock().remove(key).is_some()
    }

    /// Drops every expired entry; returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, e| !e.is_expired(now));
        before - entries.len()
    }

    /// Number of stored entries (expired ones included until purged).
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// True if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl<R> CacheStore<R> for MemoryCache
where
    R: Clone + Send + Sync + 'static,
{
    fn get(&self, key: &str) -> Result<Option<R>, RequestError> {
        let mut entries = self.entries.lock();
        let Some(entry) = entries.get(key) else {
            return Ok(None);
        };
        if entry.is_expired(Instant::now()) {
            entries.remove(key);
            return Ok(None);
        }
        match entry.value.downcast_ref::<R>() {
            Some(value) => Ok(Some(value.clone())),
            None => Err(RequestError::Cache {
                key: key.to_string(),
                error: format!("entry is not a {}", std::any::type_name::<R>()),
            }),
        }
    }

    fn set(&self, key: &str, value: R, ttl: Duration) -> Result<(), RequestError> {
        let entry = StoredEntry {
            value: Box::new(value),
            expires_at: Instant::now().checked_add(ttl),
        };
        self.entries.lock().insert(key.to_string(), entry);
        Ok(())
    }
}
