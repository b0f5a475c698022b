use std::time::Duration;

use crate::error::RequestError;

/// Key-value store with per-entry TTL.
///
/// Failures are reported as [`RequestError::Cache`] and travel through the
/// request's normal rejection path.
pub trait CacheStore<R>: Send + Sync + 'static {
    /// Returns the live entry for `key`, if any.
    fn get(&self, key: &str) -> Result<Option<R>, RequestError>;

    /// Stores `value` under `key` for `ttl`. Last write wins.
    fn set(&self, key: &str, value: R, ttl: Duration) -> Result<(), RequestError>;
}
