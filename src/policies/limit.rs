//! # Leading-edge rate limit.
//!
//! [`Limited`] runs its callback on the first call and ignores further calls
//! until `interval` has passed since the last accepted one. Used for
//! focus-triggered refreshes, where a burst of focus events should cause one
//! refresh.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

/// Callback limited to one run per interval.
pub struct Limited {
    interval: Duration,
    last: Mutex<Option<Instant>>,
    f: Arc<dyn Fn() + Send + Sync>,
}

impl Limited {
    /// Wraps `f`.
    pub fn new(interval: Duration, f: impl Fn() + Send + Sync + 'static) -> Self {
        Self {
            interval,
            last: Mutex::new(None),
            f: Arc::new(f),
        }
    }

    /// Runs the callback unless one ran less than `interval` ago; returns whether it ran.
    pub fn call(&self) -> bool {
        let now = Instant::now();
        {
            let mut last = self.last.lock();
            if let Some(prev) = *last {
                if now.duration_since(prev) < self.interval {
                    return false;
                }
            }
            *last = Some(now);
        }
        (self.f)();
        true
    }
}

impl fmt::Debug for Limited {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Limited")
            .field("interval", &self.interval)
            .field("last", &*self.last.lock())
            .finish_non_exhaustive()
    }
}
