//! # Invocation gate.
//!
//! A monotonically increasing counter stamped on every execution. A completion
//! may touch observable state only while its stamp is still the live value;
//! `run` and `cancel` advance the counter, which retroactively turns every
//! older in-flight execution into a no-op.
//!
//! ```text
//! run(a)  → stamp 2 ─────────────────────► settles: 2 != 3 → discarded
//! run(b)  →      stamp 3 ──────► settles: 3 == 3 → honored
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

/// Staleness detector for in-flight executions.
#[derive(Debug)]
pub struct InvocationGate {
    counter: AtomicU64,
}

impl InvocationGate {
    /// Creates a gate starting at 1.
    pub fn new() -> Self {
        Self {
            counter: AtomicU64::new(1),
        }
    }

    /// Invalidates every outstanding stamp and returns the new one.
    #[inline]
    pub fn advance(&self) -> u64 {
        self.counter.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Returns the live stamp without advancing.
    #[inline]
    pub fn current(&self) -> u64 {
        self.counter.load(Ordering::Acquire)
    }

    /// True if `stamp` is still the live stamp.
    #[inline]
    pub fn matches(&self, stamp: u64) -> bool {
        self.current() == stamp
    }
}

impl Default for InvocationGate {
    fn default() -> Self {
        Self::new()
    }
}
