//! Rate policies applied around request execution.
//!
//! This module groups the knobs that control **how often** an orchestrator is
//! allowed to reach its operation.
//!
//! ## Contents
//! - [`Debounced`] collapse bursts into one trailing call
//! - [`Throttled`] at most one call per window (leading + trailing)
//! - [`Limited`]   leading-only limit used for focus refreshes
//! - [`RateAdapter`] the debounce/throttle wrapper chosen by [`RatePolicy`](crate::RatePolicy)
//!
//! ## Quick wiring
//! ```text
//! Options { debounce_interval, throttle_interval }
//!      └─► RatePolicy ─► RateAdapter::build(policy, executor)
//!           └─► Orchestrator::run(args) ─► adapter.call(args) ─► executor(args)
//! ```

mod adapter;
mod debounce;
mod limit;
mod throttle;

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

pub use adapter::RateAdapter;
pub use debounce::Debounced;
pub use limit::Limited;
pub use throttle::Throttled;

/// Target invoked by a rate adapter once a call is let through.
pub type Sink<A> = Arc<dyn Fn(A) + Send + Sync>;

/// About 30 years; stands in for deadlines an `Instant` cannot represent.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// `from + delay`, saturating to a far-future deadline instead of overflowing.
pub(crate) fn deadline_after(from: Instant, delay: Duration) -> Instant {
    from.checked_add(delay)
        .or_else(|| from.checked_add(FAR_FUTURE))
        .unwrap_or(from)
}
