//! # Rate adapter selection.
//!
//! [`RateAdapter`] is what an orchestrator routes `run` through when its
//! [`RatePolicy`] is not `Immediate`. It is rebuilt from scratch whenever the
//! debounce/throttle interval changes.

use tokio::runtime::Handle;

use super::{Debounced, Sink, Throttled};
use crate::options::RatePolicy;

/// Debounce or throttle wrapper around the executor.
pub enum RateAdapter<A> {
    /// Trailing-edge debounce.
    Debounce(Debounced<A>),
    /// Leading + trailing throttle.
    Throttle(Throttled<A>),
}

impl<A> Clone for RateAdapter<A> {
    fn clone(&self) -> Self {
        match self {
            RateAdapter::Debounce(d) => RateAdapter::Debounce(d.clone()),
            RateAdapter::Throttle(t) => RateAdapter::Throttle(t.clone()),
        }
    }
}

impl<A: Send + 'static> RateAdapter<A> {
    /// Builds the adapter `policy` asks for; `None` for [`RatePolicy::Immediate`].
    pub fn build(policy: RatePolicy, target: Sink<A>, runtime: Handle) -> Option<Self> {
        match policy {
            RatePolicy::Immediate => None,
            RatePolicy::Debounce(wait) => {
                Some(RateAdapter::Debounce(Debounced::new(wait, target, runtime)))
            }
            RatePolicy::Throttle(wait) => {
                Some(RateAdapter::Throttle(Throttled::new(wait, target, runtime)))
            }
        }
    }

    /// Forwards one call.
    pub fn call(&self, args: A) {
        match self {
            RateAdapter::Debounce(d) => d.call(args),
            RateAdapter::Throttle(t) => t.call(args),
        }
    }

    /// Drops any pending call.
    pub fn cancel(&self) {
        match self {
            RateAdapter::Debounce(d) => d.cancel(),
            RateAdapter::Throttle(t) => t.cancel(),
        }
    }

    /// Runs any pending call now.
    pub fn flush(&self) -> bool {
        match self {
            RateAdapter::Debounce(d) => d.flush(),
            RateAdapter::Throttle(t) => t.flush(),
        }
    }

    /// True while a call is waiting.
    pub fn is_pending(&self) -> bool {
        match self {
            RateAdapter::Debounce(d) => d.is_pending(),
            RateAdapter::Throttle(t) => t.is_pending(),
        }
    }

    /// The policy this adapter implements.
    pub fn policy(&self) -> RatePolicy {
        match self {
            RateAdapter::Debounce(d) => RatePolicy::Debounce(d.wait()),
            RateAdapter::Throttle(t) => RatePolicy::Throttle(t.wait()),
        }
    }
}
