//! # Trailing-edge debounce.
//!
//! Every [`Debounced::call`] restarts the quiet timer; when `wait` elapses with no
//! further calls, the target runs once with the **last** arguments.
//!
//! ```text
//! call(1) call(2) call(3)
//!   │       │       │◄──────── wait ────────►│
//!   └───────┴───────┴────────────────────────┴─► target(3)
//! ```
//!
//! Each timer is a tokio task racing `sleep(wait)` against its own
//! [`CancellationToken`]; a generation number guards against a timer that lost
//! the race with a newer call.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::select;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

use super::{Sink, deadline_after};

struct DebounceState<A> {
    pending: Option<A>,
    generation: u64,
    timer: Option<CancellationToken>,
}

struct DebounceInner<A> {
    wait: Duration,
    target: Sink<A>,
    runtime: Handle,
    state: Mutex<DebounceState<A>>,
}

/// Debounced wrapper around a target.
pub struct Debounced<A> {
    inner: Arc<DebounceInner<A>>,
}

impl<A> Clone for Debounced<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A: Send + 'static> Debounced<A> {
    /// Wraps `target`; timers are spawned on `runtime`.
    pub fn new(wait: Duration, target: Sink<A>, runtime: Handle) -> Self {
        Self {
            inner: Arc::new(DebounceInner {
                wait,
                target,
                runtime,
                state: Mutex::new(DebounceState {
                    pending: None,
                    generation: 0,
                    timer: None,
                }),
            }),
        }
    }

    /// Configured quiet period.
    pub fn wait(&self) -> Duration {
        self.inner.wait
    }

    /// Records `args` and restarts the quiet timer.
    pub fn call(&self, args: A) {
        let token = CancellationToken::new();
        let deadline = deadline_after(Instant::now(), self.inner.wait);
        let generation = {
            let mut state = self.inner.state.lock();
            state.pending = Some(args);
            state.generation += 1;
            if let Some(old) = state.timer.replace(token.clone()) {
                old.cancel();
            }
            state.generation
        };

        let inner = Arc::clone(&self.inner);
        self.inner.runtime.spawn(async move {
            let sleep = time::sleep_until(deadline);
            tokio::pin!(sleep);
            select! {
                _ = &mut sleep => inner.fire(generation),
                _ = token.cancelled() => {}
            }
        });
    }

    /// Drops the pending call, if any.
    pub fn cancel(&self) {
        let mut state = self.inner.state.lock();
        state.pending = None;
        state.generation += 1;
        if let Some(timer) = state.timer.take() {
            timer.cancel();
        }
    }

    /// Runs the pending call now instead of waiting; returns whether one ran.
    pub fn flush(&self) -> bool {
        let pending = {
            let mut state = self.inner.state.lock();
            state.generation += 1;
            if let Some(timer) = state.timer.take() {
                timer.cancel();
            }
            state.pending.take()
        };
        match pending {
            Some(args) => {
                (self.inner.target)(args);
                true
            }
            None => false,
        }
    }

    /// True while a call is waiting for the quiet period.
    pub fn is_pending(&self) -> bool {
        self.inner.state.lock().pending.is_some()
    }
}

impl<A> DebounceInner<A> {
    fn fire(&self, generation: u64) {
        let pending = {
            let mut state = self.state.lock();
            if state.generation != generation {
                return;
            }
            state.timer = None;
            state.pending.take()
        };
        if let Some(args) = pending {
            (self.target)(args);
        }
    }
}
