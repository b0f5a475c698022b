//! # Leading + trailing throttle.
//!
//! The first call in a quiet period runs the target immediately and opens a
//! window of `wait`. Calls inside the window only record their arguments; when
//! the window closes, the last recorded call runs and a new window opens.
//!
//! ```text
//! call(1)  call(2) call(3)          call(4)
//!   │◄──────── wait ────────►│◄──────── wait ────────►│
//!   ▼                        ▼                        ▼
//! target(1)               target(3)                target(4)
//! ```

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::select;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

use super::{Sink, deadline_after};

struct ThrottleState<A> {
    pending: Option<A>,
    generation: u64,
    window: Option<CancellationToken>,
}

struct ThrottleInner<A> {
    wait: Duration,
    target: Sink<A>,
    runtime: Handle,
    state: Mutex<ThrottleState<A>>,
}

/// Throttled wrapper around a target.
pub struct Throttled<A> {
    inner: Arc<ThrottleInner<A>>,
}

impl<A> Clone for Throttled<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A: Send + 'static> Throttled<A> {
    /// Wraps `target`; windows are timed on `runtime`.
    pub fn new(wait: Duration, target: Sink<A>, runtime: Handle) -> Self {
        Self {
            inner: Arc::new(ThrottleInner {
                wait,
                target,
                runtime,
                state: Mutex::new(ThrottleState {
                    pending: None,
                    generation: 0,
                    window: None,
                }),
            }),
        }
    }

    /// Configured window length.
    pub fn wait(&self) -> Duration {
        self.inner.wait
    }

    /// Runs `args` now if no window is open, otherwise keeps it for the trailing edge.
    pub fn call(&self, args: A) {
        let leading = {
            let mut state = self.inner.state.lock();
            if state.window.is_some() {
                state.pending = Some(args);
                None
            } else {
                let token = CancellationToken::new();
                state.generation += 1;
                state.window = Some(token.clone());
                Some((args, token, state.generation))
            }
        };

        if let Some((args, token, generation)) = leading {
            Arc::clone(&self.inner).open_window(token, generation);
            (self.inner.target)(args);
        }
    }

    /// Drops the trailing call and closes the window.
    pub fn cancel(&self) {
        let mut state = self.inner.state.lock();
        state.pending = None;
        state.generation += 1;
        if let Some(window) = state.window.take() {
            window.cancel();
        }
    }

    /// Runs the trailing call now and closes the window; returns whether one ran.
    pub fn flush(&self) -> bool {
        let pending = {
            let mut state = self.inner.state.lock();
            state.generation += 1;
            if let Some(window) = state.window.take() {
                window.cancel();
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

    /// True while a trailing call is waiting for the window to close.
    pub fn is_pending(&self) -> bool {
        self.inner.state.lock().pending.is_some()
    }
}

impl<A: Send + 'static> ThrottleInner<A> {
    fn open_window(self: Arc<Self>, token: CancellationToken, generation: u64) {
        let runtime = self.runtime.clone();
        let mut deadline = deadline_after(Instant::now(), self.wait);
        runtime.spawn(async move {
            loop {
                let sleep = time::sleep_until(deadline);
                tokio::pin!(sleep);
                select! {
                    _ = &mut sleep => {}
                    _ = token.cancelled() => return,
                }

                let trailing = {
                    let mut state = self.state.lock();
                    if state.generation != generation {
                        return;
                    }
                    let trailing = state.pending.take();
                    if trailing.is_none() {
                        state.window = None;
                    }
                    trailing
                };

                match trailing {
                    Some(args) => {
                        (self.target)(args);
                        deadline = deadline_after(deadline, self.wait);
                    }
                    None => return,
                }
            }
        });
    }
}
