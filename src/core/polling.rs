//! # Polling timer slot.
//!
//! Holds at most one armed timer per orchestrator. Arming replaces (and
//! cancels) the previous timer; clearing cancels it. The timer task races
//! its deadline against a [`CancellationToken`], so a cleared timer never
//! fires.

use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::select;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

use crate::policies::deadline_after;

/// Single-slot cancellable timer.
#[derive(Default)]
pub(crate) struct PollingTimer {
    slot: Mutex<Option<CancellationToken>>,
}

impl PollingTimer {
    /// Arms `fire` to run after `delay`, replacing any armed timer.
    pub(crate) fn arm(
        &self,
        runtime: &Handle,
        delay: Duration,
        fire: impl FnOnce() + Send + 'static,
    ) {
        let token = CancellationToken::new();
        if let Some(previous) = self.slot.lock().replace(token.clone()) {
            previous.cancel();
        }

        let deadline = deadline_after(Instant::now(), delay);
        runtime.spawn(async move {
            let sleep = time::sleep_until(deadline);
            tokio::pin!(sleep);
            select! {
                _ = &mut sleep => fire(),
                _ = token.cancelled() => {}
            }
        });
    }

    /// Cancels the armed timer; returns whether one was armed.
    pub(crate) fn clear(&self) -> bool {
        match self.slot.lock().take() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }
}
