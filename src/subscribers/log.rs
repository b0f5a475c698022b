//! # LogWriter: structured event logging
//!
//! A subscriber that turns [`Event`]s into `tracing` records. Install any
//! `tracing` subscriber (e.g. `tracing-subscriber`) to see them.
//!
//! ## Example output (fmt layer)
//! ```text
//! DEBUG reqvisor: request.starting request="users" key="users:list" stamp=2
//! DEBUG reqvisor: request.shared_joined request="users" key="users:list" stamp=2
//!  INFO reqvisor: request.succeeded request="users" key="users:list" stamp=2
//! DEBUG reqvisor: request.poll_scheduled request="users" stamp=2 delay_ms=5000
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let request = e.request.as_deref().unwrap_or("-");
        let key = e.key.as_deref().unwrap_or("-");
        match e.kind {
            EventKind::RequestStarting => {
                tracing::debug!(target: "reqvisor", request, key, stamp = ?e.stamp, "request.starting");
            }
            EventKind::CacheHit => {
                tracing::debug!(target: "reqvisor", request, key, stamp = ?e.stamp, "request.cache_hit");
            }
            EventKind::SharedStarted => {
                tracing::trace!(target: "reqvisor", request, key, stamp = ?e.stamp, "request.shared_started");
            }
            EventKind::SharedJoined => {
                tracing::debug!(target: "reqvisor", request, key, stamp = ?e.stamp, "request.shared_joined");
            }
            EventKind::RequestSucceeded => {
                tracing::info!(target: "reqvisor", request, key, stamp = ?e.stamp, "request.succeeded");
            }
            EventKind::RequestFailed => {
                tracing::warn!(
                    target: "reqvisor",
                    request,
                    key,
                    stamp = ?e.stamp,
                    reason = e.reason.as_deref().unwrap_or("unknown"),
                    "request.failed"
                );
            }
            EventKind::PollScheduled => {
                tracing::debug!(target: "reqvisor", request, stamp = ?e.stamp, delay_ms = ?e.delay_ms, "request.poll_scheduled");
            }
            EventKind::PollDeferred => {
                tracing::debug!(target: "reqvisor", request, stamp = ?e.stamp, "request.poll_deferred");
            }
            EventKind::PollResumed => {
                tracing::debug!(target: "reqvisor", request, "request.poll_resumed");
            }
            EventKind::FocusRefresh => {
                tracing::debug!(target: "reqvisor", request, "request.focus_refresh");
            }
            EventKind::Cancelled => {
                tracing::debug!(target: "reqvisor", request, stamp = ?e.stamp, "request.cancelled");
            }
            EventKind::AdaptersRebuilt => {
                tracing::debug!(target: "reqvisor", request, delay_ms = ?e.delay_ms, "request.adapters_rebuilt");
            }
            EventKind::Destroyed => {
                tracing::debug!(target: "reqvisor", request, "request.destroyed");
            }
            EventKind::Resumed => {
                tracing::debug!(target: "reqvisor", request, "request.resumed");
            }
            EventKind::SubscriberOverflow => {
                tracing::warn!(
                    target: "reqvisor",
                    subscriber = request,
                    reason = e.reason.as_deref().unwrap_or("unknown"),
                    "subscriber.overflow"
                );
            }
            EventKind::SubscriberPanicked => {
                tracing::warn!(
                    target: "reqvisor",
                    subscriber = request,
                    info = e.reason.as_deref().unwrap_or("unknown"),
                    "subscriber.panicked"
                );
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
