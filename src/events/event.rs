//! # Request lifecycle events.
//!
//! The [`EventKind`] enum classifies what an orchestrator did:
//! - **Execution events**: an execution started, hit the cache, started or joined a
//!   shared request, succeeded or failed
//! - **Scheduling events**: polling armed, deferred or resumed; focus refresh
//! - **Lifecycle events**: cancel, adapter rebuild, destroy, resume
//! - **Subscriber events**: overflow or panic inside a subscriber worker
//!
//! Superseded results produce no event at all.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use reqvisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::PollScheduled)
//!     .with_request("users")
//!     .with_key("users:list")
//!     .with_stamp(3)
//!     .with_delay(Duration::from_secs(5));
//!
//! assert_eq!(ev.kind, EventKind::PollScheduled);
//! assert_eq!(ev.key.as_deref(), Some("users:list"));
//! assert_eq!(ev.delay_ms, Some(5000));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of orchestrator events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Execution ===
    /// An execution began (`on_before` is about to run).
    ///
    /// Sets: `request`, `key`, `stamp`
    RequestStarting,

    /// A warm persisted entry answered the execution.
    ///
    /// Sets: `request`, `key`, `stamp`
    CacheHit,

    /// This execution started the shared request for its key.
    ///
    /// Sets: `request`, `key`, `stamp`
    SharedStarted,

    /// This execution attached to an already in-flight request.
    ///
    /// Sets: `request`, `key`, `stamp`
    SharedJoined,

    /// A current execution produced its (formatted) value.
    ///
    /// Sets: `request`, `key`, `stamp`
    RequestSucceeded,

    /// A current execution failed.
    ///
    /// Sets: `request`, `key`, `stamp`, `reason`
    RequestFailed,

    // === Scheduling ===
    /// Next polling run armed.
    ///
    /// Sets: `request`, `stamp`, `delay_ms`
    PollScheduled,

    /// Polling paused because the page is hidden.
    ///
    /// Sets: `request`, `stamp`
    PollDeferred,

    /// Page became visible again; deferred polling resumes with a refresh.
    ///
    /// Sets: `request`
    PollResumed,

    /// Window focus triggered a refresh.
    ///
    /// Sets: `request`
    FocusRefresh,

    // === Lifecycle ===
    /// `cancel()` invalidated in-flight work.
    ///
    /// Sets: `request`, `stamp` (the new stamp)
    Cancelled,

    /// Debounce/throttle wrappers were rebuilt.
    ///
    /// Sets: `request`, `delay_ms` (new interval, absent if disabled)
    AdaptersRebuilt,

    /// Subscriptions released.
    ///
    /// Sets: `request`
    Destroyed,

    /// Subscriptions re-established after destroy.
    ///
    /// Sets: `request`
    Resumed,

    // === Subscribers ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets: `request` (subscriber name), `reason`
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets: `request` (subscriber name), `reason`
    SubscriberOverflow,
}

/// Orchestrator event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,
    /// Operation (or subscriber) name.
    pub request: Option<Arc<str>>,
    /// Cache/shared key, if configured.
    pub key: Option<Arc<str>>,
    /// Invocation stamp the event belongs to.
    pub stamp: Option<u64>,
    /// Delay in milliseconds (compact).
    pub delay_ms: Option<u32>,
    /// Human-readable reason (errors, overflow details, etc.).
    pub reason: Option<Arc<str>>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            request: None,
            key: None,
            stamp: None,
            delay_ms: None,
            reason: None,
        }
    }

    /// Attaches the operation name.
    #[inline]
    pub fn with_request(mut self, request: impl Into<Arc<str>>) -> Self {
        self.request = Some(request.into());
        self
    }

    /// Attaches the cache key.
    #[inline]
    pub fn with_key(mut self, key: impl Into<Arc<str>>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Attaches the key when there is one.
    #[inline]
    pub fn with_key_opt(self, key: Option<&str>) -> Self {
        match key {
            Some(k) => self.with_key(k),
            None => self,
        }
    }

    /// Attaches an invocation stamp.
    #[inline]
    pub fn with_stamp(mut self, stamp: u64) -> Self {
        self.stamp = Some(stamp);
        self
    }

    /// Attaches a delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.delay_ms = Some(ms);
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_request(subscriber)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_request(subscriber)
            .with_reason(info)
    }

    #[inline]
    pub fn is_subscriber_event(&self) -> bool {
        matches!(
            self.kind,
            EventKind::SubscriberOverflow | EventKind::SubscriberPanicked
        )
    }
}
