//! # reqvisor
//!
//! **Reqvisor** is the request-orchestration core behind reactive data hooks.
//!
//! It wraps an asynchronous operation and decides, for every call, whether the
//! operation actually runs and which results are allowed through: only the
//! latest call delivers, concurrent callers of the same key share one
//! in-flight request, warm cache entries short-circuit, and calls can be
//! debounced, throttled, polled or refreshed on window focus.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   Orchestrator A        Orchestrator B        Orchestrator C
//!   (key "users")         (key "users")         (no key)
//!        │                     │                     │
//!        │   run / refresh / poll / focus            │
//!        ▼                     ▼                     ▼
//!   RateAdapter           RateAdapter           RateAdapter     (debounce/throttle, optional)
//!        │                     │                     │
//!        ▼                     ▼                     ▼
//!   InvocationGate stamp  InvocationGate stamp  InvocationGate stamp
//!        │                     │                     │
//!        ▼                     ▼                     │
//! ┌─────────────────────────────────────────┐        │
//! │ CacheStore: persisted read, result write│        │
//! └──────────────────┬──────────────────────┘        │
//!                    ▼                               ▼
//! ┌─────────────────────────────────────────┐  ┌──────────────┐
//! │ SharedRegistry: one in-flight per key   │  │ private task │
//! │   A starts "users", B joins it          │  └──────┬───────┘
//! └──────────────────┬──────────────────────┘         │
//!                    ▼ settlement                      ▼
//!   stamp still live? ── no ──► silently discarded
//!                    │ yes
//!                    ▼
//!   format ─► cache write ─► on_success / on_error ─► on_finally ─► next poll
//! ```
//!
//! ### Events
//! ```text
//! Orchestrator ── Event ──► Bus (broadcast) ──► SubscriberSet ──► LogWriter / custom
//! ```
//!
//! ## Features
//! | Area              | Description                                                    | Key types / traits                          |
//! |-------------------|----------------------------------------------------------------|---------------------------------------------|
//! | **Orchestration** | Run, refresh, cancel, destroy/resume, live option updates.     | [`Orchestrator`], [`OrchestratorBuilder`]   |
//! | **Operations**    | The async work being orchestrated.                             | [`Operation`], [`OperationFn`]              |
//! | **Sharing**       | One in-flight request per key across orchestrators.           | [`SharedRegistry`]                          |
//! | **Caching**       | Persisted results with TTL.                                    | [`CacheStore`], [`MemoryCache`]             |
//! | **Rate limits**   | Debounce, throttle and focus limiting.                         | [`RatePolicy`], [`Debounced`], [`Throttled`]|
//! | **Page signals**  | Visibility-aware polling and focus refresh.                    | [`VisibilitySource`], [`FocusSource`], [`Page`] |
//! | **Subscriber API**| Hook into request lifecycle events.                            | [`Subscribe`], [`Event`]                    |
//! | **Errors**        | Typed errors for operations and collaborators.                 | [`RequestError`]                            |
//!
//! ## Optional features
//! - `logging` (default): exports the tracing-backed [`LogWriter`] subscriber.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use reqvisor::{OperationFn, OperationRef, Options, Orchestrator, RequestError, SharedRegistry};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), RequestError> {
//!     let double: OperationRef<u32, u32> = OperationFn::arc("double", |n: u32| async move {
//!         Ok::<_, RequestError>(n * 2)
//!     });
//!
//!     let options = Options::default()
//!         .with_cache_key("doubled")
//!         .with_cache_time(Duration::from_secs(30))
//!         .with_on_success(|value: &u32, n: &u32| println!("{n} doubled is {value}"));
//!
//!     let orchestrator = Orchestrator::builder(double)
//!         .with_options(options)
//!         .with_registry(SharedRegistry::new())
//!         .build();
//!
//!     assert_eq!(orchestrator.run(5).await?, Some(10));
//!     Ok(())
//! }
//! ```
mod cache;
mod core;
mod error;
mod events;
mod operations;
mod options;
mod policies;
mod sources;
mod subscribers;

// ---- Public re-exports ----

pub use cache::{CacheStore, MemoryCache};
pub use crate::core::{
    FlightOrigin, InFlight, InvocationGate, Orchestrator, OrchestratorBuilder, RunFuture,
    Settlement, SharedRegistry,
};
pub use error::RequestError;
pub use events::{Bus, Event, EventKind};
pub use operations::{Operation, OperationFn, OperationRef};
pub use options::{
    BeforeHook, DEFAULT_CACHE_TIME, DEFAULT_FOCUS_TIMESPAN, ErrorHook, FinallyHook, Formatter,
    Options, RatePolicy, SuccessHook,
};
pub use policies::{Debounced, Limited, RateAdapter, Sink, Throttled};
pub use sources::{FocusSource, Listener, Page, Subscription, VisibilitySource};
pub use subscribers::{Subscribe, SubscriberSet};

// Optional: expose the tracing-backed logger subscriber.
// Enable with: `--features logging` (on by default)
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
