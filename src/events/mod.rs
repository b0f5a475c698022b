//! Orchestrator events: types and broadcast bus.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `Orchestrator` (when built `with_bus`), `SubscriberSet` workers.
//! - **Consumers**: `SubscriberSet::listen` (fans out to user subscribers).

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
