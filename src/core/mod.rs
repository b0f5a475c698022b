//! Runtime core: execution, sharing and lifecycle.
//!
//! The public API from this module is [`Orchestrator`] (with its
//! [`OrchestratorBuilder`]), plus the [`SharedRegistry`] that deduplicates
//! in-flight requests across orchestrators.
//!
//! Internal modules:
//! - [`gate`]: invocation stamps that turn superseded results into no-ops;
//! - [`registry`]: one in-flight request per shared key, joined by every caller;
//! - [`polling`]: the single cancellable re-run timer of an orchestrator;
//! - [`orchestrator`]: run/refresh/cancel/destroy/resume and settlement handling;
//! - [`builder`]: collaborator injection.

mod builder;
mod gate;
mod orchestrator;
mod polling;
mod registry;

#[cfg(test)]
mod tests;

pub use builder::OrchestratorBuilder;
pub use gate::InvocationGate;
pub use orchestrator::{Orchestrator, RunFuture};
pub use registry::{FlightOrigin, InFlight, Settlement, SharedRegistry};
