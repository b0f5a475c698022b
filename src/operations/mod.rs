//! # Operations: the asynchronous work an orchestrator manages.
//!
//! - [`Operation`] - trait for an async operation taking arguments `A` and producing `R`
//! - [`OperationFn`] - closure-backed implementation
//! - [`OperationRef`] - shared reference to an operation (`Arc<dyn Operation<A, R>>`)

mod operation;
mod operation_fn;

pub use operation::{Operation, OperationRef};
pub use operation_fn::OperationFn;
