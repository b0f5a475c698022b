//! # Operation abstraction.
//!
//! An [`Operation`] is the externally supplied unit of work (usually a network
//! call). The orchestrator never performs I/O itself; it decides *when* and
//! *whether* to call the operation and what to do with the result.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::RequestError;

/// Shared handle to an operation.
pub type OperationRef<A, R> = Arc<dyn Operation<A, R>>;

/// # Asynchronous request operation.
///
/// `call` is invoked at most once per underlying execution; deduplicated
/// callers never reach it. Operations are not aborted on cancellation: a
/// superseded call runs to completion and its result is discarded.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use reqvisor::{Operation, RequestError};
///
/// struct Double;
///
/// #[async_trait]
/// impl Operation<u32, u32> for Double {
///     fn name(&self) -> &str { "double" }
///
///     async fn call(&self, n: u32) -> Result<u32, RequestError> {
///         Ok(n * 2)
///     }
/// }
/// ```
#[async_trait]
pub trait Operation<A, R>: Send + Sync + 'static
where
    A: Send + 'static,
    R: Send + 'static,
{
    /// Returns a stable, human-readable operation name (used in events).
    fn name(&self) -> &str;

    /// Performs one execution with the given arguments.
    async fn call(&self, args: A) -> Result<R, RequestError>;
}
