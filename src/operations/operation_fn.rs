//! # Closure-backed operation (`OperationFn`)
//!
//! [`OperationFn`] wraps a closure `F: Fn(A) -> Fut`, producing a fresh future
//! per call. Shared state, if any, belongs inside the closure behind an `Arc`.
//!
//! ## Example
//! ```rust
//! use reqvisor::{OperationFn, OperationRef, RequestError};
//!
//! let op: OperationRef<u32, u32> = OperationFn::arc("double", |n: u32| async move {
//!     Ok::<_, RequestError>(n * 2)
//! });
//!
//! assert_eq!(op.name(), "double");
//! ```

use std::borrow::Cow;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::RequestError;
use crate::operations::operation::Operation;

/// Closure-backed operation.
#[derive(Debug)]
pub struct OperationFn<F> {
    name: Cow<'static, str>,
    f: F,
}

impl<F> OperationFn<F> {
    /// Creates a new closure-backed operation.
    ///
    /// Prefer [`OperationFn::arc`] when you immediately need an [`OperationRef`](crate::OperationRef).
    pub fn new(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }

    /// Creates the operation and returns it behind an `Arc`.
    pub fn arc(name: impl Into<Cow<'static, str>>, f: F) -> Arc<Self> {
        Arc::new(Self::new(name, f))
    }
}

#[async_trait]
impl<A, R, F, Fut> Operation<A, R> for OperationFn<F>
where
    A: Send + 'static,
    R: Send + 'static,
    F: Fn(A) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, RequestError>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn call(&self, args: A) -> Result<R, RequestError> {
        (self.f)(args).await
    }
}
