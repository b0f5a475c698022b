//! Error types produced by requests and their collaborators.
//!
//! [`RequestError`] is the single error type flowing through the orchestrator:
//! it is returned from [`Operation::call`](crate::Operation::call), delivered to
//! `on_error` hooks and surfaced by the futures returned from
//! [`Orchestrator::run`](crate::Orchestrator::run).
//!
//! The type is `Clone` because one settlement of a shared in-flight request is
//! handed to every caller that joined it.

use std::fmt::Display;

use thiserror::Error;

/// # Errors produced while executing a request.
///
/// Only `Fail` is expected from user operations; the other variants come from
/// the machinery around them (cache store, background task, shared registry).
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    /// The underlying operation rejected.
    #[error("request failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// The persisted cache store failed to read or write an entry.
    #[error("cache `{key}` failed: {error}")]
    Cache {
        /// Cache key involved.
        key: String,
        /// Store-provided reason.
        error: String,
    },

    /// The background task driving the operation panicked or was torn down
    /// before it produced a result, or `format_result`/`on_success` panicked.
    #[error("request aborted: {error}")]
    Aborted {
        /// Shared key, if the request was shared.
        key: Option<String>,
        /// Join failure description.
        error: String,
    },

    /// A request with the same shared key is in flight with a different result type.
    #[error("shared key `{key}` is in flight with a different result type")]
    KeyConflict {
        /// The conflicting key.
        key: String,
    },
}

impl RequestError {
    /// Shorthand for [`RequestError::Fail`].
    ///
    /// # Example
    /// ```
    /// use reqvisor::RequestError;
    ///
    /// let err = RequestError::fail("connection refused");
    /// assert_eq!(err.to_string(), "request failed: connection refused");
    /// ```
    pub fn fail(error: impl Display) -> Self {
        RequestError::Fail {
            error: error.to_string(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use reqvisor::RequestError;
    ///
    /// let err = RequestError::KeyConflict { key: "users".into() };
    /// assert_eq!(err.as_label(), "request_key_conflict");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RequestError::Fail { .. } => "request_failed",
            RequestError::Cache { .. } => "request_cache",
            RequestError::Aborted { .. } => "request_aborted",
            RequestError::KeyConflict { .. } => "request_key_conflict",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            RequestError::Fail { error } => format!("error: {error}"),
            RequestError::Cache { key, error } => format!("cache key={key}: {error}"),
            RequestError::Aborted { key: Some(key), error } => {
                format!("aborted key={key}: {error}")
            }
            RequestError::Aborted { key: None, error } => format!("aborted: {error}"),
            RequestError::KeyConflict { key } => format!("key conflict: {key}"),
        }
    }

    /// Indicates whether the error originated in the operation itself rather
    /// than in the surrounding machinery.
    pub fn is_operation_failure(&self) -> bool {
        matches!(self, RequestError::Fail { .. })
    }
}

/// Extracts the message of a caught panic payload.
pub(crate) fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
