//! # Page event sources consumed by the orchestrator.
//!
//! The orchestrator reacts to two page signals:
//! - **visibility**: resume deferred polling when the page becomes visible again
//! - **focus**: refresh the current request when the window regains focus
//!
//! Both are consumed through small traits ([`VisibilitySource`], [`FocusSource`])
//! whose `subscribe` returns a [`Subscription`] release handle. [`Page`] is the
//! in-process implementation a binding layer drives.

mod page;
mod subscription;

use std::sync::Arc;

pub use page::Page;
pub use subscription::Subscription;

/// Callback registered with a source.
pub type Listener = Arc<dyn Fn() + Send + Sync>;

/// Source of page visibility changes.
pub trait VisibilitySource: Send + Sync + 'static {
    /// Returns whether the page is currently visible.
    fn is_visible(&self) -> bool;

    /// Registers `listener`, called each time the page becomes visible.
    fn subscribe(&self, listener: Listener) -> Subscription;
}

/// Source of window focus events.
pub trait FocusSource: Send + Sync + 'static {
    /// Registers `listener`, called each time the window gains focus.
    fn subscribe(&self, listener: Listener) -> Subscription;
}
