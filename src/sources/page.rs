//! # In-process page signals.
//!
//! [`Page`] implements both [`VisibilitySource`] and [`FocusSource`]. A binding
//! layer forwards its host's visibility/focus notifications via
//! [`Page::set_visible`] and [`Page::focus`].
//!
//! ## Rules
//! - Visibility listeners fire only on the hidden → visible transition
//! - Listeners are invoked outside of any internal lock, in registration order
//! - A page starts visible

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, LazyLock};

use parking_lot::Mutex;

use super::{FocusSource, Listener, Subscription, VisibilitySource};

static GLOBAL: LazyLock<Arc<Page>> = LazyLock::new(Page::new);

/// Ordered listener list with id-based removal.
#[derive(Default)]
struct Listeners {
    next_id: AtomicU64,
    entries: Mutex<Vec<(u64, Listener)>>,
}

impl Listeners {
    fn add(self: &Arc<Self>, listener: Listener) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.entries.lock().push((id, listener));

        let me = Arc::downgrade(self);
        Subscription::new(move || {
            if let Some(me) = me.upgrade() {
                me.entries.lock().retain(|(entry, _)| *entry != id);
            }
        })
    }

    fn notify(&self) {
        let snapshot: Vec<Listener> = self
            .entries
            .lock()
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();
        for listener in snapshot {
            listener();
        }
    }

    fn len(&self) -> usize {
        self.entries.lock().len()
    }
}

/// Visibility and focus signals for one page (or process).
pub struct Page {
    visible: AtomicBool,
    visibility: Arc<Listeners>,
    focus: Arc<Listeners>,
}

impl Page {
    /// Creates a visible page with no listeners.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            visible: AtomicBool::new(true),
            visibility: Arc::default(),
            focus: Arc::default(),
        })
    }

    /// Process-wide page used by orchestrators built without explicit sources.
    pub fn global() -> Arc<Self> {
        Arc::clone(&GLOBAL)
    }

    /// Records a visibility change; notifies listeners when the page becomes visible.
    pub fn set_visible(&self, visible: bool) {
        let was = self.visible.swap(visible, Ordering::SeqCst);
        if visible && !was {
            self.visibility.notify();
        }
    }

    /// Notifies focus listeners.
    pub fn focus(&self) {
        self.focus.notify();
    }

    /// Number of live visibility listeners.
    pub fn visibility_listeners(&self) -> usize {
        self.visibility.len()
    }

    /// Number of live focus listeners.
    pub fn focus_listeners(&self) -> usize {
        self.focus.len()
    }
}

impl VisibilitySource for Page {
    fn is_visible(&self) -> bool {
        self.visible.load(Ordering::SeqCst)
    }

    fn subscribe(&self, listener: Listener) -> Subscription {
        self.visibility.add(listener)
    }
}

impl FocusSource for Page {
    fn subscribe(&self, listener: Listener) -> Subscription {
        self.focus.add(listener)
    }
}
