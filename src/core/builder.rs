use std::sync::Arc;

use tokio::runtime::Handle;

use super::orchestrator::{Collaborators, Inner, Orchestrator};
use super::registry::SharedRegistry;
use crate::{
    cache::{CacheStore, MemoryCache},
    events::Bus,
    operations::OperationRef,
    options::Options,
    sources::{FocusSource, Page, VisibilitySource},
    subscribers::{Subscribe, SubscriberSet},
};

/// Builder for constructing an [`Orchestrator`] with injected collaborators.
///
/// Anything not injected falls back to the process-wide instance:
/// [`SharedRegistry::global`], [`MemoryCache::global`] and [`Page::global`].
pub struct OrchestratorBuilder<A, R> {
    operation: OperationRef<A, R>,
    options: Options<R, A>,
    registry: Option<Arc<SharedRegistry>>,
    cache: Option<Arc<dyn CacheStore<R>>>,
    visibility: Option<Arc<dyn VisibilitySource>>,
    focus: Option<Arc<dyn FocusSource>>,
    bus: Option<Bus>,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl<A, R> OrchestratorBuilder<A, R>
where
    A: Clone + Send + Sync + 'static,
    R: Clone + Send + Sync + 'static,
{
    /// Creates a builder for `operation` with default options.
    pub fn new(operation: OperationRef<A, R>) -> Self {
        Self {
            operation,
            options: Options::default(),
            registry: None,
            cache: None,
            visibility: None,
            focus: None,
            bus: None,
            subscribers: Vec::new(),
        }
    }

    /// Sets the options.
    pub fn with_options(mut self, options: Options<R, A>) -> Self {
        self.options = options;
        self
    }

    /// Uses `cache` as the persisted store.
    pub fn with_cache(mut self, cache: Arc<dyn CacheStore<R>>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Shares in-flight requests through `registry`.
    pub fn with_registry(mut self, registry: Arc<SharedRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Reads page visibility from `source`.
    pub fn with_visibility(mut self, source: Arc<dyn VisibilitySource>) -> Self {
        self.visibility = Some(source);
        self
    }

    /// Reads window focus from `source`.
    pub fn with_focus(mut self, source: Arc<dyn FocusSource>) -> Self {
        self.focus = Some(source);
        self
    }

    /// Uses `page` for both visibility and focus.
    pub fn with_page(self, page: Arc<Page>) -> Self {
        let visibility: Arc<dyn VisibilitySource> = page.clone();
        self.with_visibility(visibility).with_focus(page)
    }

    /// Publishes lifecycle events on `bus`.
    pub fn with_bus(mut self, bus: Bus) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive events through dedicated workers with bounded
    /// queues. A bus is created if none was set.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Builds the orchestrator and acquires its page subscriptions.
    ///
    /// # Panics
    /// Panics when called outside a Tokio runtime.
    pub fn build(self) -> Orchestrator<A, R> {
        let runtime = Handle::current();

        let (bus, listener) = match (self.bus, self.subscribers.is_empty()) {
            (bus, true) => (bus, None),
            (bus, false) => {
                let bus = bus.unwrap_or_default();
                let set = Arc::new(SubscriberSet::new(self.subscribers, bus.clone()));
                let listener = set.listen();
                (Some(bus), Some(listener))
            }
        };

        let cache: Arc<dyn CacheStore<R>> = match self.cache {
            Some(cache) => cache,
            None => MemoryCache::global(),
        };
        let visibility: Arc<dyn VisibilitySource> = match self.visibility {
            Some(source) => source,
            None => Page::global(),
        };
        let focus: Arc<dyn FocusSource> = match self.focus {
            Some(source) => source,
            None => Page::global(),
        };

        let collaborators = Collaborators {
            registry: self.registry.unwrap_or_else(SharedRegistry::global),
            cache,
            visibility,
            focus,
            bus,
            listener,
        };

        Orchestrator::from_inner(Inner::new(
            self.operation,
            self.options,
            collaborators,
            runtime,
        ))
    }
}
