//! # Request orchestrator.
//!
//! [`Orchestrator`] wraps one [`Operation`](crate::Operation) and decides, for
//! every call, whether and when the operation runs and which results are
//! allowed to reach the caller's hooks.
//!
//! ## Execution
//! ```text
//! run(args)
//!   ├─► rate adapter set → adapter.call(args), resolve Ok(None) now
//!   └─► stamp = gate.advance() → execute(args, stamp)
//!
//! execute(args, stamp)
//!   ├─► clear polling timer, remember args, on_before(args)
//!   ├─► persisted + warm cache (stamp live) → deferred on_success + on_finally
//!   └─► registry.run_or_join(cache_key, operation(args))
//!         └─► settle: stamp stale → nothing
//!                     else format → cache write → on_success/on_error
//!                          stamp still live → on_finally → schedule poll
//! ```
//!
//! ## Rules
//! - Only the execution holding the live stamp may call hooks or resolve with a value
//! - A superseded execution resolves its future with `Ok(None)` and stays silent
//! - Rate-limited firings run with the live stamp; they do not advance it
//! - Hooks and collaborators are always called with no internal lock held
//! - A panic in `format_result` or `on_success` fails the execution with [`RequestError::Aborted`]

use std::future::IntoFuture;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use futures::future::{self, BoxFuture, FutureExt};
use parking_lot::{Mutex, RwLock};
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use super::gate::InvocationGate;
use super::polling::PollingTimer;
use super::registry::{FlightOrigin, Settlement, SharedRegistry};
use crate::cache::CacheStore;
use crate::error::{RequestError, panic_message};
use crate::events::{Bus, Event, EventKind};
use crate::operations::OperationRef;
use crate::options::{Options, RatePolicy};
use crate::policies::{Limited, RateAdapter, Sink};
use crate::sources::{FocusSource, Subscription, VisibilitySource};

/// Future returned by [`Orchestrator::run`] and [`Orchestrator::refresh`].
///
/// - `Ok(Some(value))`: the current execution succeeded
/// - `Ok(None)`: the call was handed to a rate adapter, or was superseded
/// - `Err(err)`: the current execution failed
pub type RunFuture<R> = BoxFuture<'static, Result<Option<R>, RequestError>>;

/// Collaborators injected by the builder.
pub(crate) struct Collaborators<R> {
    pub(crate) registry: Arc<SharedRegistry>,
    pub(crate) cache: Arc<dyn CacheStore<R>>,
    pub(crate) visibility: Arc<dyn VisibilitySource>,
    pub(crate) focus: Arc<dyn FocusSource>,
    pub(crate) bus: Option<Bus>,
    pub(crate) listener: Option<JoinHandle<()>>,
}

#[derive(Default)]
struct Lifecycle {
    destroyed: bool,
    subscriptions: Vec<Subscription>,
}

pub(crate) struct Inner<A, R> {
    me: Weak<Self>,
    operation: OperationRef<A, R>,
    options: RwLock<Arc<Options<R, A>>>,
    gate: InvocationGate,
    params: Mutex<Option<A>>,
    adapter: Mutex<Option<RateAdapter<A>>>,
    polling: PollingTimer,
    resume_on_visible: AtomicBool,
    lifecycle: Mutex<Lifecycle>,
    registry: Arc<SharedRegistry>,
    cache: Arc<dyn CacheStore<R>>,
    visibility: Arc<dyn VisibilitySource>,
    focus: Arc<dyn FocusSource>,
    bus: Option<Bus>,
    listener: Option<JoinHandle<()>>,
    runtime: Handle,
}

impl<A, R> Inner<A, R>
where
    A: Clone + Send + Sync + 'static,
    R: Clone + Send + Sync + 'static,
{
    pub(crate) fn new(
        operation: OperationRef<A, R>,
        options: Options<R, A>,
        collaborators: Collaborators<R>,
        runtime: Handle,
    ) -> Arc<Self> {
        let options = options.normalized();
        let params = options.default_params.clone();
        let Collaborators {
            registry,
            cache,
            visibility,
            focus,
            bus,
            listener,
        } = collaborators;

        let inner = Arc::new_cyclic(|me| Self {
            me: me.clone(),
            operation,
            options: RwLock::new(Arc::new(options)),
            gate: InvocationGate::new(),
            params: Mutex::new(params),
            adapter: Mutex::new(None),
            polling: PollingTimer::default(),
            resume_on_visible: AtomicBool::new(false),
            lifecycle: Mutex::new(Lifecycle::default()),
            registry,
            cache,
            visibility,
            focus,
            bus,
            listener,
            runtime,
        });
        inner.init();
        inner
    }

    fn options(&self) -> Arc<Options<R, A>> {
        Arc::clone(&self.options.read())
    }

    /// Builds the rate adapter and acquires page subscriptions.
    fn init(&self) {
        self.rebuild_adapters();

        let opts = self.options();
        let mut acquired = Vec::new();
        if opts.polling().is_some() {
            let me = self.me.clone();
            acquired.push(self.visibility.subscribe(Arc::new(move || {
                if let Some(inner) = me.upgrade() {
                    inner.on_visible();
                }
            })));
        }
        if opts.refresh_on_window_focus {
            let me = self.me.clone();
            let limited = Limited::new(opts.focus_timespan, move || {
                if let Some(inner) = me.upgrade() {
                    inner.on_focus();
                }
            });
            acquired.push(self.focus.subscribe(Arc::new(move || {
                limited.call();
            })));
        }
        self.lifecycle.lock().subscriptions.extend(acquired);
    }

    fn rebuild_adapters(&self) {
        let policy = self.options().rate_policy();
        let me = self.me.clone();
        let sink: Sink<A> = Arc::new(move |args| {
            if let Some(inner) = me.upgrade() {
                let stamp = inner.gate.current();
                drop(inner.execute(args, stamp));
            }
        });

        let next = RateAdapter::build(policy, sink, self.runtime.clone());
        let previous = std::mem::replace(&mut *self.adapter.lock(), next);
        if let Some(previous) = previous {
            previous.cancel();
        }
    }

    fn current_adapter(&self) -> Option<RateAdapter<A>> {
        self.adapter.lock().clone()
    }

    pub(crate) fn run(&self, args: A) -> RunFuture<R> {
        if let Some(adapter) = self.current_adapter() {
            adapter.call(args);
            return future::ready(Ok(None)).boxed();
        }

        let stamp = self.gate.advance();
        let rx = self.execute(args, stamp);
        async move {
            match rx.await {
                Ok(settled) => settled.map(Some),
                Err(_superseded) => Ok(None),
            }
        }
        .boxed()
    }

    /// Synchronous part of one execution; the rest runs on the runtime.
    fn execute(&self, args: A, stamp: u64) -> oneshot::Receiver<Settlement<R>> {
        let (tx, rx) = oneshot::channel();
        let Some(me) = self.me.upgrade() else {
            return rx;
        };

        self.polling.clear();
        *self.params.lock() = Some(args.clone());

        let opts = self.options();
        let key = opts.cache_key.clone();
        self.publish(
            Event::new(EventKind::RequestStarting)
                .with_key_opt(key.as_deref())
                .with_stamp(stamp),
        );
        if let Some(hook) = &opts.on_before {
            hook(&args);
        }

        if let (Some(key), true) = (key.as_deref(), opts.persisted) {
            match self.cache.get(key) {
                Ok(Some(value)) if self.gate.matches(stamp) => {
                    self.runtime.spawn(me.deliver_cached(value, args, stamp, opts, tx));
                    return rx;
                }
                Ok(_) => {}
                Err(err) => {
                    let failed = future::ready(Err(err)).boxed();
                    self.runtime.spawn(me.complete(failed, args, stamp, opts, tx));
                    return rx;
                }
            }
        }

        let operation = Arc::clone(&self.operation);
        let call_args = args.clone();
        let flight = self
            .registry
            .run_or_join(&self.runtime, key.as_deref(), move || {
                async move { operation.call(call_args).await }.boxed()
            });

        let shared = match flight.origin() {
            FlightOrigin::Direct => None,
            FlightOrigin::Started => Some(EventKind::SharedStarted),
            FlightOrigin::Joined => Some(EventKind::SharedJoined),
        };
        if let Some(kind) = shared {
            self.publish(
                Event::new(kind)
                    .with_key_opt(key.as_deref())
                    .with_stamp(stamp),
            );
        }

        self.runtime.spawn(me.complete(flight.into_future(), args, stamp, opts, tx));
        rx
    }

    async fn deliver_cached(
        self: Arc<Self>,
        value: R,
        args: A,
        stamp: u64,
        opts: Arc<Options<R, A>>,
        tx: oneshot::Sender<Settlement<R>>,
    ) {
        tokio::task::yield_now().await;
        if !self.gate.matches(stamp) {
            return;
        }

        let key = opts.cache_key.as_deref();
        let outcome = guarded(key, || {
            if let Some(hook) = &opts.on_success {
                hook(&value, &args);
            }
            Ok(value)
        });
        self.deliver(outcome, EventKind::CacheHit, &args, stamp, &opts, tx);

        if let Some(hook) = &opts.on_finally {
            hook();
        }
    }

    async fn complete(
        self: Arc<Self>,
        pending: BoxFuture<'static, Settlement<R>>,
        args: A,
        stamp: u64,
        opts: Arc<Options<R, A>>,
        tx: oneshot::Sender<Settlement<R>>,
    ) {
        let settled = pending.await;
        if !self.gate.matches(stamp) {
            return;
        }

        let key = opts.cache_key.as_deref();
        let outcome = settled.and_then(|raw| {
            guarded(key, || {
                let value = opts.format(raw, &args);
                if let Some(key) = key {
                    self.cache.set(key, value.clone(), opts.cache_time)?;
                }
                if let Some(hook) = &opts.on_success {
                    hook(&value, &args);
                }
                Ok(value)
            })
        });
        self.deliver(outcome, EventKind::RequestSucceeded, &args, stamp, &opts, tx);

        // A hook may have cancelled or re-run.
        if !self.gate.matches(stamp) {
            return;
        }
        if let Some(hook) = &opts.on_finally {
            hook();
        }
        self.schedule_poll(&opts, args, stamp);
    }

    /// Publishes the outcome, runs `on_error` on failure and resolves the caller.
    fn deliver(
        &self,
        outcome: Settlement<R>,
        succeeded: EventKind,
        args: &A,
        stamp: u64,
        opts: &Options<R, A>,
        tx: oneshot::Sender<Settlement<R>>,
    ) {
        let key = opts.cache_key.as_deref();
        match outcome {
            Ok(value) => {
                self.publish(Event::new(succeeded).with_key_opt(key).with_stamp(stamp));
                let _ = tx.send(Ok(value));
            }
            Err(err) => {
                self.publish(
                    Event::new(EventKind::RequestFailed)
                        .with_key_opt(key)
                        .with_stamp(stamp)
                        .with_reason(err.as_message()),
                );
                if let Some(hook) = &opts.on_error {
                    hook(&err, args);
                }
                let _ = tx.send(Err(err));
            }
        }
    }

    fn schedule_poll(&self, opts: &Options<R, A>, args: A, stamp: u64) {
        let Some(interval) = opts.polling() else {
            return;
        };

        if !opts.polling_when_hidden && !self.visibility.is_visible() {
            self.resume_on_visible.store(true, Ordering::SeqCst);
            self.publish(Event::new(EventKind::PollDeferred).with_stamp(stamp));
            return;
        }

        let me = self.me.clone();
        self.polling.arm(&self.runtime, interval, move || {
            if let Some(inner) = me.upgrade() {
                drop(inner.run(args));
            }
        });
        self.publish(
            Event::new(EventKind::PollScheduled)
                .with_stamp(stamp)
                .with_delay(interval),
        );
    }

    fn on_visible(&self) {
        if self.resume_on_visible.swap(false, Ordering::SeqCst) {
            self.publish(Event::new(EventKind::PollResumed));
            drop(self.refresh());
        }
    }

    fn on_focus(&self) {
        self.publish(Event::new(EventKind::FocusRefresh));
        drop(self.refresh());
    }

    pub(crate) fn refresh(&self) -> RunFuture<R> {
        let params = self.params.lock().clone();
        match params {
            Some(args) => self.run(args),
            None => future::ready(Ok(None)).boxed(),
        }
    }

    pub(crate) fn cancel(&self) {
        if let Some(adapter) = self.current_adapter() {
            adapter.cancel();
        }
        self.polling.clear();
        let stamp = self.gate.advance();
        self.publish(Event::new(EventKind::Cancelled).with_stamp(stamp));
    }

    pub(crate) fn destroy(&self, need_cancel: bool) {
        if need_cancel {
            self.cancel();
        }

        let released = {
            let mut lifecycle = self.lifecycle.lock();
            if lifecycle.destroyed {
                return;
            }
            lifecycle.destroyed = true;
            std::mem::take(&mut lifecycle.subscriptions)
        };
        for subscription in released {
            subscription.unsubscribe();
        }
        self.publish(Event::new(EventKind::Destroyed));
    }

    pub(crate) fn resume(&self) {
        {
            let mut lifecycle = self.lifecycle.lock();
            if !lifecycle.destroyed {
                return;
            }
            lifecycle.destroyed = false;
        }
        self.init();
        self.publish(Event::new(EventKind::Resumed));
    }

    pub(crate) fn update_options(&self, update: impl FnOnce(&mut Options<R, A>)) {
        let prev = self.options();
        let mut next = Options::clone(&prev);
        update(&mut next);
        let next = Arc::new(next.normalized());
        *self.options.write() = Arc::clone(&next);

        if prev.debounce() == next.debounce() && prev.throttle() == next.throttle() {
            return;
        }
        self.rebuild_adapters();

        let event = Event::new(EventKind::AdaptersRebuilt);
        let event = match self.current_adapter().map(|adapter| adapter.policy()) {
            Some(RatePolicy::Debounce(wait) | RatePolicy::Throttle(wait)) => event.with_delay(wait),
            _ => event,
        };
        self.publish(event);
    }

    pub(crate) fn flush(&self) -> bool {
        self.current_adapter().is_some_and(|adapter| adapter.flush())
    }

    fn publish(&self, event: Event) {
        if let Some(bus) = &self.bus {
            bus.publish(event.with_request(self.operation.name()));
        }
    }
}

/// Runs the settle-time callbacks; a panic among them becomes an abort.
fn guarded<R>(key: Option<&str>, f: impl FnOnce() -> Settlement<R>) -> Settlement<R> {
    panic::catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|payload| {
        Err(RequestError::Aborted {
            key: key.map(str::to_string),
            error: panic_message(payload.as_ref()),
        })
    })
}

impl<A, R> Drop for Inner<A, R> {
    fn drop(&mut self) {
        // The subscriber listener owns a bus sender and would never see it close.
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
    }
}

/// # Orchestrates one operation.
///
/// Created with [`Orchestrator::new`] or [`Orchestrator::builder`]. Must be
/// created inside a Tokio runtime; settlement handling, rate adapters and
/// polling run on that runtime.
///
/// Dropping the orchestrator behaves like [`destroy(true)`](Orchestrator::destroy).
///
/// # Example
/// ```rust
/// use reqvisor::{OperationFn, OperationRef, Options, Orchestrator, RequestError};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), RequestError> {
/// let square: OperationRef<u64, u64> = OperationFn::arc("square", |n: u64| async move {
///     Ok::<_, RequestError>(n * n)
/// });
///
/// let orchestrator = Orchestrator::new(square, Options::default());
/// assert_eq!(orchestrator.run(4).await?, Some(16));
/// assert_eq!(orchestrator.refresh().await?, Some(16));
/// # Ok(())
/// # }
/// ```
pub struct Orchestrator<A, R>
where
    A: Clone + Send + Sync + 'static,
    R: Clone + Send + Sync + 'static,
{
    inner: Arc<Inner<A, R>>,
}

impl<A, R> Orchestrator<A, R>
where
    A: Clone + Send + Sync + 'static,
    R: Clone + Send + Sync + 'static,
{
    pub(crate) fn from_inner(inner: Arc<Inner<A, R>>) -> Self {
        Self { inner }
    }

    /// Creates an orchestrator with the process-wide registry, cache and page.
    ///
    /// # Panics
    /// Panics when called outside a Tokio runtime.
    pub fn new(operation: OperationRef<A, R>, options: Options<R, A>) -> Self {
        Self::builder(operation).with_options(options).build()
    }

    /// Starts a builder for injecting collaborators.
    pub fn builder(operation: OperationRef<A, R>) -> super::OrchestratorBuilder<A, R> {
        super::OrchestratorBuilder::new(operation)
    }

    /// Runs the operation with `args`.
    ///
    /// With a debounce/throttle interval configured, the call goes through the
    /// rate adapter and the returned future resolves to `Ok(None)` at once.
    pub fn run(&self, args: A) -> RunFuture<R> {
        self.inner.run(args)
    }

    /// Re-runs with the last arguments (or `default_params`).
    ///
    /// Resolves to `Ok(None)` without running anything when no arguments are known.
    pub fn refresh(&self) -> RunFuture<R> {
        self.inner.refresh()
    }

    /// Invalidates every in-flight execution and stops polling.
    ///
    /// Pending rate-limited calls are dropped. Results of executions already
    /// in flight will not reach any hook.
    pub fn cancel(&self) {
        self.inner.cancel();
    }

    /// Releases page subscriptions; with `need_cancel`, also cancels.
    ///
    /// Idempotent. An in-flight execution that is not cancelled still
    /// delivers its result.
    pub fn destroy(&self, need_cancel: bool) {
        self.inner.destroy(need_cancel);
    }

    /// Re-acquires subscriptions after [`destroy`](Orchestrator::destroy).
    ///
    /// No-op unless destroyed.
    pub fn resume(&self) {
        self.inner.resume();
    }

    /// Edits the options in place.
    ///
    /// Changing the debounce or throttle interval rebuilds the rate adapter;
    /// a call pending in the old adapter is dropped. Call
    /// [`flush`](Orchestrator::flush) first to keep it.
    pub fn update_options(&self, update: impl FnOnce(&mut Options<R, A>)) {
        self.inner.update_options(update);
    }

    /// Runs a call pending in the rate adapter now. Returns whether one was pending.
    pub fn flush(&self) -> bool {
        self.inner.flush()
    }

    /// Arguments of the latest execution (or `default_params`).
    pub fn params(&self) -> Option<A> {
        self.inner.params.lock().clone()
    }

    /// Snapshot of the current options.
    pub fn options(&self) -> Arc<Options<R, A>> {
        self.inner.options()
    }

    /// True between [`destroy`](Orchestrator::destroy) and [`resume`](Orchestrator::resume).
    pub fn is_destroyed(&self) -> bool {
        self.inner.lifecycle.lock().destroyed
    }

    /// The live invocation stamp.
    pub fn stamp(&self) -> u64 {
        self.inner.gate.current()
    }
}

impl<A, R> Drop for Orchestrator<A, R>
where
    A: Clone + Send + Sync + 'static,
    R: Clone + Send + Sync + 'static,
{
    fn drop(&mut self) {
        self.inner.destroy(true);
    }
}
