//! # Shared in-flight registry.
//!
//! Process-wide map from shared key to the single in-flight request for that
//! key. Callers asking for a key that is already in flight join the existing
//! request instead of starting a new one.
//!
//! ## Architecture
//! ```text
//! run_or_join(key, factory)
//!   ├─► key absent   → factory() spawned, entry inserted → Started
//!   ├─► key present  → existing settlement cloned       → Joined
//!   └─► no key       → factory() spawned, not tracked   → Direct
//!
//! spawned task: operation.await → SettleGuard dropped (entry removed) → result sent
//! ```
//!
//! ## Rules
//! - At most one in-flight request per key; every caller observes the same settlement
//! - The entry is removed before any caller observes settlement, so nobody joins a finished request
//! - Removal also happens when the operation panics or its task is torn down
//! - Entries are type-erased; joining a key with a different result type yields [`RequestError::KeyConflict`]

use std::any::Any;
use std::collections::HashMap;
use std::future::IntoFuture;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, LazyLock, Weak};

use futures::future::{self, BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::oneshot;

use crate::error::RequestError;

/// Outcome of one operation invocation.
pub type Settlement<R> = Result<R, RequestError>;

type SharedSettlement<R> = Shared<BoxFuture<'static, Settlement<R>>>;

static GLOBAL: LazyLock<Arc<SharedRegistry>> = LazyLock::new(SharedRegistry::new);

/// How a caller got attached to its request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlightOrigin {
    /// No shared key: a private, untracked request.
    Direct,
    /// This caller started the shared request for its key.
    Started,
    /// This caller joined a request already in flight.
    Joined,
}

/// Handle to a request's eventual settlement.
///
/// Await it directly (`InFlight` implements [`IntoFuture`]).
pub struct InFlight<R> {
    origin: FlightOrigin,
    settlement: BoxFuture<'static, Settlement<R>>,
}

impl<R> InFlight<R> {
    /// Returns how this caller got attached to the request.
    pub fn origin(&self) -> FlightOrigin {
        self.origin
    }
}

impl<R> IntoFuture for InFlight<R> {
    type Output = Settlement<R>;
    type IntoFuture = BoxFuture<'static, Settlement<R>>;

    fn into_future(self) -> Self::IntoFuture {
        self.settlement
    }
}

struct Entry {
    id: u64,
    pending: Box<dyn Any + Send + Sync>,
}

/// Removes the entry it was created for when dropped.
struct SettleGuard {
    registry: Weak<SharedRegistry>,
    key: String,
    id: u64,
}

impl Drop for SettleGuard {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.settle(&self.key, self.id);
        }
    }
}

/// Registry of shared in-flight requests.
#[derive(Default)]
pub struct SharedRegistry {
    next_id: AtomicU64,
    inflight: Mutex<HashMap<String, Entry>>,
}

impl SharedRegistry {
    /// Creates an empty registry.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Returns the process-wide registry used when none is injected.
    pub fn global() -> Arc<Self> {
        Arc::clone(&GLOBAL)
    }

    /// Starts the request built by `factory` or joins the one in flight for `key`.
    ///
    /// `factory` runs only when a new request is started. It runs while the
    /// registry is locked and must not call back into the registry.
    pub fn run_or_join<R, F>(
        self: &Arc<Self>,
        runtime: &Handle,
        key: Option<&str>,
        factory: F,
    ) -> InFlight<R>
    where
        R: Clone + Send + Sync + 'static,
        F: FnOnce() -> BoxFuture<'static, Settlement<R>>,
    {
        let Some(key) = key else {
            return InFlight {
                origin: FlightOrigin::Direct,
                settlement: spawn_settling(runtime, factory(), None, None),
            };
        };

        let (settlement, start) = {
            let mut inflight = self.inflight.lock();
            if let Some(entry) = inflight.get(key) {
                let settlement = match entry.pending.downcast_ref::<SharedSettlement<R>>() {
                    Some(shared) => shared.clone().boxed(),
                    None => future::ready(Err(RequestError::KeyConflict {
                        key: key.to_string(),
                    }))
                    .boxed(),
                };
                return InFlight {
                    origin: FlightOrigin::Joined,
                    settlement,
                };
            }

            let id = self.next_id.fetch_add(1, Ordering::Relaxed);
            let (tx, rx) = oneshot::channel();
            let shared = receive(rx, Some(key.to_string())).boxed().shared();
            inflight.insert(
                key.to_string(),
                Entry {
                    id,
                    pending: Box::new(shared.clone()),
                },
            );

            let guard = SettleGuard {
                registry: Arc::downgrade(self),
                key: key.to_string(),
                id,
            };
            (shared, (factory(), guard, tx))
        };

        // Spawned outside the lock: a task dropped on spawn runs the guard.
        let (operation, guard, tx) = start;
        runtime.spawn(drive(operation, Some(guard), tx));

        InFlight {
            origin: FlightOrigin::Started,
            settlement: settlement.boxed(),
        }
    }

    /// True if a request for `key` is in flight.
    pub fn contains(&self, key: &str) -> bool {
        self.inflight.lock().contains_key(key)
    }

    /// Number of keys in flight.
    pub fn len(&self) -> usize {
        self.inflight.lock().len()
    }

    /// True if nothing is in flight.
    pub fn is_empty(&self) -> bool {
        self.inflight.lock().is_empty()
    }

    fn settle(&self, key: &str, id: u64) {
        let mut inflight = self.inflight.lock();
        if inflight.get(key).is_some_and(|entry| entry.id == id) {
            inflight.remove(key);
        }
    }
}

fn spawn_settling<R>(
    runtime: &Handle,
    operation: BoxFuture<'static, Settlement<R>>,
    guard: Option<SettleGuard>,
    key: Option<String>,
) -> BoxFuture<'static, Settlement<R>>
where
    R: Send + 'static,
{
    let (tx, rx) = oneshot::channel();
    runtime.spawn(drive(operation, guard, tx));
    receive(rx, key).boxed()
}

async fn drive<R>(
    operation: BoxFuture<'static, Settlement<R>>,
    guard: Option<SettleGuard>,
    tx: oneshot::Sender<Settlement<R>>,
) {
    let settled = operation.await;
    drop(guard);
    let _ = tx.send(settled);
}

async fn receive<R>(rx: oneshot::Receiver<Settlement<R>>, key: Option<String>) -> Settlement<R> {
    match rx.await {
        Ok(settled) => settled,
        Err(_) => Err(RequestError::Aborted {
            key,
            error: "operation dropped before settling".to_string(),
        }),
    }
}
