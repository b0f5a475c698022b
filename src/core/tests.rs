use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::time;

use super::{Orchestrator, SharedRegistry};
use crate::cache::{CacheStore, MemoryCache};
use crate::error::RequestError;
use crate::events::{Bus, Event, EventKind};
use crate::operations::{OperationFn, OperationRef};
use crate::options::Options;
use crate::sources::Page;
use crate::subscribers::Subscribe;

type Calls = Arc<Mutex<Vec<u32>>>;

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

/// Doubles its input after `delay`; fails for zero.
fn doubling(calls: &Calls, delay: Duration) -> OperationRef<u32, u32> {
    let calls = Arc::clone(calls);
    OperationFn::arc("double", move |n: u32| {
        calls.lock().push(n);
        async move {
            time::sleep(delay).await;
            if n == 0 {
                return Err(RequestError::fail("zero"));
            }
            Ok(n * 2)
        }
    })
}

#[derive(Default)]
struct Hooks {
    successes: Mutex<Vec<(u32, u32)>>,
    errors: Mutex<Vec<(String, u32)>>,
    finals: AtomicUsize,
}

impl Hooks {
    fn attach(self: &Arc<Self>, options: Options<u32, u32>) -> Options<u32, u32> {
        let (s, e, f) = (Arc::clone(self), Arc::clone(self), Arc::clone(self));
        options
            .with_on_success(move |value: &u32, args: &u32| {
                s.successes.lock().push((*value, *args))
            })
            .with_on_error(move |err: &RequestError, args: &u32| {
                e.errors.lock().push((err.to_string(), *args))
            })
            .with_on_finally(move || {
                f.finals.fetch_add(1, Ordering::SeqCst);
            })
    }

    fn successes(&self) -> Vec<(u32, u32)> {
        self.successes.lock().clone()
    }

    fn errors(&self) -> Vec<(String, u32)> {
        self.errors.lock().clone()
    }

    fn finals(&self) -> usize {
        self.finals.load(Ordering::SeqCst)
    }
}

fn calls_of(calls: &Calls) -> Vec<u32> {
    calls.lock().clone()
}

fn drain(rx: &mut broadcast::Receiver<Event>) -> Vec<EventKind> {
    let mut kinds = Vec::new();
    while let Ok(ev) = rx.try_recv() {
        kinds.push(ev.kind);
    }
    kinds
}

#[tokio::test(start_paused = true)]
async fn run_resolves_with_result_and_calls_hooks() {
    let calls = Calls::default();
    let hooks = Arc::new(Hooks::default());
    let orchestrator =
        Orchestrator::new(doubling(&calls, ms(10)), hooks.attach(Options::default()));

    assert_eq!(orchestrator.run(5).await, Ok(Some(10)));
    assert_eq!(hooks.successes(), vec![(10, 5)]);
    assert_eq!(hooks.finals(), 1);
    assert_eq!(orchestrator.params(), Some(5));
}

#[tokio::test(start_paused = true)]
async fn failure_reaches_on_error_and_the_caller() {
    let calls = Calls::default();
    let hooks = Arc::new(Hooks::default());
    let orchestrator =
        Orchestrator::new(doubling(&calls, ms(10)), hooks.attach(Options::default()));

    assert_eq!(orchestrator.run(0).await, Err(RequestError::fail("zero")));
    assert_eq!(hooks.errors(), vec![("request failed: zero".to_string(), 0)]);
    assert!(hooks.successes().is_empty());
    assert_eq!(hooks.finals(), 1);
}

#[tokio::test(start_paused = true)]
async fn on_before_runs_synchronously() {
    let calls = Calls::default();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let options = Options::default().with_on_before(move |args: &u32| sink.lock().push(*args));
    let orchestrator = Orchestrator::new(doubling(&calls, ms(10)), options);

    let pending = orchestrator.run(3);
    assert_eq!(*seen.lock(), vec![3]);
    assert_eq!(pending.await, Ok(Some(6)));
}

#[tokio::test(start_paused = true)]
async fn cancel_silences_in_flight_execution() {
    let calls = Calls::default();
    let hooks = Arc::new(Hooks::default());
    let orchestrator =
        Orchestrator::new(doubling(&calls, ms(100)), hooks.attach(Options::default()));

    let pending = orchestrator.run(1);
    orchestrator.cancel();
    assert_eq!(pending.await, Ok(None));

    time::sleep(ms(500)).await;
    assert_eq!(calls_of(&calls), vec![1]);
    assert!(hooks.successes().is_empty());
    assert!(hooks.errors().is_empty());
    assert_eq!(hooks.finals(), 0);
}

#[tokio::test(start_paused = true)]
async fn latest_run_wins() {
    let hooks = Arc::new(Hooks::default());
    let slow_first: OperationRef<u32, u32> = OperationFn::arc("slow-first", |n: u32| async move {
        let delay = if n == 1 { 200 } else { 50 };
        time::sleep(ms(delay)).await;
        Ok::<_, RequestError>(n * 2)
    });
    let orchestrator = Orchestrator::new(slow_first, hooks.attach(Options::default()));

    let (first, second) = tokio::join!(orchestrator.run(1), orchestrator.run(2));
    assert_eq!(first, Ok(None));
    assert_eq!(second, Ok(Some(4)));

    time::sleep(ms(500)).await;
    assert_eq!(hooks.successes(), vec![(4, 2)]);
    assert_eq!(hooks.finals(), 1);
}

#[tokio::test(start_paused = true)]
async fn same_key_is_shared_across_orchestrators() {
    let calls = Calls::default();
    let registry = SharedRegistry::new();
    let cache = Arc::new(MemoryCache::new());
    let build = || {
        Orchestrator::builder(doubling(&calls, ms(100)))
            .with_options(Options::default().with_cache_key("users"))
            .with_registry(Arc::clone(&registry))
            .with_cache(cache.clone())
            .build()
    };
    let (one, two) = (build(), build());

    let (a, b) = tokio::join!(one.run(3), two.run(3));
    assert_eq!(a, Ok(Some(6)));
    assert_eq!(b, Ok(Some(6)));
    assert_eq!(calls_of(&calls), vec![3]);
    assert!(registry.is_empty());
    assert_eq!(CacheStore::<u32>::get(cache.as_ref(), "users"), Ok(Some(6)));
}

#[tokio::test(start_paused = true)]
async fn shared_result_is_gated_per_instance() {
    let calls = Calls::default();
    let registry = SharedRegistry::new();
    let hooks = Arc::new(Hooks::default());
    let build = |options: Options<u32, u32>| {
        Orchestrator::builder(doubling(&calls, ms(100)))
            .with_options(options.with_cache_key("feed"))
            .with_registry(Arc::clone(&registry))
            .with_cache(Arc::new(MemoryCache::new()))
            .build()
    };
    let keeper = build(hooks.attach(Options::default()));
    let quitter = build(Options::default());

    let kept = keeper.run(4);
    let dropped = quitter.run(4);
    quitter.cancel();

    assert_eq!(kept.await, Ok(Some(8)));
    assert_eq!(dropped.await, Ok(None));
    assert_eq!(hooks.successes(), vec![(8, 4)]);
    assert_eq!(calls_of(&calls), vec![4]);
}

#[tokio::test(start_paused = true)]
async fn warm_persisted_entry_skips_the_operation() {
    let calls = Calls::default();
    let hooks = Arc::new(Hooks::default());
    let cache = Arc::new(MemoryCache::new());
    cache.set("answer", 99u32, Duration::from_secs(60)).unwrap();

    let options = Options::default()
        .with_cache_key("answer")
        .with_persisted(true);
    let orchestrator = Orchestrator::builder(doubling(&calls, ms(10)))
        .with_options(hooks.attach(options))
        .with_registry(SharedRegistry::new())
        .with_cache(cache)
        .build();

    assert_eq!(orchestrator.run(1).await, Ok(Some(99)));
    assert!(calls_of(&calls).is_empty());
    assert_eq!(hooks.successes(), vec![(99, 1)]);
    assert_eq!(hooks.finals(), 1);
}

#[tokio::test(start_paused = true)]
async fn successful_result_is_formatted_and_cached() {
    let calls = Calls::default();
    let cache = Arc::new(MemoryCache::new());
    CacheStore::<u32>::set(cache.as_ref(), "total", 1, Duration::from_secs(60)).unwrap();

    let options = Options::default()
        .with_cache_key("total")
        .with_cache_time(Duration::from_secs(10))
        .with_format_result(|raw: u32, args: &u32| raw + args);
    let orchestrator = Orchestrator::builder(doubling(&calls, ms(10)))
        .with_options(options)
        .with_registry(SharedRegistry::new())
        .with_cache(cache.clone())
        .build();

    // Not persisted: the warm entry is ignored and overwritten.
    assert_eq!(orchestrator.run(5).await, Ok(Some(15)));
    assert_eq!(calls_of(&calls), vec![5]);
    assert_eq!(CacheStore::<u32>::get(cache.as_ref(), "total"), Ok(Some(15)));

    time::sleep(Duration::from_secs(11)).await;
    assert_eq!(CacheStore::<u32>::get(cache.as_ref(), "total"), Ok(None));
}

struct BrokenStore;

impl CacheStore<u32> for BrokenStore {
    fn get(&self, key: &str) -> Result<Option<u32>, RequestError> {
        Err(RequestError::Cache {
            key: key.to_string(),
            error: "unreachable".into(),
        })
    }

    fn set(&self, key: &str, _value: u32, _ttl: Duration) -> Result<(), RequestError> {
        Err(RequestError::Cache {
            key: key.to_string(),
            error: "read-only".into(),
        })
    }
}

#[tokio::test(start_paused = true)]
async fn cache_failures_take_the_error_path() {
    let calls = Calls::default();
    let hooks = Arc::new(Hooks::default());
    let options = Options::default()
        .with_cache_key("k")
        .with_persisted(true);
    let orchestrator = Orchestrator::builder(doubling(&calls, ms(10)))
        .with_options(hooks.attach(options))
        .with_registry(SharedRegistry::new())
        .with_cache(Arc::new(BrokenStore))
        .build();

    let err = orchestrator.run(2).await.unwrap_err();
    assert_eq!(err.as_label(), "request_cache");
    assert!(calls_of(&calls).is_empty());

    orchestrator.update_options(|o| o.persisted = false);
    let err = orchestrator.run(2).await.unwrap_err();
    assert_eq!(
        err,
        RequestError::Cache {
            key: "k".into(),
            error: "read-only".into()
        }
    );
    assert_eq!(calls_of(&calls), vec![2]);
    assert_eq!(hooks.errors().len(), 2);
    assert!(hooks.successes().is_empty());
}

#[tokio::test(start_paused = true)]
async fn debounce_collapses_a_burst() {
    let calls = Calls::default();
    let hooks = Arc::new(Hooks::default());
    let orchestrator = Orchestrator::new(
        doubling(&calls, ms(10)),
        hooks.attach(Options::default().with_debounce(ms(300))),
    );

    assert_eq!(orchestrator.run(1).await, Ok(None));
    time::sleep(ms(20)).await;
    assert_eq!(orchestrator.run(2).await, Ok(None));
    time::sleep(ms(20)).await;
    assert_eq!(orchestrator.run(3).await, Ok(None));
    assert!(calls_of(&calls).is_empty());

    time::sleep(ms(350)).await;
    assert_eq!(calls_of(&calls), vec![3]);
    assert_eq!(hooks.successes(), vec![(6, 3)]);
}

#[tokio::test(start_paused = true)]
async fn throttle_runs_leading_and_trailing() {
    let calls = Calls::default();
    let orchestrator = Orchestrator::new(
        doubling(&calls, ms(10)),
        Options::default().with_throttle(ms(100)),
    );

    orchestrator.run(1).await.unwrap();
    orchestrator.run(2).await.unwrap();
    orchestrator.run(3).await.unwrap();
    time::sleep(ms(5)).await;
    assert_eq!(calls_of(&calls), vec![1]);

    time::sleep(ms(150)).await;
    assert_eq!(calls_of(&calls), vec![1, 3]);
}

#[tokio::test(start_paused = true)]
async fn cancel_drops_a_pending_debounced_call() {
    let calls = Calls::default();
    let orchestrator = Orchestrator::new(
        doubling(&calls, ms(10)),
        Options::default().with_debounce(ms(100)),
    );

    drop(orchestrator.run(1));
    orchestrator.cancel();
    time::sleep(ms(300)).await;
    assert!(calls_of(&calls).is_empty());
}

#[tokio::test(start_paused = true)]
async fn flush_fires_the_pending_call_now() {
    let calls = Calls::default();
    let orchestrator = Orchestrator::new(
        doubling(&calls, ms(10)),
        Options::default().with_debounce(ms(300)),
    );

    assert!(!orchestrator.flush());
    drop(orchestrator.run(5));
    assert!(orchestrator.flush());
    time::sleep(ms(20)).await;
    assert_eq!(calls_of(&calls), vec![5]);

    time::sleep(ms(500)).await;
    assert_eq!(calls_of(&calls), vec![5]);
}

#[tokio::test(start_paused = true)]
async fn changing_the_interval_rebuilds_the_adapter() {
    let calls = Calls::default();
    let orchestrator = Orchestrator::new(
        doubling(&calls, ms(10)),
        Options::default().with_debounce(ms(300)),
    );

    drop(orchestrator.run(1));
    orchestrator.update_options(|o| o.debounce_interval = Some(ms(100)));
    time::sleep(ms(500)).await;
    assert!(calls_of(&calls).is_empty());

    drop(orchestrator.run(2));
    time::sleep(ms(150)).await;
    assert_eq!(calls_of(&calls), vec![2]);

    // Unrelated edits keep the pending call.
    drop(orchestrator.run(3));
    orchestrator.update_options(|o| o.cache_time = Duration::from_secs(1));
    time::sleep(ms(150)).await;
    assert_eq!(calls_of(&calls), vec![2, 3]);

    // Removing the interval makes `run` immediate again.
    orchestrator.update_options(|o| o.debounce_interval = None);
    assert_eq!(orchestrator.run(4).await, Ok(Some(8)));
    assert_eq!(orchestrator.options().debounce(), None);
}

#[tokio::test(start_paused = true)]
async fn polling_rearms_after_each_settlement() {
    let calls = Calls::default();
    let orchestrator = Orchestrator::builder(doubling(&calls, ms(10)))
        .with_options(Options::default().with_polling(Duration::from_secs(1)))
        .with_page(Page::new())
        .build();

    assert_eq!(orchestrator.run(1).await, Ok(Some(2)));
    assert_eq!(calls_of(&calls), vec![1]);

    time::sleep(ms(1005)).await;
    assert_eq!(calls_of(&calls), vec![1, 1]);

    // The second execution is still in flight: cancelling stops the chain.
    orchestrator.cancel();
    time::sleep(Duration::from_secs(5)).await;
    assert_eq!(calls_of(&calls), vec![1, 1]);
}

#[tokio::test(start_paused = true)]
async fn cancel_clears_an_armed_poll() {
    let calls = Calls::default();
    let orchestrator = Orchestrator::builder(doubling(&calls, ms(10)))
        .with_options(Options::default().with_polling(Duration::from_secs(1)))
        .with_page(Page::new())
        .build();

    orchestrator.run(1).await.unwrap();
    orchestrator.cancel();
    time::sleep(Duration::from_secs(3)).await;
    assert_eq!(calls_of(&calls), vec![1]);
}

#[tokio::test(start_paused = true)]
async fn hidden_page_defers_polling_until_visible() {
    let calls = Calls::default();
    let page = Page::new();
    let orchestrator = Orchestrator::builder(doubling(&calls, ms(10)))
        .with_options(
            Options::default()
                .with_polling(Duration::from_secs(1))
                .with_polling_when_hidden(false),
        )
        .with_page(Arc::clone(&page))
        .build();

    page.set_visible(false);
    orchestrator.run(7).await.unwrap();
    time::sleep(Duration::from_secs(5)).await;
    assert_eq!(calls_of(&calls), vec![7]);

    page.set_visible(true);
    page.set_visible(true);
    time::sleep(ms(500)).await;
    assert_eq!(calls_of(&calls), vec![7, 7]);

    // Visible again: the chain continues on its own.
    time::sleep(ms(600)).await;
    assert_eq!(calls_of(&calls), vec![7, 7, 7]);
}

#[tokio::test(start_paused = true)]
async fn hidden_page_keeps_polling_when_allowed() {
    let calls = Calls::default();
    let page = Page::new();
    let orchestrator = Orchestrator::builder(doubling(&calls, ms(10)))
        .with_options(Options::default().with_polling(Duration::from_secs(1)))
        .with_page(Arc::clone(&page))
        .build();

    page.set_visible(false);
    orchestrator.run(2).await.unwrap();
    time::sleep(ms(1100)).await;
    assert_eq!(calls_of(&calls), vec![2, 2]);
}

#[tokio::test(start_paused = true)]
async fn focus_refresh_is_limited_per_timespan() {
    let calls = Calls::default();
    let page = Page::new();
    let orchestrator = Orchestrator::builder(doubling(&calls, ms(10)))
        .with_options(Options::default().with_refresh_on_focus(Duration::from_secs(5)))
        .with_page(Arc::clone(&page))
        .build();

    orchestrator.run(4).await.unwrap();
    page.focus();
    page.focus();
    time::sleep(ms(50)).await;
    assert_eq!(calls_of(&calls), vec![4, 4]);

    time::sleep(Duration::from_secs(5)).await;
    page.focus();
    time::sleep(ms(50)).await;
    assert_eq!(calls_of(&calls), vec![4, 4, 4]);
}

#[tokio::test(start_paused = true)]
async fn destroy_and_resume_toggle_subscriptions() {
    let calls = Calls::default();
    let page = Page::new();
    let orchestrator = Orchestrator::builder(doubling(&calls, ms(10)))
        .with_options(
            Options::default()
                .with_refresh_on_focus(Duration::from_secs(5))
                .with_polling(Duration::from_secs(60))
                .with_default_params(9),
        )
        .with_page(Arc::clone(&page))
        .build();
    assert_eq!(page.focus_listeners(), 1);
    assert_eq!(page.visibility_listeners(), 1);

    orchestrator.destroy(true);
    orchestrator.destroy(true);
    assert!(orchestrator.is_destroyed());
    assert_eq!(page.focus_listeners(), 0);
    assert_eq!(page.visibility_listeners(), 0);

    page.focus();
    time::sleep(ms(50)).await;
    assert!(calls_of(&calls).is_empty());

    orchestrator.resume();
    orchestrator.resume();
    assert!(!orchestrator.is_destroyed());
    assert_eq!(page.focus_listeners(), 1);

    page.focus();
    time::sleep(ms(50)).await;
    assert_eq!(calls_of(&calls), vec![9]);
}

#[tokio::test(start_paused = true)]
async fn destroy_without_cancel_lets_in_flight_work_finish() {
    let calls = Calls::default();
    let hooks = Arc::new(Hooks::default());
    let orchestrator = Orchestrator::builder(doubling(&calls, ms(100)))
        .with_options(hooks.attach(Options::default()))
        .with_page(Page::new())
        .build();

    let pending = orchestrator.run(6);
    orchestrator.destroy(false);
    assert_eq!(pending.await, Ok(Some(12)));
    assert_eq!(hooks.successes(), vec![(12, 6)]);
}

#[tokio::test(start_paused = true)]
async fn dropping_the_orchestrator_releases_everything() {
    let calls = Calls::default();
    let page = Page::new();
    let hooks = Arc::new(Hooks::default());
    let orchestrator = Orchestrator::builder(doubling(&calls, ms(100)))
        .with_options(hooks.attach(Options::default().with_refresh_on_focus(ms(1))))
        .with_page(Arc::clone(&page))
        .build();

    let pending = orchestrator.run(1);
    drop(orchestrator);
    assert_eq!(page.focus_listeners(), 0);
    assert_eq!(pending.await, Ok(None));
    assert!(hooks.successes().is_empty());
}

#[tokio::test(start_paused = true)]
async fn refresh_reuses_the_latest_arguments() {
    let calls = Calls::default();
    let orchestrator = Orchestrator::new(doubling(&calls, ms(10)), Options::default());

    assert_eq!(orchestrator.refresh().await, Ok(None));
    assert!(calls_of(&calls).is_empty());

    orchestrator.run(7).await.unwrap();
    assert_eq!(orchestrator.refresh().await, Ok(Some(14)));
    assert_eq!(calls_of(&calls), vec![7, 7]);

    let seeded = Orchestrator::new(
        doubling(&calls, ms(10)),
        Options::default().with_default_params(3),
    );
    assert_eq!(seeded.params(), Some(3));
    assert_eq!(seeded.refresh().await, Ok(Some(6)));
}

#[tokio::test(start_paused = true)]
async fn run_and_cancel_advance_the_stamp() {
    let calls = Calls::default();
    let orchestrator = Orchestrator::new(doubling(&calls, ms(10)), Options::default());
    let start = orchestrator.stamp();

    orchestrator.run(1).await.unwrap();
    assert_eq!(orchestrator.stamp(), start + 1);
    orchestrator.cancel();
    assert_eq!(orchestrator.stamp(), start + 2);
}

#[tokio::test(start_paused = true)]
async fn events_describe_the_lifecycle() {
    let calls = Calls::default();
    let bus = Bus::new(64);
    let mut rx = bus.subscribe();
    let orchestrator = Orchestrator::builder(doubling(&calls, ms(10)))
        .with_options(Options::default().with_cache_key("evt"))
        .with_registry(SharedRegistry::new())
        .with_cache(Arc::new(MemoryCache::new()))
        .with_bus(bus)
        .build();

    orchestrator.run(1).await.unwrap();
    assert_eq!(
        drain(&mut rx),
        vec![
            EventKind::RequestStarting,
            EventKind::SharedStarted,
            EventKind::RequestSucceeded,
        ]
    );

    let stale = orchestrator.run(2);
    orchestrator.cancel();
    assert_eq!(stale.await, Ok(None));
    time::sleep(ms(50)).await;
    assert_eq!(
        drain(&mut rx),
        vec![
            EventKind::RequestStarting,
            EventKind::SharedStarted,
            EventKind::Cancelled,
        ]
    );

    orchestrator.update_options(|o| o.throttle_interval = Some(ms(40)));
    orchestrator.destroy(false);
    let kinds = drain(&mut rx);
    assert_eq!(kinds, vec![EventKind::AdaptersRebuilt, EventKind::Destroyed]);
}

struct Collect {
    seen: Arc<Mutex<Vec<Event>>>,
}

#[async_trait]
impl Subscribe for Collect {
    async fn on_event(&self, event: &Event) {
        self.seen.lock().push(event.clone());
    }

    fn name(&self) -> &'static str {
        "collect"
    }
}

#[tokio::test(start_paused = true)]
async fn subscribers_receive_named_events() {
    let calls = Calls::default();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let collect = Arc::new(Collect {
        seen: Arc::clone(&seen),
    }) as Arc<dyn Subscribe>;
    let orchestrator = Orchestrator::builder(doubling(&calls, ms(10)))
        .with_subscribers(vec![collect])
        .build();

    orchestrator.run(1).await.unwrap();
    time::sleep(ms(10)).await;

    let seen = seen.lock().clone();
    assert_eq!(seen.len(), 2);
    assert!(seen.iter().all(|ev| ev.request.as_deref() == Some("double")));
    assert_eq!(seen[1].kind, EventKind::RequestSucceeded);
}

#[tokio::test(start_paused = true)]
async fn unbounded_cache_time_still_delivers() {
    let calls = Calls::default();
    let hooks = Arc::new(Hooks::default());
    let cache = Arc::new(MemoryCache::new());
    let options = Options::default()
        .with_cache_key("forever")
        .with_cache_time(Duration::MAX);
    let orchestrator = Orchestrator::builder(doubling(&calls, ms(10)))
        .with_options(hooks.attach(options))
        .with_registry(SharedRegistry::new())
        .with_cache(cache.clone())
        .build();

    assert_eq!(orchestrator.run(5).await, Ok(Some(10)));
    assert_eq!(hooks.successes(), vec![(10, 5)]);
    assert_eq!(hooks.finals(), 1);

    time::sleep(Duration::from_secs(86_400)).await;
    assert_eq!(CacheStore::<u32>::get(cache.as_ref(), "forever"), Ok(Some(10)));
}

#[tokio::test(start_paused = true)]
async fn unbounded_debounce_waits_for_flush() {
    let calls = Calls::default();
    let bus = Bus::new(16);
    let mut rx = bus.subscribe();
    let orchestrator = Orchestrator::builder(doubling(&calls, ms(10)))
        .with_options(Options::default().with_debounce(Duration::MAX))
        .with_bus(bus)
        .build();

    assert_eq!(orchestrator.run(1).await, Ok(None));
    time::sleep(Duration::from_secs(3600)).await;
    assert!(calls_of(&calls).is_empty());

    assert!(orchestrator.flush());
    time::sleep(ms(20)).await;
    assert_eq!(calls_of(&calls), vec![1]);

    drain(&mut rx);
    orchestrator.update_options(|o| o.debounce_interval = Some(ms(75)));
    let rebuilt = rx.try_recv().unwrap();
    assert_eq!(rebuilt.kind, EventKind::AdaptersRebuilt);
    assert_eq!(rebuilt.delay_ms, Some(75));
}

#[tokio::test(start_paused = true)]
async fn panicking_formatter_fails_the_execution() {
    let calls = Calls::default();
    let hooks = Arc::new(Hooks::default());
    let options = Options::default()
        .with_cache_key("fmt")
        .with_format_result(|_raw: u32, _args: &u32| -> u32 { panic!("bad format") });
    let orchestrator = Orchestrator::builder(doubling(&calls, ms(10)))
        .with_options(hooks.attach(options))
        .with_registry(SharedRegistry::new())
        .with_cache(Arc::new(MemoryCache::new()))
        .build();

    let err = orchestrator.run(2).await.unwrap_err();
    assert_eq!(
        err,
        RequestError::Aborted {
            key: Some("fmt".into()),
            error: "bad format".into()
        }
    );
    assert!(hooks.successes().is_empty());
    assert_eq!(hooks.errors().len(), 1);
    assert_eq!(hooks.finals(), 1);
}

#[tokio::test(start_paused = true)]
async fn panicking_success_hook_keeps_polling() {
    let calls = Calls::default();
    let errors = Arc::new(AtomicUsize::new(0));
    let e = Arc::clone(&errors);
    let options = Options::default()
        .with_polling(Duration::from_secs(1))
        .with_on_success(|_: &u32, _: &u32| panic!("hook exploded"))
        .with_on_error(move |err: &RequestError, _: &u32| {
            assert_eq!(err.as_label(), "request_aborted");
            e.fetch_add(1, Ordering::SeqCst);
        });
    let orchestrator = Orchestrator::new(doubling(&calls, ms(10)), options);

    let err = orchestrator.run(3).await.unwrap_err();
    assert_eq!(err.as_label(), "request_aborted");
    assert_eq!(errors.load(Ordering::SeqCst), 1);

    time::sleep(ms(1050)).await;
    assert_eq!(calls_of(&calls), vec![3, 3]);
    assert_eq!(errors.load(Ordering::SeqCst), 2);
    orchestrator.cancel();
}

#[tokio::test(start_paused = true)]
async fn focus_before_the_first_run_needs_default_params() {
    let calls = Calls::default();
    let page = Page::new();
    let bare = Orchestrator::builder(doubling(&calls, ms(10)))
        .with_options(Options::default().with_refresh_on_focus(ms(1)))
        .with_page(Arc::clone(&page))
        .build();
    page.focus();
    time::sleep(ms(50)).await;
    assert!(calls_of(&calls).is_empty());
    drop(bare);

    let seeded = Orchestrator::builder(doubling(&calls, ms(10)))
        .with_options(
            Options::default()
                .with_refresh_on_focus(ms(1))
                .with_default_params(6),
        )
        .with_page(Arc::clone(&page))
        .build();
    page.focus();
    time::sleep(ms(50)).await;
    assert_eq!(calls_of(&calls), vec![6]);
    assert_eq!(seeded.params(), Some(6));
}
