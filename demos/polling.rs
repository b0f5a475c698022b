//! # Example: Polling with page visibility
//!
//! Demonstrates:
//! - Polling an operation every second
//! - Pausing the chain while the page is hidden (`polling_when_hidden = false`)
//! - Resuming with one refresh when the page becomes visible again
//! - Two orchestrators sharing one in-flight request by key
//! - Lifecycle events rendered through the tracing-backed `LogWriter`
//!
//! Run with: `RUST_LOG=debug cargo run --example polling`

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use reqvisor::{
    OperationFn, OperationRef, Options, Orchestrator, Page, RequestError, SharedRegistry,
    Subscribe,
};

/// Simulated remote counter: every fetch returns the next tick.
fn make_operation() -> OperationRef<&'static str, u64> {
    let ticks = Arc::new(AtomicU64::new(0));
    OperationFn::arc("fetch-ticks", move |source: &'static str| {
        let ticks = Arc::clone(&ticks);
        async move {
            tokio::time::sleep(Duration::from_millis(150)).await;
            let tick = ticks.fetch_add(1, Ordering::SeqCst) + 1;
            println!("[{source}] fetched tick {tick}");
            Ok::<_, RequestError>(tick)
        }
    })
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    #[cfg(feature = "logging")]
    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(reqvisor::LogWriter::default())];
    #[cfg(not(feature = "logging"))]
    let subs: Vec<Arc<dyn Subscribe>> = Vec::new();

    let page = Page::new();
    let registry = SharedRegistry::new();
    let operation = make_operation();

    let poller = Orchestrator::builder(Arc::clone(&operation))
        .with_options(
            Options::default()
                .with_cache_key("ticks")
                .with_polling(Duration::from_secs(1))
                .with_polling_when_hidden(false)
                .with_on_success(|tick: &u64, _: &&'static str| println!("  poller saw {tick}")),
        )
        .with_page(Arc::clone(&page))
        .with_registry(Arc::clone(&registry))
        .with_subscribers(subs)
        .build();

    let viewer = Orchestrator::builder(operation)
        .with_options(Options::default().with_cache_key("ticks"))
        .with_page(Arc::clone(&page))
        .with_registry(registry)
        .build();

    // Both callers share one fetch.
    let (a, b) = tokio::join!(poller.run("poller"), viewer.run("viewer"));
    println!("first round: poller={a:?} viewer={b:?}");

    tokio::time::sleep(Duration::from_millis(2500)).await;

    println!("page hidden");
    page.set_visible(false);
    tokio::time::sleep(Duration::from_secs(3)).await;

    println!("page visible");
    page.set_visible(true);
    tokio::time::sleep(Duration::from_millis(1500)).await;

    poller.destroy(true);
    println!("poller destroyed at stamp {}", poller.stamp());
    Ok(())
}
