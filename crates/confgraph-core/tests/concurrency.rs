//! Integration tests for concurrent lookups and component worker threads.

use confgraph_core::ComponentHandle;
use confgraph_test_utils::{SlowCounter, Ticker, manager_from};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const WORKERS: &str = r#"{
    config: {
        components: [
            { name: "slow", type: "SlowCounter", properties: { delay: "50" } },
            { name: "ticker", type: "Ticker", properties: { interval: "1" } },
        ],
    },
}"#;

fn wait_for(condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    condition()
}

/// Concurrent lookups of one component construct it exactly once.
#[test]
fn concurrent_lookups_share_one_instance() {
    let manager = Arc::new(manager_from(WORKERS));
    let threads = (0..8)
        .map(|_| {
            let manager = manager.clone();
            thread::spawn(move || {
                manager
                    .lookup("slow")
                    .expect("lookup slow")
                    .expect("slow present")
            })
        })
        .collect::<Vec<_>>();
    let handles = threads
        .into_iter()
        .map(|thread| thread.join().expect("lookup thread"))
        .collect::<Vec<ComponentHandle>>();

    for handle in &handles {
        assert!(handle.ptr_eq(&handles[0]));
    }
    assert_eq!(
        handles[0].with(|counter: &SlowCounter| counter.configured),
        Some(1)
    );
}

/// A startable component runs on its own thread until cancelled.
#[test]
fn worker_runs_until_cancelled() {
    let manager = manager_from(WORKERS);
    assert_eq!(manager.is_done("ticker"), None);
    let ticker = manager
        .lookup_as::<Ticker>("ticker")
        .expect("lookup ticker")
        .expect("ticker present");

    assert!(wait_for(|| ticker.read().ticks() > 0));
    assert_eq!(manager.is_done("ticker"), Some(false));

    assert!(manager.cancel("ticker"));
    assert!(manager.join("ticker").expect("join ticker"));
    assert_eq!(manager.is_done("ticker"), Some(true));

    let settled = ticker.read().ticks();
    thread::sleep(Duration::from_millis(10));
    assert_eq!(ticker.read().ticks(), settled);
}

/// Components without a task get no worker.
#[test]
fn plain_components_have_no_worker() {
    let manager = manager_from(WORKERS);
    manager.lookup("slow").expect("lookup").expect("present");
    assert_eq!(manager.is_done("slow"), None);
    assert!(!manager.cancel("slow"));
    assert!(!manager.join("slow").expect("join"));
}

/// Removing a component leaves its worker running until shutdown stops it.
#[test]
fn remove_keeps_worker_and_shutdown_stops_it() {
    let manager = manager_from(WORKERS);
    let ticker = manager
        .lookup_as::<Ticker>("ticker")
        .expect("lookup ticker")
        .expect("ticker present");
    assert!(manager.remove("ticker"));
    assert!(wait_for(|| ticker.read().ticks() > 0));
    assert_eq!(manager.is_done("ticker"), Some(false));

    manager.shutdown();
    assert!(manager.join("ticker").expect("join ticker"));
    // The evicted component's worker entry is dropped once it exits.
    assert_eq!(manager.is_done("ticker"), None);
}

/// Closing cancels and joins every worker.
#[test]
fn close_stops_and_joins_workers() {
    let manager = manager_from(WORKERS);
    let ticker = manager
        .lookup_as::<Ticker>("ticker")
        .expect("lookup ticker")
        .expect("ticker present");
    assert!(wait_for(|| ticker.read().ticks() > 0));

    manager.close().expect("close");
    assert_eq!(manager.is_done("ticker"), Some(true));
    let settled = ticker.read().ticks();
    thread::sleep(Duration::from_millis(10));
    assert_eq!(ticker.read().ticks(), settled);
}

/// A renamed component keeps its worker under the new name.
#[test]
fn rename_moves_worker() {
    let manager = manager_from(WORKERS);
    manager.lookup("ticker").expect("lookup").expect("present");
    manager.rename("ticker", "metronome").expect("rename");
    assert_eq!(manager.is_done("ticker"), None);
    assert!(manager.cancel("metronome"));
    assert!(manager.join("metronome").expect("join"));
}
