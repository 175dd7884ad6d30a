//! Tests for the background expiration driver on paused tokio time.

use raft_purgatory::core::config::DriverConfig;
use raft_purgatory::core::error::PurgatoryError;
use raft_purgatory::core::time::{Clock, SystemClock, Tick};
use raft_purgatory::purgatory::deferred::Promise;
use raft_purgatory::purgatory::driver::ExpirationDriver;
use raft_purgatory::purgatory::Purgatory;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

fn system_purgatory() -> (Arc<SystemClock>, Arc<Purgatory<u64>>) {
    let clock = Arc::new(SystemClock::new());
    let purgatory = Purgatory::new(clock.clone());
    (clock, purgatory)
}

#[tokio::test(start_paused = true)]
async fn driver_expires_at_deadline() {
    let (clock, purgatory) = system_purgatory();
    let handle = ExpirationDriver::spawn(purgatory.clone(), DriverConfig::default());

    let promise = Promise::new();
    purgatory.await_result(promise.clone(), 500);

    let outcome = promise.wait().await;
    assert!(
        matches!(outcome, Err(PurgatoryError::Timeout { timeout_ms: 500, .. })),
        "{:?}",
        outcome
    );
    assert!(clock.now().is_at_or_after(Tick::new(500)));
    assert_eq!(purgatory.num_waiting(), 0);

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn earlier_registration_wakes_sleeping_driver() {
    let (clock, purgatory) = system_purgatory();
    let handle = ExpirationDriver::spawn(purgatory.clone(), DriverConfig::default());

    let slow = Promise::new();
    purgatory.await_result(slow.clone(), 10_000);
    // Let the driver settle into its long sleep.
    tokio::time::sleep(Duration::from_millis(10)).await;

    let fast = Promise::new();
    purgatory.await_result(fast.clone(), 100);
    assert!(fast.wait().await.unwrap_err().is_timeout());

    assert!(clock.now().ms < 10_000);
    assert!(!slow.is_done());
    assert_eq!(purgatory.num_waiting(), 1);

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn completion_wins_over_running_driver() {
    let (_clock, purgatory) = system_purgatory();
    let handle = ExpirationDriver::spawn(purgatory.clone(), DriverConfig::default());

    let promise = Promise::new();
    purgatory.await_result(promise.clone(), 1_000);
    tokio::time::sleep(Duration::from_millis(400)).await;

    assert_eq!(purgatory.complete_all(11), 1);
    assert_eq!(promise.wait().await, Ok(11));

    tokio::time::sleep(Duration::from_millis(2_000)).await;
    assert_eq!(promise.outcome(), Some(Ok(11)));
    assert_eq!(purgatory.stats().expired, 0);

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn shutdown_stops_driver_and_leaves_entries() {
    let (_clock, purgatory) = system_purgatory();
    let config = DriverConfig { idle_wait_ms: 50 };
    let handle = ExpirationDriver::spawn(purgatory.clone(), config);

    let promise = Promise::new();
    purgatory.await_result(promise.clone(), 5_000);
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(!handle.is_finished());

    handle.shutdown().await;
    tokio::time::sleep(Duration::from_millis(10_000)).await;

    assert!(!promise.is_done());
    assert_eq!(purgatory.num_waiting(), 1);
}

#[tokio::test(start_paused = true)]
async fn driver_with_idle_wait_keeps_sweeping() {
    let (_clock, purgatory) = system_purgatory();
    let config = DriverConfig { idle_wait_ms: 25 };
    let handle = ExpirationDriver::spawn(purgatory.clone(), config);

    tokio::time::sleep(Duration::from_millis(100)).await;
    let promises: Vec<_> = [30u64, 60, 90]
        .iter()
        .map(|t| {
            let p = Promise::new();
            purgatory.await_result(p.clone(), *t);
            p
        })
        .collect();

    for promise in &promises {
        assert!(promise.wait().await.unwrap_err().is_timeout());
    }
    assert_eq!(purgatory.stats().expired, 3);

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn driver_stops_when_shutdown_sender_is_dropped() {
    let (_clock, purgatory) = system_purgatory();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let driver = ExpirationDriver::new(purgatory.clone(), DriverConfig::default(), shutdown_rx);
    let task = tokio::spawn(driver.run());

    purgatory.await_result(Promise::new(), 5_000);
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(!task.is_finished());

    drop(shutdown_tx);
    tokio::time::timeout(Duration::from_millis(100), task)
        .await
        .expect("driver did not stop")
        .expect("driver task panicked");
    assert_eq!(purgatory.num_waiting(), 1);
}

#[tokio::test(start_paused = true)]
async fn dropping_handle_stops_driver() {
    let (_clock, purgatory) = system_purgatory();
    let handle = ExpirationDriver::spawn(purgatory.clone(), DriverConfig::default());
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(Arc::strong_count(&purgatory), 2);

    drop(handle);
    tokio::time::sleep(Duration::from_millis(10)).await;
    // The exited task has released its reference.
    assert_eq!(Arc::strong_count(&purgatory), 1);
}
