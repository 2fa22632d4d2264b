//! Lifecycle tests for the thread-based service.
//!
//! Mirrors the asynchronous suite where the concurrency primitive matters:
//! load/reload atomicity, watch discipline, cooperative shutdown, and
//! snapshot isolation across OS threads.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod common;

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use orgmap_core::MemorySource;
use orgmap_service::blocking::Service;
use orgmap_service::{LoadError, RetryPolicy, WatchError};

fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    false
}

#[test]
fn load_once_populates_store_and_version() {
    let source = MemorySource::new(common::fixture_bytes());
    let service = Service::new();

    assert!(!service.is_ready());
    service.load_once(&source).expect("load should succeed");

    assert!(service.is_loaded());
    assert!(service.is_ready());
    let version = service.version().expect("version should be present");
    assert_eq!(version.count("employees"), 3);
    assert_eq!(
        service
            .employee_by_uid("jsmith")
            .expect("employee should exist")
            .full_name,
        "Jane Smith"
    );
}

#[test]
fn failed_reload_preserves_previous_snapshot_exactly() {
    let source = MemorySource::new(common::fixture_bytes());
    let service = Service::with_retry_policy(RetryPolicy::no_retries());
    service.load_once(&source).expect("load should succeed");
    let version_before = service.version().expect("version should be present");

    source.set_data("not json");
    let err = service.load_once(&source).expect_err("should fail");
    assert!(matches!(err, LoadError::Parse { .. }));
    assert_eq!(service.version(), Some(version_before.clone()));

    source.set_data(common::fixture_without_employees_bytes());
    let err = service.load_once(&source).expect_err("should fail");
    assert!(matches!(err, LoadError::Structural { .. }));
    assert_eq!(service.version(), Some(version_before));
    assert!(service.employee_by_uid("jsmith").is_some());
}

#[test]
fn retry_budget_is_honored() {
    let source = MemorySource::new(common::fixture_bytes());
    source.fail_next_fetches(2, "blip");
    let service = Service::with_retry_policy(RetryPolicy {
        max_retries: 2,
        initial_delay: Duration::from_millis(1),
        backoff_multiplier: 2,
    });

    service.load_once(&source).expect("load should succeed");
    assert_eq!(source.fetch_count(), 3);
}

#[test]
fn second_watch_on_same_instance_is_rejected() {
    let source = Arc::new(MemorySource::new(common::fixture_bytes()));
    let service = Service::new();

    service
        .start_watch(source.clone())
        .expect("start should succeed");
    assert!(service.is_watching());
    let err = service
        .start_watch(source)
        .expect_err("second start should fail");
    assert!(matches!(err, WatchError::AlreadyRunning));

    service.stop_watch();
    assert!(!service.is_watching());
}

#[test]
fn watch_reloads_when_source_signals_change() {
    let source = Arc::new(MemorySource::new(common::fixture_bytes()));
    let service = Service::new();
    service
        .start_watch(source.clone())
        .expect("start should succeed");
    assert!(service.employee_by_uid("newhire").is_none());

    source.set_data(common::fixture_with_newhire_bytes());
    source.signal_change();

    assert!(
        wait_until(|| service.employee_by_uid("newhire").is_some()),
        "reload should have installed the new snapshot"
    );
    service.stop_watch();
}

#[test]
fn failed_background_reload_keeps_last_good_snapshot() {
    let source = Arc::new(MemorySource::new(common::fixture_bytes()));
    let service = Service::with_retry_policy(RetryPolicy::no_retries());
    service
        .start_watch(source.clone())
        .expect("start should succeed");
    let version = service.version().expect("version should be present");

    // The second fetch (the reload) fails.
    source.fail_next_fetches(1, "storage down");
    source.signal_change();
    assert!(
        wait_until(|| source.fetch_count() >= 2),
        "the watch should have attempted a reload"
    );

    service.stop_watch();

    let employee = service
        .employee_by_uid("jsmith")
        .expect("employee should still be served");
    assert_eq!(employee.full_name, "Jane Smith");
    assert_eq!(service.version(), Some(version));
}

#[test]
fn stop_watch_is_idempotent_and_blocks_late_swaps() {
    let source = Arc::new(MemorySource::new(common::fixture_bytes()));
    let service = Service::new();
    service
        .start_watch(source.clone())
        .expect("start should succeed");
    let version = service.version().expect("version should be present");

    service.stop_watch();
    service.stop_watch();

    source.set_data(common::fixture_with_newhire_bytes());
    source.signal_change();
    thread::sleep(Duration::from_millis(100));

    assert_eq!(service.version(), Some(version));
    assert!(service.employee_by_uid("newhire").is_none());
}

#[test]
fn held_snapshot_is_isolated_from_concurrent_reloads() {
    let source = Arc::new(MemorySource::new(common::fixture_bytes()));
    let service = Arc::new(Service::new());
    service
        .load_once(source.as_ref())
        .expect("load should succeed");

    let held = service.current().expect("snapshot should be loaded");
    let first_version = held.version.clone();

    let reloader = {
        let service = Arc::clone(&service);
        let source = Arc::clone(&source);
        thread::spawn(move || {
            for _ in 0..20 {
                service
                    .load_once(source.as_ref())
                    .expect("reload should succeed");
            }
        })
    };

    for _ in 0..20 {
        assert_eq!(held.version, first_version);
        assert!(held.snapshot.employee_by_uid("jsmith").is_some());
        thread::yield_now();
    }

    reloader.join().expect("reloader should finish");
    let fresh = service.current().expect("snapshot should be loaded");
    assert_ne!(fresh.version.loaded_at, first_version.loaded_at);
}
