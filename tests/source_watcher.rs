// tests/source_watcher.rs

mod common;
use crate::common::builders::okay_record;
use crate::common::{initial_mtime, init_tracing, FakeRunner, Harness};

use std::sync::Arc;
use std::time::Duration;

use bqexporter::errors::ExporterError;
use bqexporter::types::{UnregisterFailurePolicy, ValueKind};

const QUERY: &str = "queries/bq_test.sql";

fn harness() -> Harness {
    init_tracing();
    let h = Harness::new(FakeRunner::returning(vec![okay_record()]));
    h.write_query(QUERY, "SELECT 1");
    h
}

#[test]
fn first_observation_reports_modified_then_settles() {
    let h = harness();
    let mut source = h.source(QUERY, ValueKind::Gauge);

    assert!(source.last_modified().is_none());
    assert!(source.is_modified().unwrap());
    assert_eq!(source.last_modified(), Some(initial_mtime()));
    assert!(!source.is_modified().unwrap());
}

#[test]
fn only_strictly_newer_mtime_counts() {
    let h = harness();
    let mut source = h.source(QUERY, ValueKind::Gauge);
    source.is_modified().unwrap();

    // Older mtime: not a change, and the stored value does not move back.
    h.fs.set_modified(QUERY, initial_mtime() - Duration::from_secs(10));
    assert!(!source.is_modified().unwrap());
    assert_eq!(source.last_modified(), Some(initial_mtime()));

    h.fs.set_modified(QUERY, initial_mtime());
    assert!(!source.is_modified().unwrap());

    h.edit_query(QUERY, "SELECT 2");
    assert!(source.is_modified().unwrap());
    assert_eq!(
        source.last_modified(),
        Some(initial_mtime() + Duration::from_secs(1))
    );
}

#[test]
fn stat_failure_is_an_error_and_keeps_stored_mtime() {
    let h = harness();
    let mut source = h.source(QUERY, ValueKind::Gauge);
    source.is_modified().unwrap();

    h.fs.fail_stat(QUERY);
    assert!(source.is_modified().is_err());
    assert_eq!(source.last_modified(), Some(initial_mtime()));

    h.fs.restore_stat(QUERY);
    assert!(!source.is_modified().unwrap());
}

#[test]
fn registering_runs_the_first_query_through_describe() {
    let h = harness();
    let mut source = h.source(QUERY, ValueKind::Gauge);
    let cache = Arc::new(h.factory().build(&source).unwrap());

    source.register(cache.clone()).unwrap();

    assert_eq!(h.runner.calls(), 1);
    assert!(h.registry.is_registered(&cache));
    assert!(Arc::ptr_eq(source.active().unwrap(), &cache));
    assert_eq!(cache.metric_name(), "bq_test");
}

#[test]
fn re_registering_swaps_out_the_previous_cache() {
    let h = harness();
    let mut source = h.source(QUERY, ValueKind::Gauge);
    let factory = h.factory();
    let first = Arc::new(factory.build(&source).unwrap());
    let second = Arc::new(factory.build(&source).unwrap());

    source.register(first.clone()).unwrap();
    source.register(second.clone()).unwrap();

    assert!(!h.registry.is_registered(&first));
    assert!(h.registry.is_registered(&second));
    assert_eq!(h.registry.active_count(), 1);
}

#[test]
fn unregistering_without_a_collector_is_a_no_op() {
    let h = harness();
    let mut source = h.source(QUERY, ValueKind::Gauge);

    source.unregister().unwrap();
    assert!(source.update().unwrap().is_none());
}

#[test]
fn unregister_then_unregister_again() {
    let h = harness();
    let mut source = h.source(QUERY, ValueKind::Gauge);
    let cache = Arc::new(h.factory().build(&source).unwrap());
    source.register(cache).unwrap();

    source.unregister().unwrap();
    assert_eq!(h.registry.active_count(), 0);
    assert!(source.active().is_none());
    source.unregister().unwrap();
}

#[test]
fn unregister_failure_during_register_leaves_nothing_owned() {
    let h = harness();
    let mut source = h.source(QUERY, ValueKind::Gauge);
    source.is_modified().unwrap();
    let factory = h.factory();
    source.register(Arc::new(factory.build(&source).unwrap())).unwrap();

    h.registry.refuse_unregister(true);
    let replacement = Arc::new(factory.build(&source).unwrap());
    let err = source.register(replacement.clone()).unwrap_err();

    assert!(matches!(err, ExporterError::UnregisterFailed(_)));
    assert!(err.is_fatal_for_source());
    assert!(source.active().is_none());
    assert!(!h.registry.is_registered(&replacement));
    // Default policy keeps the timestamp: no retry until the file changes.
    assert_eq!(source.last_modified(), Some(initial_mtime()));
    assert!(!source.is_modified().unwrap());
}

#[test]
fn reset_policy_forgets_timestamp_after_unregister_failure() {
    let h = harness();
    let mut source = h
        .source(QUERY, ValueKind::Gauge)
        .with_unregister_policy(UnregisterFailurePolicy::ResetTimestamp);
    source.is_modified().unwrap();
    let factory = h.factory();
    source.register(Arc::new(factory.build(&source).unwrap())).unwrap();

    h.registry.refuse_unregister(true);
    assert!(source.register(Arc::new(factory.build(&source).unwrap())).is_err());

    assert!(source.last_modified().is_none());
    assert!(source.is_modified().unwrap());
}

#[test]
fn refused_registration_adopts_nothing() {
    let h = harness();
    let mut source = h.source(QUERY, ValueKind::Gauge);
    h.registry.refuse_register(true);

    let cache = Arc::new(h.factory().build(&source).unwrap());
    let err = source.register(cache).unwrap_err();

    assert!(matches!(err, ExporterError::RegisterFailed { .. }));
    assert!(source.active().is_none());
    assert_eq!(h.runner.calls(), 0);
}

#[test]
fn update_delegates_to_the_owned_cache() {
    let h = harness();
    let mut source = h.source(QUERY, ValueKind::Counter);
    let cache = Arc::new(h.factory().build(&source).unwrap());
    source.register(cache.clone()).unwrap();

    assert!(source.update().unwrap().is_some());
    assert_eq!(cache.kind(), ValueKind::Counter);
    assert_eq!(h.runner.calls(), 1);
}
