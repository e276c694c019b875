//! Architectural Contract Test: Idempotency Gate
//!
//! This test verifies that the server-mode gate skips redundant work and
//! only ever caches addresses whose reconciliation succeeded.
//!
//! Constraints verified:
//! - A report equal to the cached address issues zero remote calls
//! - The cache is updated only after a successful reconciliation
//! - An invalid candidate never reaches the provider or the cache
//! - The cached address survives a restart
//! - Concurrent reports of the same new address reconcile once
//!
//! If this test fails, state management is broken.

mod common;

use allowsync_core::cache::{FileCacheStore, IdempotencyCache, MemoryCacheStore};
use allowsync_core::traits::{Backend, CacheStore};
use allowsync_core::{Error, Reconciler, ReportGate, ReportOutcome};
use common::*;
use std::sync::Arc;
use tempfile::tempdir;
use tokio_test::{assert_err, assert_ok};

fn gate_over(provider: &MockListProvider, store: Box<dyn CacheStore>) -> ReportGate {
    let reconciler = Reconciler::new(Backend::List(Arc::new(
        MockListProvider::sharing_counters_with(provider),
    )));
    ReportGate::new(reconciler, IdempotencyCache::new(store))
}

#[tokio::test]
async fn cached_address_is_skipped_without_remote_calls() {
    let provider = MockListProvider::with_entries(vec![("a", "1.2.3.4")]);
    let gate = gate_over(&provider, Box::new(MemoryCacheStore::with_address(ip("1.2.3.4"))));
    gate.cache().load().await;

    let outcome = assert_ok!(gate.report("1.2.3.4").await);

    assert_eq!(outcome, ReportOutcome::Skipped { address: ip("1.2.3.4") });
    assert_eq!(provider.total_calls(), 0);
}

#[tokio::test]
async fn new_address_is_reconciled_and_cached() {
    let provider = MockListProvider::with_entries(vec![("a", "1.2.3.4")]);
    let gate = gate_over(&provider, Box::new(MemoryCacheStore::with_address(ip("1.2.3.4"))));
    gate.cache().load().await;

    let outcome = assert_ok!(gate.report("9.9.9.9").await);

    assert!(matches!(
        outcome,
        ReportOutcome::Reconciled { address, .. } if address == ip("9.9.9.9")
    ));
    assert_eq!(gate.cache().cached().await, Some(ip("9.9.9.9")));
    assert_eq!(provider.addresses(), vec!["9.9.9.9".to_string()]);
}

#[tokio::test]
async fn failed_reconciliation_leaves_cache_untouched() {
    let provider = MockListProvider::new();
    provider.set_failing(true);
    let gate = gate_over(&provider, Box::new(MemoryCacheStore::with_address(ip("1.2.3.4"))));
    gate.cache().load().await;

    let err = assert_err!(gate.report("9.9.9.9").await);
    assert!(matches!(err, Error::ProviderUnavailable { .. }));
    assert_eq!(gate.cache().cached().await, Some(ip("1.2.3.4")));

    // A later success for the same address is not skipped
    provider.set_failing(false);
    let outcome = assert_ok!(gate.report("9.9.9.9").await);
    assert!(matches!(outcome, ReportOutcome::Reconciled { .. }));
    assert_eq!(gate.cache().cached().await, Some(ip("9.9.9.9")));
}

#[tokio::test]
async fn invalid_candidate_never_reaches_provider_or_cache() {
    let provider = MockListProvider::new();
    let gate = gate_over(&provider, Box::new(MemoryCacheStore::new()));

    for raw in ["not-an-ip", "", "1.2.3", "1.2.3.4/32"] {
        let err = assert_err!(gate.report(raw).await);
        assert!(matches!(err, Error::InvalidInput(_)), "{:?} should be rejected", raw);
    }

    assert_eq!(provider.total_calls(), 0);
    assert_eq!(gate.cache().cached().await, None);
}

#[tokio::test]
async fn cached_address_survives_restart() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("ip_cache");
    let provider = MockListProvider::new();

    {
        let gate = gate_over(&provider, Box::new(FileCacheStore::new(&path)));
        gate.cache().load().await;
        assert_ok!(gate.report("5.6.7.8").await);
    }
    let calls_before_restart = provider.total_calls();

    let gate = gate_over(&provider, Box::new(FileCacheStore::new(&path)));
    assert_eq!(gate.cache().load().await, Some(ip("5.6.7.8")));

    let outcome = assert_ok!(gate.report("5.6.7.8").await);
    assert!(matches!(outcome, ReportOutcome::Skipped { .. }));
    assert_eq!(provider.total_calls(), calls_before_restart);
}

#[tokio::test]
async fn concurrent_reports_of_same_address_reconcile_once() {
    let provider = MockListProvider::new();
    let gate = Arc::new(gate_over(&provider, Box::new(MemoryCacheStore::new())));

    let (first, second) = tokio::join!(gate.report("7.7.7.7"), gate.report("7.7.7.7"));
    let first = assert_ok!(first);
    let second = assert_ok!(second);

    let reconciled = [first, second]
        .iter()
        .filter(|o| matches!(o, ReportOutcome::Reconciled { .. }))
        .count();
    assert_eq!(reconciled, 1);
    assert_eq!(provider.fetch_call_count(), 1);
}
