//! Architectural Contract Test: Rule Replacement
//!
//! This test verifies the rule-based reconciliation path.
//!
//! Constraints verified:
//! - Only rules whose TCP destination-port minimum is allowed are submitted
//! - Submitted rules carry the desired address as a host CIDR
//! - Everything else in a submitted rule is preserved
//! - Exactly one replace call per pass; none when no rule matches
//! - Only the first resolved address is applied
//!
//! If this test fails, rule rewriting is broken.

mod common;

use allowsync_core::Reconciler;
use allowsync_core::model::{DEFAULT_ALLOWED_PORTS, DesiredSet, ReconcileOutcome};
use allowsync_core::traits::Backend;
use common::*;
use std::sync::Arc;
use tokio_test::assert_ok;

fn reconciler_for(provider: &MockRuleProvider) -> Reconciler {
    Reconciler::new(Backend::Rules(Arc::new(
        MockRuleProvider::sharing_counters_with(provider),
    )))
}

#[tokio::test]
async fn only_port_matched_rules_are_submitted_with_host_cidr() {
    let provider = MockRuleProvider::new(
        vec![
            tcp_rule("web", 80, "0.0.0.0/0"),
            tcp_rule("ssh", 22, "10.0.0.0/8"),
            tcp_rule("tls", 443, "1.1.1.1/32"),
        ],
        &DEFAULT_ALLOWED_PORTS,
    );
    let reconciler = reconciler_for(&provider);

    let outcome = assert_ok!(reconciler.reconcile(&DesiredSet::single(ip("5.6.7.8"))).await);

    assert_eq!(outcome, ReconcileOutcome::Replaced { rules: 2 });
    assert_eq!(provider.replace_call_count(), 1);

    let submitted = &provider.submitted()[0];
    let ids: Vec<&str> = submitted.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["web", "tls"]);
    assert!(submitted.iter().all(|r| r.source.as_deref() == Some("5.6.7.8/32")));
    assert_eq!(submitted[0].details["direction"], "INGRESS");
    assert_eq!(submitted[0].tcp_destination_port_min, Some(80));
}

#[tokio::test]
async fn no_matching_rule_means_no_replace_call() {
    let provider =
        MockRuleProvider::new(vec![tcp_rule("ssh", 22, "10.0.0.0/8")], &DEFAULT_ALLOWED_PORTS);
    let reconciler = reconciler_for(&provider);

    let outcome = assert_ok!(reconciler.reconcile(&DesiredSet::single(ip("5.6.7.8"))).await);

    assert_eq!(outcome, ReconcileOutcome::Unchanged);
    assert_eq!(provider.fetch_call_count(), 1);
    assert_eq!(provider.replace_call_count(), 0);
}

#[tokio::test]
async fn first_resolved_address_wins() {
    let provider =
        MockRuleProvider::new(vec![tcp_rule("web", 80, "0.0.0.0/0")], &DEFAULT_ALLOWED_PORTS);
    let reconciler = reconciler_for(&provider);

    let mut desired = DesiredSet::new();
    desired.insert(ip("9.9.9.9"));
    desired.insert(ip("1.1.1.1"));

    assert_ok!(reconciler.reconcile(&desired).await);

    let submitted = &provider.submitted()[0];
    assert_eq!(submitted[0].source.as_deref(), Some("9.9.9.9/32"));
}

#[tokio::test]
async fn configured_ports_replace_the_defaults() {
    let provider = MockRuleProvider::new(
        vec![tcp_rule("web", 80, "0.0.0.0/0"), tcp_rule("alt", 8443, "0.0.0.0/0")],
        &[8443],
    );
    let reconciler = reconciler_for(&provider);

    let outcome = assert_ok!(reconciler.reconcile(&DesiredSet::single(ip("2001:db8::1"))).await);

    assert_eq!(outcome, ReconcileOutcome::Replaced { rules: 1 });
    let submitted = &provider.submitted()[0];
    assert_eq!(submitted[0].id, "alt");
    assert_eq!(submitted[0].source.as_deref(), Some("2001:db8::1/128"));
}
