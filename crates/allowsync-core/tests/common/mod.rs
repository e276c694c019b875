//! Test doubles and common utilities for architecture contract tests
//!
//! These doubles keep just enough state to observe what the reconciler and
//! the gate asked of them. Clones made with `sharing_counters_with` see the
//! same counters and remote state, so a test can hand one copy to the code
//! under test and keep the other for assertions.

#![allow(dead_code)]

use allowsync_core::error::{Error, Result};
use allowsync_core::model::{AllowListEntry, Diff, SecurityRule};
use allowsync_core::traits::{AllowListProvider, NameResolver, SecurityRuleProvider};
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// A list-based provider backed by an in-memory list
pub struct MockListProvider {
    /// Remote list contents
    entries: Arc<Mutex<Vec<AllowListEntry>>>,
    /// Call counter for fetch_current()
    fetch_call_count: Arc<AtomicUsize>,
    /// Number of create-items calls issued by apply_diff()
    create_call_count: Arc<AtomicUsize>,
    /// Number of delete-items calls issued by apply_diff()
    delete_call_count: Arc<AtomicUsize>,
    /// Every diff passed to apply_diff()
    applied: Arc<Mutex<Vec<Diff>>>,
    /// When set, every call fails with ProviderUnavailable
    failing: Arc<AtomicBool>,
    /// When set, apply_diff() creates its additions, then fails the delete call
    fail_deletes: Arc<AtomicBool>,
    /// Next generated entry id
    next_id: Arc<AtomicUsize>,
}

impl MockListProvider {
    pub fn new() -> Self {
        Self::with_entries(Vec::new())
    }

    /// Create a provider whose list already holds `(id, address)` pairs
    pub fn with_entries(entries: Vec<(&str, &str)>) -> Self {
        let entries = entries
            .into_iter()
            .map(|(id, address)| AllowListEntry::new(id, address))
            .collect();

        Self {
            entries: Arc::new(Mutex::new(entries)),
            fetch_call_count: Arc::new(AtomicUsize::new(0)),
            create_call_count: Arc::new(AtomicUsize::new(0)),
            delete_call_count: Arc::new(AtomicUsize::new(0)),
            applied: Arc::new(Mutex::new(Vec::new())),
            failing: Arc::new(AtomicBool::new(false)),
            fail_deletes: Arc::new(AtomicBool::new(false)),
            next_id: Arc::new(AtomicUsize::new(1)),
        }
    }

    /// Create a new MockListProvider that shares counters with an existing one
    pub fn sharing_counters_with(other: &Self) -> Self {
        Self {
            entries: Arc::clone(&other.entries),
            fetch_call_count: Arc::clone(&other.fetch_call_count),
            create_call_count: Arc::clone(&other.create_call_count),
            delete_call_count: Arc::clone(&other.delete_call_count),
            applied: Arc::clone(&other.applied),
            failing: Arc::clone(&other.failing),
            fail_deletes: Arc::clone(&other.fail_deletes),
            next_id: Arc::clone(&other.next_id),
        }
    }

    /// Make every subsequent call fail (or succeed again)
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Make delete calls fail after the create call went through
    pub fn set_fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    pub fn fetch_call_count(&self) -> usize {
        self.fetch_call_count.load(Ordering::SeqCst)
    }

    pub fn create_call_count(&self) -> usize {
        self.create_call_count.load(Ordering::SeqCst)
    }

    pub fn delete_call_count(&self) -> usize {
        self.delete_call_count.load(Ordering::SeqCst)
    }

    /// Total remote calls of any kind
    pub fn total_calls(&self) -> usize {
        self.fetch_call_count() + self.create_call_count() + self.delete_call_count()
    }

    /// Diffs passed to apply_diff(), in call order
    pub fn applied(&self) -> Vec<Diff> {
        self.applied.lock().unwrap().clone()
    }

    /// Current remote addresses, in list order
    pub fn addresses(&self) -> Vec<String> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.address.clone())
            .collect()
    }

    fn check_failing(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::provider("mock-list", "Service unavailable"));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl AllowListProvider for MockListProvider {
    async fn fetch_current(&self) -> Result<Vec<AllowListEntry>> {
        self.fetch_call_count.fetch_add(1, Ordering::SeqCst);
        self.check_failing()?;
        Ok(self.entries.lock().unwrap().clone())
    }

    async fn apply_diff(&self, diff: &Diff) -> Result<()> {
        self.check_failing()?;
        self.applied.lock().unwrap().push(diff.clone());

        let mut entries = self.entries.lock().unwrap();

        if !diff.to_add.is_empty() {
            self.create_call_count.fetch_add(1, Ordering::SeqCst);
            for ip in &diff.to_add {
                let id = format!("gen-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
                entries.push(AllowListEntry::new(id, &ip.to_string()));
            }
        }

        if !diff.to_remove.is_empty() {
            self.delete_call_count.fetch_add(1, Ordering::SeqCst);
            if self.fail_deletes.load(Ordering::SeqCst) {
                return Err(Error::provider("mock-list", "Delete items failed"));
            }
            entries.retain(|e| !diff.to_remove.iter().any(|r| r.id == e.id));
        }

        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "mock-list"
    }
}

/// A rule-based provider that records every replace call
pub struct MockRuleProvider {
    rules: Arc<Mutex<Vec<SecurityRule>>>,
    fetch_call_count: Arc<AtomicUsize>,
    replace_call_count: Arc<AtomicUsize>,
    /// Rule lists submitted to replace_rules(), in call order
    submitted: Arc<Mutex<Vec<Vec<SecurityRule>>>>,
    allowed_ports: Vec<u16>,
}

impl MockRuleProvider {
    pub fn new(rules: Vec<SecurityRule>, allowed_ports: &[u16]) -> Self {
        Self {
            rules: Arc::new(Mutex::new(rules)),
            fetch_call_count: Arc::new(AtomicUsize::new(0)),
            replace_call_count: Arc::new(AtomicUsize::new(0)),
            submitted: Arc::new(Mutex::new(Vec::new())),
            allowed_ports: allowed_ports.to_vec(),
        }
    }

    /// Create a new MockRuleProvider that shares counters with an existing one
    pub fn sharing_counters_with(other: &Self) -> Self {
        Self {
            rules: Arc::clone(&other.rules),
            fetch_call_count: Arc::clone(&other.fetch_call_count),
            replace_call_count: Arc::clone(&other.replace_call_count),
            submitted: Arc::clone(&other.submitted),
            allowed_ports: other.allowed_ports.clone(),
        }
    }

    pub fn fetch_call_count(&self) -> usize {
        self.fetch_call_count.load(Ordering::SeqCst)
    }

    pub fn replace_call_count(&self) -> usize {
        self.replace_call_count.load(Ordering::SeqCst)
    }

    pub fn submitted(&self) -> Vec<Vec<SecurityRule>> {
        self.submitted.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl SecurityRuleProvider for MockRuleProvider {
    async fn fetch_rules(&self) -> Result<Vec<SecurityRule>> {
        self.fetch_call_count.fetch_add(1, Ordering::SeqCst);
        Ok(self.rules.lock().unwrap().clone())
    }

    async fn replace_rules(&self, rules: &[SecurityRule]) -> Result<()> {
        self.replace_call_count.fetch_add(1, Ordering::SeqCst);
        self.submitted.lock().unwrap().push(rules.to_vec());
        Ok(())
    }

    fn allowed_ports(&self) -> &[u16] {
        &self.allowed_ports
    }

    fn provider_name(&self) -> &'static str {
        "mock-rules"
    }
}

/// A resolver answering from a fixed table
///
/// Unknown names fail with a resolution error.
pub struct StaticResolver {
    table: HashMap<String, Vec<IpAddr>>,
    resolve_call_count: Arc<AtomicUsize>,
}

impl StaticResolver {
    pub fn new(entries: Vec<(&str, Vec<&str>)>) -> Self {
        let table = entries
            .into_iter()
            .map(|(name, ips)| {
                let ips = ips.into_iter().map(|ip| ip.parse().unwrap()).collect();
                (name.to_string(), ips)
            })
            .collect();

        Self {
            table,
            resolve_call_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn resolve_call_count(&self) -> usize {
        self.resolve_call_count.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl NameResolver for StaticResolver {
    async fn resolve(&self, host: &str) -> Result<Vec<IpAddr>> {
        self.resolve_call_count.fetch_add(1, Ordering::SeqCst);
        self.table
            .get(host)
            .cloned()
            .ok_or_else(|| Error::resolution(format!("no such host: {}", host)))
    }
}

/// Build a rule with a TCP destination-port minimum
pub fn tcp_rule(id: &str, port: u16, source: &str) -> SecurityRule {
    SecurityRule {
        id: id.to_string(),
        source: Some(source.to_string()),
        tcp_destination_port_min: Some(port),
        details: serde_json::json!({
            "id": id,
            "direction": "INGRESS",
            "protocol": "6",
            "source": source,
            "sourceType": "CIDR_BLOCK",
            "tcpOptions": { "destinationPortRange": { "min": port, "max": port } }
        }),
    }
}

pub fn ip(s: &str) -> IpAddr {
    s.parse().unwrap()
}
