//! Reconciliation engine
//!
//! The Reconciler is responsible for:
//! - Fetching fresh remote state on every pass (never cached)
//! - Computing the minimal change set against the desired addresses
//! - Issuing provider writes only when something differs
//!
//! ## Architecture
//!
//! ```text
//!  DesiredSet ──► ┌────────────┐
//!                 │ Reconciler │
//!                 └────────────┘
//!                       │ match Backend
//!          ┌────────────┴─────────────┐
//!          ▼                          ▼
//! ┌──────────────────┐     ┌──────────────────────┐
//! │ AllowListProvider│     │ SecurityRuleProvider │
//! │ fetch → diff →   │     │ fetch → select →     │
//! │ create + delete  │     │ replace (one call)   │
//! └──────────────────┘     └──────────────────────┘
//! ```
//!
//! ## Failure
//!
//! Any fetch or apply error aborts the pass and is returned unchanged. There
//! is no retry here; re-running reconciliation recomputes from fresh state.

pub mod diff;
pub mod rules;

use std::sync::Arc;

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::model::{DesiredSet, ReconcileOutcome};
use crate::traits::{AllowListProvider, Backend, SecurityRuleProvider};

pub use diff::compute_diff;
pub use rules::select_rules;

/// Converges a remote allow-list towards a desired address set
#[derive(Debug, Clone)]
pub struct Reconciler {
    backend: Backend,
}

impl Reconciler {
    /// Create a reconciler for the configured backend
    pub fn new(backend: Backend) -> Self {
        Self { backend }
    }

    /// Get the provider name
    pub fn provider_name(&self) -> &'static str {
        self.backend.provider_name()
    }

    /// Run one reconciliation pass
    ///
    /// # Returns
    ///
    /// - `Ok(ReconcileOutcome::Unchanged)`: Remote state already matched
    /// - `Ok(ReconcileOutcome::Applied { .. })` / `Replaced { .. }`: Writes issued
    /// - `Err(Error)`: Resolution or provider failure, surfaced verbatim
    pub async fn reconcile(&self, desired: &DesiredSet) -> Result<ReconcileOutcome> {
        // An empty desired set would wipe the list
        if desired.is_empty() {
            return Err(Error::resolution("No addresses to allow"));
        }

        info!("Desired addresses: {}", desired);

        match &self.backend {
            Backend::List(provider) => self.reconcile_list(provider, desired).await,
            Backend::Rules(provider) => self.reconcile_rules(provider, desired).await,
        }
    }

    async fn reconcile_list(
        &self,
        provider: &Arc<dyn AllowListProvider>,
        desired: &DesiredSet,
    ) -> Result<ReconcileOutcome> {
        let current = provider.fetch_current().await?;
        debug!(
            "Fetched {} entries from {}",
            current.len(),
            provider.provider_name()
        );

        let diff = compute_diff(desired, &current);

        let to_add: Vec<String> = diff.to_add.iter().map(|ip| ip.to_string()).collect();
        let to_remove: Vec<String> = diff
            .to_remove
            .iter()
            .map(|e| format!("{} ({})", e.address, e.id))
            .collect();
        info!("To add: {:?} To remove: {:?}", to_add, to_remove);

        if diff.is_empty() {
            debug!("Allow-list already converged, no writes issued");
            return Ok(ReconcileOutcome::Unchanged);
        }

        provider.apply_diff(&diff).await?;

        Ok(ReconcileOutcome::Applied {
            added: diff.to_add.len(),
            removed: diff.to_remove.len(),
        })
    }

    async fn reconcile_rules(
        &self,
        provider: &Arc<dyn SecurityRuleProvider>,
        desired: &DesiredSet,
    ) -> Result<ReconcileOutcome> {
        let address = desired
            .primary()
            .ok_or_else(|| Error::resolution("No addresses to allow"))?;

        if desired.len() > 1 {
            info!(
                "{} applies a single address; using {} out of {}",
                provider.provider_name(),
                address,
                desired
            );
        }

        let rules = provider.fetch_rules().await?;
        let updated = select_rules(&rules, address, provider.allowed_ports());

        info!(
            "Rewriting {} of {} rules to source {}",
            updated.len(),
            rules.len(),
            address
        );

        if updated.is_empty() {
            debug!("No rule matches ports {:?}", provider.allowed_ports());
            return Ok(ReconcileOutcome::Unchanged);
        }

        provider.replace_rules(&updated).await?;

        Ok(ReconcileOutcome::Replaced {
            rules: updated.len(),
        })
    }
}
