// # Allow-list Provider Traits
//
// Defines the two capability interfaces a remote allow-list can offer.
//
// ## Variants
//
// - List-based (`AllowListProvider`): a discrete store of IP items that can be
//   created and deleted individually. Cloudflare IP lists work this way.
// - Rule-based (`SecurityRuleProvider`): a list of security rules whose source
//   CIDR is rewritten and submitted back in a single replace call. OCI Network
//   Security Groups work this way.
//
// The variants are kept apart on purpose. A list backend converges additively
// through two independent calls; a rule backend overwrites in one call and can
// only carry a single address. [`Backend`] is the tagged union the reconciler
// dispatches on.
//
// ## Implementations
//
// - Cloudflare: `allowsync-provider-cloudflare` crate
// - OCI: `allowsync-provider-oci` crate

use async_trait::async_trait;
use std::sync::Arc;

use crate::model::{AllowListEntry, Diff, SecurityRule};

/// A discrete IP-list store
///
/// # Trust Level: Untrusted
///
/// ## Allowed Capabilities
/// - ✅ Perform HTTP/HTTPS API calls to their endpoints only
/// - ✅ Retry idempotent reads according to the transport policy fixed at construction
/// - ✅ Parse provider-specific responses
///
/// ## Forbidden Capabilities
/// - ❌ Decide what to add or remove (owned by `Reconciler`)
/// - ❌ Retry writes (a partial apply is recovered by re-running reconciliation)
/// - ❌ Access the idempotency cache (owned by the server trigger)
/// - ❌ Cache remote state between calls
#[async_trait]
pub trait AllowListProvider: Send + Sync {
    /// Fetch every entry currently in the list
    ///
    /// # Returns
    ///
    /// - `Ok(Vec<AllowListEntry>)`: All entries, in provider order
    /// - `Err(Error::ProviderUnavailable)`: Transport, auth or API failure
    async fn fetch_current(&self) -> Result<Vec<AllowListEntry>, crate::Error>;

    /// Apply a diff to the list
    ///
    /// Issues a create call for `to_add` and a delete call for `to_remove`,
    /// each only if non-empty. The two calls are independent: the first may
    /// succeed while the second fails. Callers treat the operation as
    /// non-transactional and recover by reconciling again.
    async fn apply_diff(&self, diff: &Diff) -> Result<(), crate::Error>;

    /// Get the provider name (for logging/debugging)
    fn provider_name(&self) -> &'static str;
}

/// A security-rule list keyed by matched destination port
///
/// Same trust level as [`AllowListProvider`].
#[async_trait]
pub trait SecurityRuleProvider: Send + Sync {
    /// Fetch every rule in the rule list
    async fn fetch_rules(&self) -> Result<Vec<SecurityRule>, crate::Error>;

    /// Submit `rules` in a single replace call
    ///
    /// Only the submitted rules are sent. Rules absent from `rules` are not
    /// carried over by this call.
    async fn replace_rules(&self, rules: &[SecurityRule]) -> Result<(), crate::Error>;

    /// Destination ports whose rules should track the desired address
    fn allowed_ports(&self) -> &[u16];

    /// Get the provider name (for logging/debugging)
    fn provider_name(&self) -> &'static str;
}

/// The provider selected at configuration time
#[derive(Clone)]
pub enum Backend {
    /// Additive list store
    List(Arc<dyn AllowListProvider>),
    /// Replace-in-one-call rule store
    Rules(Arc<dyn SecurityRuleProvider>),
}

impl Backend {
    /// Get the underlying provider name
    pub fn provider_name(&self) -> &'static str {
        match self {
            Backend::List(provider) => provider.provider_name(),
            Backend::Rules(provider) => provider.provider_name(),
        }
    }
}

impl std::fmt::Debug for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Backend::List(p) => f.debug_tuple("List").field(&p.provider_name()).finish(),
            Backend::Rules(p) => f.debug_tuple("Rules").field(&p.provider_name()).finish(),
        }
    }
}

/// Helper trait for constructing a backend from configuration
pub trait ProviderFactory: Send + Sync {
    /// Create a [`Backend`] from the full configuration
    ///
    /// Factories read their own provider section plus the shared transport
    /// and dry-run settings.
    fn create(&self, config: &crate::config::AllowSyncConfig) -> Result<Backend, crate::Error>;
}
