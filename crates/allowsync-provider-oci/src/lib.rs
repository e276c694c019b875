// # OCI Network Security Group Provider
//
// Rule-based allow-list backend over OCI Core Services.
//
// ## Behavior
//
// - ✅ Fetches every NSG security rule, following `opc-next-page`
// - ✅ Submits the rewritten rules in one `updateSecurityRules` call
// - ✅ Signs requests with an API key (config-file profile or explicit key)
// - ✅ Retries reads on transport errors, 429 and 5xx (transport policy)
// - ✅ Dry-run mode for safe testing
// - ❌ NO instance-principal authentication
// - ❌ NO retry of the update call
//
// ### Trust Level: Untrusted (Allow-list Provider)
//
// Choosing which rules to rewrite is owned by the Reconciler; this crate only
// moves rule documents to and from the API.
//
// ## API Reference
//
// - List rules:   GET  `/20160918/networkSecurityGroups/:nsg_id/securityRules`
// - Update rules: POST `/20160918/networkSecurityGroups/:nsg_id/actions/updateSecurityRules`

pub mod config_file;
pub mod provider;
pub mod signer;
pub mod types;

use std::sync::Arc;

use allowsync_core::config::ProviderConfig;
use allowsync_core::registry::ProviderRegistry;
use allowsync_core::traits::{Backend, ProviderFactory};
use allowsync_core::{AllowSyncConfig, Error, Result};

pub use provider::{OciNsgProvider, endpoint_for_region};
pub use signer::ApiKeySigner;

/// Factory for creating OCI providers
pub struct OciFactory;

impl ProviderFactory for OciFactory {
    fn create(&self, config: &AllowSyncConfig) -> Result<Backend> {
        match &config.provider {
            ProviderConfig::Oci {
                nsg_id,
                region,
                credentials,
                allowed_ports,
                endpoint,
            } => {
                let signer = ApiKeySigner::from_credentials(credentials)?;

                let endpoint = match (endpoint, region.as_deref().or(signer.region())) {
                    (Some(endpoint), _) => endpoint.clone(),
                    (None, Some(region)) => endpoint_for_region(region),
                    (None, None) => {
                        return Err(Error::config(
                            "OCI region is not set (OCI_REGION or region in the config profile)",
                        ));
                    }
                };

                if config.dry_run {
                    tracing::warn!("OCI provider running in DRY-RUN mode - no changes will be made");
                }
                tracing::debug!("OCI endpoint {} with key {}", endpoint, signer.key_id());

                let provider = OciNsgProvider::new(
                    nsg_id.clone(),
                    endpoint,
                    signer,
                    allowed_ports.clone(),
                    config.transport.clone(),
                    config.dry_run,
                )?;

                Ok(Backend::Rules(Arc::new(provider)))
            }
            _ => Err(Error::config("Invalid config for OCI provider")),
        }
    }
}

/// Register the OCI provider with a registry
///
/// # Example
///
/// ```rust
/// use allowsync_core::ProviderRegistry;
///
/// let registry = ProviderRegistry::new();
/// allowsync_provider_oci::register(&registry);
/// assert!(registry.has_provider("oci"));
/// ```
pub fn register(registry: &ProviderRegistry) {
    registry.register_provider("oci", Box::new(OciFactory));
}
