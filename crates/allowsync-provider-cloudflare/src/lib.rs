// # Cloudflare IP List Provider
//
// List-based allow-list backend over Cloudflare account IP lists.
//
// ## Behavior
//
// - ✅ Fetches every item, following cursor pagination
// - ✅ Retries reads on transport errors, 429 and 5xx (transport policy)
// - ✅ One create call and one delete call per diff, each only when non-empty
// - ✅ Waits for each queued bulk operation to complete before the next call
// - ✅ Dry-run mode for safe testing
// - ❌ NO retry of writes (a partial apply is recovered by reconciling again)
// - ❌ NO caching of list contents between calls
//
// ### Trust Level: Untrusted (Allow-list Provider)
//
// Providers only talk to their own API. Deciding what to add or remove is
// owned by the Reconciler.
//
// ## Security Requirements
//
// - API token NEVER appears in logs
// - Provider MUST fail fast if token is empty
//
// ## API Reference
//
// - Cloudflare API v4: https://developers.cloudflare.com/api/
// - List items:   GET    `/accounts/:account_id/rules/lists/:list_id/items`
// - Create items: POST   `/accounts/:account_id/rules/lists/:list_id/items`
// - Delete items: DELETE `/accounts/:account_id/rules/lists/:list_id/items`
// - Bulk status:  GET    `/accounts/:account_id/rules/lists/bulk_operations/:operation_id`

mod http;
pub mod types;

use std::sync::Arc;
use std::time::Duration;

use allowsync_core::config::{ProviderConfig, Secret, TransportConfig};
use allowsync_core::model::{AllowListEntry, Diff};
use allowsync_core::registry::ProviderRegistry;
use allowsync_core::traits::{AllowListProvider, Backend, ProviderFactory};
use allowsync_core::{AllowSyncConfig, Error, Result};
use async_trait::async_trait;
use reqwest::Method;

use crate::types::{CreateItem, DeleteItem, DeleteItems};

/// Cloudflare API base URL
pub const CLOUDFLARE_API_BASE: &str = "https://api.cloudflare.com/client/v4";

/// Cloudflare IP list provider
///
/// # Dry-Run Mode
///
/// When `dry_run` is true, the provider will:
/// - Perform all GET requests
/// - Log the intended create and delete payloads
/// - **NOT** modify the list
pub struct CloudflareListProvider {
    /// ⚠️ NEVER log this value
    api_token: Secret,
    account_id: String,
    list_id: String,
    base_url: String,
    client: reqwest::Client,
    transport: TransportConfig,
    dry_run: bool,
}

// Custom Debug implementation that hides the API token
impl std::fmt::Debug for CloudflareListProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudflareListProvider")
            .field("api_token", &"<REDACTED>")
            .field("account_id", &self.account_id)
            .field("list_id", &self.list_id)
            .field("base_url", &self.base_url)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

impl CloudflareListProvider {
    /// Create a new Cloudflare IP list provider
    ///
    /// # Parameters
    ///
    /// - `api_token`: API token with Account Filter Lists Edit permission
    /// - `account_id`: Account owning the list
    /// - `list_id`: IP list identifier
    /// - `transport`: Timeout and read-retry policy
    /// - `dry_run`: If true, perform reads but skip writes
    pub fn new(
        api_token: Secret,
        account_id: impl Into<String>,
        list_id: impl Into<String>,
        transport: TransportConfig,
        dry_run: bool,
    ) -> Result<Self> {
        if api_token.is_empty() {
            return Err(Error::config("Cloudflare API token cannot be empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(transport.timeout_secs))
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            api_token,
            account_id: account_id.into(),
            list_id: list_id.into(),
            base_url: CLOUDFLARE_API_BASE.to_string(),
            client,
            transport,
            dry_run,
        })
    }

    /// Point the provider at a different API base URL
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Whether writes are only logged
    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    pub(crate) fn items_url(&self) -> String {
        format!(
            "{}/accounts/{}/rules/lists/{}/items",
            self.base_url, self.account_id, self.list_id
        )
    }

    pub(crate) fn bulk_operation_url(&self, operation_id: &str) -> String {
        format!(
            "{}/accounts/{}/rules/lists/bulk_operations/{}",
            self.base_url, self.account_id, operation_id
        )
    }

    async fn create_items(&self, diff: &Diff) -> Result<()> {
        let body: Vec<CreateItem> = diff
            .to_add
            .iter()
            .map(|ip| CreateItem { ip: ip.to_string() })
            .collect();

        if self.dry_run {
            tracing::info!(
                "[DRY-RUN] Would send POST request to {} with payload: {}",
                self.items_url(),
                serde_json::to_string(&body)?
            );
            return Ok(());
        }

        let operation_id = self.send_write(Method::POST, &body, "Create items").await?;
        self.wait_for_operation(&operation_id, "Create items").await?;
        tracing::info!("Added {} item(s) to Cloudflare list {}", body.len(), self.list_id);
        Ok(())
    }

    async fn delete_items(&self, diff: &Diff) -> Result<()> {
        let body = DeleteItems {
            items: diff
                .to_remove
                .iter()
                .map(|entry| DeleteItem { id: entry.id.clone() })
                .collect(),
        };

        if self.dry_run {
            tracing::info!(
                "[DRY-RUN] Would send DELETE request to {} with payload: {}",
                self.items_url(),
                serde_json::to_string(&body)?
            );
            return Ok(());
        }

        let operation_id = self.send_write(Method::DELETE, &body, "Delete items").await?;
        self.wait_for_operation(&operation_id, "Delete items").await?;
        tracing::info!(
            "Removed {} item(s) from Cloudflare list {}",
            body.items.len(),
            self.list_id
        );
        Ok(())
    }
}

#[async_trait]
impl AllowListProvider for CloudflareListProvider {
    async fn fetch_current(&self) -> Result<Vec<AllowListEntry>> {
        let mut entries = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let page = self.get_page(cursor.as_deref()).await?;

            for item in page.result.as_deref().unwrap_or_default() {
                match &item.ip {
                    Some(ip) => entries.push(AllowListEntry::new(&item.id, ip)),
                    None => tracing::debug!("Skipping non-IP list item {}", item.id),
                }
            }

            match page.next_cursor() {
                Some(next) => cursor = Some(next.to_string()),
                None => break,
            }
        }

        tracing::debug!(
            "Cloudflare list {} holds {} item(s)",
            self.list_id,
            entries.len()
        );
        Ok(entries)
    }

    async fn apply_diff(&self, diff: &Diff) -> Result<()> {
        if !diff.to_add.is_empty() {
            self.create_items(diff).await?;
        }
        if !diff.to_remove.is_empty() {
            self.delete_items(diff).await?;
        }
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "cloudflare"
    }
}

/// Factory for creating Cloudflare providers
pub struct CloudflareFactory;

impl ProviderFactory for CloudflareFactory {
    fn create(&self, config: &AllowSyncConfig) -> Result<Backend> {
        match &config.provider {
            ProviderConfig::Cloudflare {
                api_token,
                account_id,
                list_id,
                base_url,
            } => {
                if config.dry_run {
                    tracing::warn!(
                        "Cloudflare provider running in DRY-RUN mode - no changes will be made"
                    );
                }

                let mut provider = CloudflareListProvider::new(
                    api_token.clone(),
                    account_id.clone(),
                    list_id.clone(),
                    config.transport.clone(),
                    config.dry_run,
                )?;
                if let Some(base_url) = base_url {
                    provider = provider.with_base_url(base_url.clone());
                }

                Ok(Backend::List(Arc::new(provider)))
            }
            _ => Err(Error::config("Invalid config for Cloudflare provider")),
        }
    }
}

/// Register the Cloudflare provider with a registry
///
/// # Example
///
/// ```rust
/// use allowsync_core::ProviderRegistry;
///
/// let registry = ProviderRegistry::new();
/// allowsync_provider_cloudflare::register(&registry);
/// assert!(registry.has_provider("cloudflare"));
/// ```
pub fn register(registry: &ProviderRegistry) {
    registry.register_provider("cloudflare", Box::new(CloudflareFactory));
}
