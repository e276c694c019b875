// # OCI NSG Provider
//
// Rule-based allow-list backend over a Network Security Group.
//
// - `fetch_rules`: GET every page of the NSG's security rules
// - `replace_rules`: one POST to `updateSecurityRules` carrying the given rules
//
// Reads are retried on transport errors, 429 and 5xx. The update is sent once.

use std::time::Duration;

use allowsync_core::config::TransportConfig;
use allowsync_core::model::SecurityRule;
use allowsync_core::traits::SecurityRuleProvider;
use allowsync_core::{Error, Result};
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::{Method, StatusCode, Url};
use serde_json::Value;

use crate::signer::ApiKeySigner;
use crate::types::{OciErrorBody, UpdateSecurityRulesDetails, rule_from_document, update_details};

/// Core Services API version path segment
pub const API_VERSION: &str = "20160918";

const PROVIDER: &str = "oci";

/// Core Services endpoint for a region
pub fn endpoint_for_region(region: &str) -> String {
    format!("https://iaas.{}.oraclecloud.com/{}", region, API_VERSION)
}

/// OCI Network Security Group provider
#[derive(Debug)]
pub struct OciNsgProvider {
    nsg_id: String,
    endpoint: String,
    signer: ApiKeySigner,
    client: reqwest::Client,
    transport: TransportConfig,
    allowed_ports: Vec<u16>,
    dry_run: bool,
}

struct RequestFailure {
    error: Error,
    retryable: bool,
}

impl OciNsgProvider {
    /// Create a provider
    ///
    /// # Parameters
    ///
    /// - `nsg_id`: NSG OCID
    /// - `endpoint`: Core Services base URL including the API version
    /// - `signer`: API-key request signer
    /// - `allowed_ports`: Destination ports whose rules track the desired address
    /// - `transport`: Timeout and read-retry policy
    /// - `dry_run`: If true, fetch rules but only log the update
    pub fn new(
        nsg_id: impl Into<String>,
        endpoint: impl Into<String>,
        signer: ApiKeySigner,
        allowed_ports: Vec<u16>,
        transport: TransportConfig,
        dry_run: bool,
    ) -> Result<Self> {
        let nsg_id = nsg_id.into();
        if nsg_id.is_empty() {
            return Err(Error::config("OCI NSG ID cannot be empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(transport.timeout_secs))
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            nsg_id,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            signer,
            client,
            transport,
            allowed_ports,
            dry_run,
        })
    }

    fn url(&self, suffix: &str) -> Result<Url> {
        let raw = format!(
            "{}/networkSecurityGroups/{}/{}",
            self.endpoint, self.nsg_id, suffix
        );
        Url::parse(&raw).map_err(|e| Error::config(format!("Invalid OCI endpoint {}: {}", raw, e)))
    }

    /// Fetch one page of rules, returning the next page token
    async fn get_page(&self, page: Option<&str>) -> Result<(Vec<Value>, Option<String>)> {
        let mut url = self.url("securityRules")?;
        if let Some(page) = page {
            url.query_pairs_mut().append_pair("page", page);
        }

        let max_attempts = self.transport.max_attempts.max(1);
        let delay = Duration::from_millis(self.transport.retry_delay_ms);
        let mut attempt = 1;

        loop {
            match self.execute(Method::GET, &url, None).await {
                Ok((headers, body)) => {
                    let rules: Vec<Value> = serde_json::from_str(&body).map_err(|e| {
                        Error::provider(PROVIDER, format!("Failed to parse response: {}", e))
                    })?;
                    let next = headers
                        .get("opc-next-page")
                        .and_then(|v| v.to_str().ok())
                        .filter(|v| !v.is_empty())
                        .map(str::to_string);
                    return Ok((rules, next));
                }
                Err(failure) if failure.retryable && attempt < max_attempts => {
                    tracing::warn!(
                        "OCI read failed (attempt {}/{}), retrying in {:?}: {}",
                        attempt,
                        max_attempts,
                        delay,
                        failure.error
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(failure) => return Err(failure.error),
            }
        }
    }

    /// Sign and send one request
    async fn execute(
        &self,
        method: Method,
        url: &Url,
        body: Option<Vec<u8>>,
    ) -> std::result::Result<(HeaderMap, String), RequestFailure> {
        let headers = self
            .signer
            .signed_headers(&method, url, body.as_deref(), chrono::Utc::now())
            .map_err(|error| RequestFailure {
                error,
                retryable: false,
            })?;

        let mut request = self.client.request(method, url.clone());
        for (name, value) in headers {
            request = request.header(name, value);
        }
        if let Some(body) = body {
            request = request.body(body);
        }

        let response = request.send().await.map_err(|e| RequestFailure {
            error: Error::provider(PROVIDER, format!("HTTP request failed: {}", e)),
            retryable: true,
        })?;

        let status = response.status();
        let headers = response.headers().clone();
        let text = response.text().await.map_err(|e| RequestFailure {
            error: Error::provider(PROVIDER, format!("Failed to read response: {}", e)),
            retryable: true,
        })?;

        if !status.is_success() {
            return Err(status_failure(status, &text));
        }

        Ok((headers, text))
    }
}

fn status_failure(status: StatusCode, body: &str) -> RequestFailure {
    let detail = OciErrorBody::describe(body);

    let (message, retryable) = match status.as_u16() {
        401 | 403 => (
            format!("Authentication failed. Status: {} - {}", status, detail),
            false,
        ),
        404 => (
            format!("NSG not found or not authorized. Status: {} - {}", status, detail),
            false,
        ),
        429 => (
            format!("Rate limit exceeded. Please retry later. Status: {}", status),
            true,
        ),
        500..=599 => (
            format!("OCI server error (transient): {} - {}", status, detail),
            true,
        ),
        _ => (format!("Request failed: {} - {}", status, detail), false),
    };

    RequestFailure {
        error: Error::provider(PROVIDER, message),
        retryable,
    }
}

#[async_trait]
impl SecurityRuleProvider for OciNsgProvider {
    async fn fetch_rules(&self) -> Result<Vec<SecurityRule>> {
        let mut rules = Vec::new();
        let mut page: Option<String> = None;

        loop {
            let (documents, next) = self.get_page(page.as_deref()).await?;
            for document in documents {
                rules.push(rule_from_document(document)?);
            }

            match next {
                Some(next) => page = Some(next),
                None => break,
            }
        }

        tracing::debug!("NSG {} holds {} rule(s)", self.nsg_id, rules.len());
        Ok(rules)
    }

    async fn replace_rules(&self, rules: &[SecurityRule]) -> Result<()> {
        let details = UpdateSecurityRulesDetails {
            security_rules: rules.iter().map(update_details).collect(),
        };
        let body = serde_json::to_vec(&details)?;
        let url = self.url("actions/updateSecurityRules")?;

        if self.dry_run {
            tracing::info!(
                "[DRY-RUN] Would send POST request to {} with payload: {}",
                url,
                String::from_utf8_lossy(&body)
            );
            return Ok(());
        }

        self.execute(Method::POST, &url, Some(body))
            .await
            .map_err(|failure| failure.error)?;

        tracing::info!("Updated {} rule(s) in NSG {}", rules.len(), self.nsg_id);
        Ok(())
    }

    fn allowed_ports(&self) -> &[u16] {
        &self.allowed_ports
    }

    fn provider_name(&self) -> &'static str {
        "oci"
    }
}
