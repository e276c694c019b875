//! Request plumbing for the Cloudflare lists API
//!
//! Reads go through `get_with_retry`, which retries transport errors, 429 and
//! 5xx according to the transport policy. Writes go through
//! [`CloudflareListProvider::send_write`] and are sent exactly once.
//!
//! Create and delete only queue a bulk operation. A write counts as applied
//! once [`CloudflareListProvider::wait_for_operation`] sees it `completed`.

use std::time::Duration;

use tokio::time::Instant;

use allowsync_core::{Error, Result};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::CloudflareListProvider;
use crate::types::{BulkOperation, CloudflareResponse, ListItem, OperationRef};

const PROVIDER: &str = "cloudflare";

/// Floor for the bulk-operation poll interval
const MIN_POLL_INTERVAL_MS: u64 = 10;

/// A failed request and whether repeating it could help
#[derive(Debug)]
pub(crate) struct RequestFailure {
    pub error: Error,
    pub retryable: bool,
}

impl RequestFailure {
    fn permanent(message: String) -> Self {
        Self {
            error: Error::provider(PROVIDER, message),
            retryable: false,
        }
    }

    fn transient(message: String) -> Self {
        Self {
            error: Error::provider(PROVIDER, message),
            retryable: true,
        }
    }
}

impl CloudflareListProvider {
    /// Fetch one page of list items
    pub(crate) async fn get_page(
        &self,
        cursor: Option<&str>,
    ) -> Result<CloudflareResponse<Vec<ListItem>>> {
        let query: Vec<(&str, &str)> = cursor.map(|c| ("cursor", c)).into_iter().collect();
        self.get_with_retry(&self.items_url(), &query, "List items fetch")
            .await
    }

    /// GET with the read-retry policy
    async fn get_with_retry<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
        action: &str,
    ) -> Result<CloudflareResponse<T>> {
        let max_attempts = self.transport.max_attempts.max(1);
        let delay = Duration::from_millis(self.transport.retry_delay_ms);
        let mut attempt = 1;

        loop {
            let request = self
                .client
                .get(url)
                .bearer_auth(self.api_token.expose())
                .query(query);

            match execute(request, action).await {
                Ok(response) => return Ok(response),
                Err(failure) if failure.retryable && attempt < max_attempts => {
                    tracing::warn!(
                        "Cloudflare read failed (attempt {}/{}), retrying in {:?}: {}",
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

    /// Send a single write request to the items endpoint
    ///
    /// Returns the id of the bulk operation the API queued.
    pub(crate) async fn send_write<B: Serialize + ?Sized>(
        &self,
        method: Method,
        body: &B,
        action: &str,
    ) -> Result<String> {
        let request = self
            .client
            .request(method, self.items_url())
            .bearer_auth(self.api_token.expose())
            .json(body);

        let response = execute::<OperationRef>(request, action)
            .await
            .map_err(|failure| failure.error)?;

        response
            .result
            .map(|operation| operation.operation_id)
            .ok_or_else(|| {
                Error::provider(
                    PROVIDER,
                    format!("{} response carried no operation_id", action),
                )
            })
    }

    /// Poll a bulk operation until it completes
    ///
    /// `pending` and `running` are polled again every retry delay, for at
    /// most the request timeout. `failed` becomes a provider error carrying
    /// the operation's error text.
    pub(crate) async fn wait_for_operation(
        &self,
        operation_id: &str,
        action: &str,
    ) -> Result<()> {
        let url = self.bulk_operation_url(operation_id);
        let interval =
            Duration::from_millis(self.transport.retry_delay_ms.max(MIN_POLL_INTERVAL_MS));
        let deadline = Instant::now() + Duration::from_secs(self.transport.timeout_secs);

        loop {
            let response: CloudflareResponse<BulkOperation> = self
                .get_with_retry(&url, &[], "Bulk operation status")
                .await?;
            let operation = response.result.ok_or_else(|| {
                Error::provider(
                    PROVIDER,
                    format!("Bulk operation {} returned no result", operation_id),
                )
            })?;

            if operation.is_completed() {
                tracing::debug!("{} operation {} completed", action, operation_id);
                return Ok(());
            }

            if operation.is_failed() {
                return Err(Error::provider(
                    PROVIDER,
                    format!(
                        "{} operation {} failed: {}",
                        action,
                        operation_id,
                        operation.error.as_deref().unwrap_or("no error detail")
                    ),
                ));
            }

            if Instant::now() + interval > deadline {
                return Err(Error::provider(
                    PROVIDER,
                    format!(
                        "{} operation {} still {} after {}s",
                        action, operation_id, operation.status, self.transport.timeout_secs
                    ),
                ));
            }

            tracing::debug!(
                "{} operation {} is {}, polling again in {:?}",
                action,
                operation_id,
                operation.status,
                interval
            );
            tokio::time::sleep(interval).await;
        }
    }
}

/// Send a request and unwrap the Cloudflare envelope
async fn execute<T: DeserializeOwned>(
    request: RequestBuilder,
    action: &str,
) -> std::result::Result<CloudflareResponse<T>, RequestFailure> {
    let response = request
        .send()
        .await
        .map_err(|e| RequestFailure::transient(format!("HTTP request failed: {}", e)))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| RequestFailure::transient(format!("Failed to read response: {}", e)))?;

    if !status.is_success() {
        return Err(status_failure(status, &body, action));
    }

    let envelope: CloudflareResponse<T> = serde_json::from_str(&body)
        .map_err(|e| RequestFailure::permanent(format!("Failed to parse response: {}", e)))?;

    if !envelope.success {
        return Err(RequestFailure::permanent(format!(
            "{} failed: {}",
            action,
            envelope.error_message()
        )));
    }

    Ok(envelope)
}

/// Map a non-success HTTP status to a provider error
pub(crate) fn status_failure(status: StatusCode, body: &str, action: &str) -> RequestFailure {
    // Prefer the API's own error text when the body is an envelope
    let detail = serde_json::from_str::<CloudflareResponse<serde_json::Value>>(body)
        .map(|envelope| envelope.error_message())
        .unwrap_or_else(|_| body.to_string());

    match status.as_u16() {
        401 | 403 => RequestFailure::permanent(format!(
            "Authentication failed: Invalid API token or insufficient permissions. Status: {}",
            status
        )),
        404 => RequestFailure::permanent(format!("IP list not found. Status: {}", status)),
        429 => RequestFailure::transient(format!(
            "Rate limit exceeded. Please retry later. Status: {}",
            status
        )),
        500..=599 => RequestFailure::transient(format!(
            "Cloudflare server error (transient): {} - {}",
            status, detail
        )),
        _ => RequestFailure::permanent(format!("{} failed: {} - {}", action, status, detail)),
    }
}
