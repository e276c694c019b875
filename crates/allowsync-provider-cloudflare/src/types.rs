//! Cloudflare API v4 wire types for account IP lists

use serde::{Deserialize, Serialize};

/// Standard Cloudflare response envelope
#[derive(Debug, Deserialize)]
pub struct CloudflareResponse<T> {
    #[serde(default)]
    pub success: bool,
    pub result: Option<T>,
    #[serde(default)]
    pub errors: Vec<CloudflareError>,
    pub result_info: Option<ResultInfo>,
}

impl<T> CloudflareResponse<T> {
    /// Joined `errors[].message`, or a placeholder when the API sent none
    pub fn error_message(&self) -> String {
        if self.errors.is_empty() {
            return "Unknown error".to_string();
        }
        self.errors
            .iter()
            .map(|e| e.message.as_str())
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// Cursor for the next page, if any
    pub fn next_cursor(&self) -> Option<&str> {
        self.result_info
            .as_ref()
            .and_then(|info| info.cursors.as_ref())
            .and_then(|cursors| cursors.after.as_deref())
            .filter(|after| !after.is_empty())
    }
}

#[derive(Debug, Deserialize)]
pub struct CloudflareError {
    #[serde(default)]
    #[allow(dead_code)]
    pub code: i64,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct ResultInfo {
    pub cursors: Option<Cursors>,
}

#[derive(Debug, Deserialize)]
pub struct Cursors {
    pub after: Option<String>,
}

/// One list item
///
/// Only IP lists are managed; items of other list kinds carry no `ip`.
#[derive(Debug, Deserialize)]
pub struct ListItem {
    pub id: String,
    #[serde(default)]
    pub ip: Option<String>,
}

/// Body element of the create-items call
#[derive(Debug, Serialize)]
pub struct CreateItem {
    pub ip: String,
}

/// Body of the delete-items call
#[derive(Debug, Serialize)]
pub struct DeleteItems {
    pub items: Vec<DeleteItem>,
}

#[derive(Debug, Serialize)]
pub struct DeleteItem {
    pub id: String,
}

/// `result` of the create/delete calls, which only queue a bulk operation
#[derive(Debug, Deserialize)]
pub struct OperationRef {
    pub operation_id: String,
}

/// State of a queued list operation
#[derive(Debug, Deserialize)]
pub struct BulkOperation {
    #[serde(default)]
    pub id: String,
    /// `pending`, `running`, `completed` or `failed`
    pub status: String,
    #[serde(default)]
    pub error: Option<String>,
}

impl BulkOperation {
    pub fn is_completed(&self) -> bool {
        self.status == "completed"
    }

    pub fn is_failed(&self) -> bool {
        self.status == "failed"
    }
}
