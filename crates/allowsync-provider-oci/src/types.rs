//! OCI Core Services wire types for NSG security rules

use allowsync_core::model::SecurityRule;
use allowsync_core::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Fields of a fetched rule carried into `UpdateSecurityRuleDetails`
pub const UPDATE_FIELDS: [&str; 12] = [
    "direction",
    "id",
    "protocol",
    "description",
    "destination",
    "destinationType",
    "isStateless",
    "source",
    "sourceType",
    "tcpOptions",
    "udpOptions",
    "icmpOptions",
];

/// Body of `POST .../actions/updateSecurityRules`
#[derive(Debug, Serialize)]
pub struct UpdateSecurityRulesDetails {
    #[serde(rename = "securityRules")]
    pub security_rules: Vec<Value>,
}

/// OCI error body
#[derive(Debug, Default, Deserialize)]
pub struct OciErrorBody {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl OciErrorBody {
    /// `code: message`, or the raw body when it is not an OCI error document
    pub fn describe(body: &str) -> String {
        match serde_json::from_str::<OciErrorBody>(body) {
            Ok(OciErrorBody {
                code: Some(code),
                message: Some(message),
            }) => format!("{}: {}", code, message),
            Ok(OciErrorBody {
                message: Some(message),
                ..
            }) => message,
            _ => body.to_string(),
        }
    }
}

/// Convert a fetched `SecurityRule` document
pub fn rule_from_document(document: Value) -> Result<SecurityRule> {
    let id = document
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::provider("oci", "Invalid response format: rule.id is not a string"))?
        .to_string();

    let source = document
        .get("source")
        .and_then(Value::as_str)
        .map(str::to_string);

    let tcp_destination_port_min = document
        .pointer("/tcpOptions/destinationPortRange/min")
        .and_then(Value::as_u64)
        .and_then(|port| u16::try_from(port).ok());

    Ok(SecurityRule {
        id,
        source,
        tcp_destination_port_min,
        details: document,
    })
}

/// Build `UpdateSecurityRuleDetails` for a rule
///
/// Copies the update-able fields from the fetched document and overrides
/// `source` with the rule's current value.
pub fn update_details(rule: &SecurityRule) -> Value {
    let mut details = Map::new();

    for field in UPDATE_FIELDS {
        if let Some(value) = rule.details.get(field) {
            if !value.is_null() {
                details.insert(field.to_string(), value.clone());
            }
        }
    }

    details.insert("id".to_string(), Value::String(rule.id.clone()));
    if let Some(source) = &rule.source {
        details.insert("source".to_string(), Value::String(source.clone()));
    }

    Value::Object(details)
}
