//! Configuration types for allowsync
//!
//! This module defines all configuration structures used throughout the crate.
//! The daemon builds one [`AllowSyncConfig`] at startup and passes it by
//! reference; nothing reads the environment after that.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::model::DEFAULT_ALLOWED_PORTS;

/// Name of the cache file inside the platform temp directory
pub const CACHE_FILE_NAME: &str = "ip_cache";

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllowSyncConfig {
    /// Allow-list provider configuration
    pub provider: ProviderConfig,

    /// Hostnames whose addresses should be allowed
    #[serde(default)]
    pub records: Vec<String>,

    /// How reconciliations are triggered
    #[serde(default)]
    pub trigger: TriggerConfig,

    /// Idempotency cache backend (server mode only)
    #[serde(default)]
    pub cache: CacheConfig,

    /// Transport policy handed to providers at construction
    #[serde(default)]
    pub transport: TransportConfig,

    /// If true, providers read but only log their writes
    #[serde(default)]
    pub dry_run: bool,
}

impl AllowSyncConfig {
    /// Create a one-shot configuration for the given provider
    pub fn new(provider: ProviderConfig) -> Self {
        Self {
            provider,
            records: Vec::new(),
            trigger: TriggerConfig::default(),
            cache: CacheConfig::default(),
            transport: TransportConfig::default(),
            dry_run: false,
        }
    }

    /// Set the hostnames to resolve
    pub fn with_records(mut self, records: Vec<String>) -> Self {
        self.records = records;
        self
    }

    /// Set the trigger mode
    pub fn with_trigger(mut self, trigger: TriggerConfig) -> Self {
        self.trigger = trigger;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.provider.validate()?;
        self.transport.validate()?;

        match &self.trigger {
            TriggerConfig::OneShot => {
                if self.records.is_empty() {
                    return Err(crate::Error::config("No DNS records configured"));
                }
            }
            TriggerConfig::Server { bind_addr } => {
                if bind_addr.is_empty() {
                    return Err(crate::Error::config("Server bind address cannot be empty"));
                }
            }
        }

        if self.records.iter().any(|r| r.trim().is_empty()) {
            return Err(crate::Error::config("DNS record names cannot be empty"));
        }

        Ok(())
    }
}

/// Supported provider types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Cloudflare IP list
    Cloudflare,
    /// OCI Network Security Group
    Oci,
}

impl ProviderKind {
    /// Registry name of the provider
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Cloudflare => "cloudflare",
            ProviderKind::Oci => "oci",
        }
    }
}

impl FromStr for ProviderKind {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cloudflare" => Ok(ProviderKind::Cloudflare),
            "oci" => Ok(ProviderKind::Oci),
            _ => Err(crate::Error::unsupported_provider(s)),
        }
    }
}

/// A secret string whose `Debug` output is redacted
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Access the secret value
    ///
    /// ⚠️ NEVER log the returned value
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<REDACTED>")
    }
}

/// Allow-list provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderConfig {
    /// Cloudflare IP list (list-based)
    Cloudflare {
        /// Cloudflare API token
        api_token: Secret,
        /// Account owning the list
        account_id: String,
        /// IP list identifier
        list_id: String,
        /// API base URL override
        #[serde(default)]
        base_url: Option<String>,
    },

    /// OCI Network Security Group (rule-based)
    Oci {
        /// NSG OCID
        nsg_id: String,
        /// Region override (otherwise taken from credentials)
        #[serde(default)]
        region: Option<String>,
        /// Where the signing key comes from
        credentials: OciCredentials,
        /// Destination ports whose rules are rewritten
        #[serde(default = "default_allowed_ports")]
        allowed_ports: Vec<u16>,
        /// Core Services endpoint override
        #[serde(default)]
        endpoint: Option<String>,
    },
}

impl ProviderConfig {
    /// Validate the provider configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            ProviderConfig::Cloudflare {
                api_token,
                account_id,
                list_id,
                ..
            } => {
                if api_token.is_empty() {
                    return Err(crate::Error::config("Cloudflare API token cannot be empty"));
                }
                if account_id.is_empty() {
                    return Err(crate::Error::config("Cloudflare account ID cannot be empty"));
                }
                if list_id.is_empty() {
                    return Err(crate::Error::config("Cloudflare list ID cannot be empty"));
                }
                Ok(())
            }
            ProviderConfig::Oci {
                nsg_id,
                credentials,
                allowed_ports,
                ..
            } => {
                if nsg_id.is_empty() {
                    return Err(crate::Error::config("OCI NSG ID cannot be empty"));
                }
                if allowed_ports.is_empty() {
                    return Err(crate::Error::config("OCI allowed ports cannot be empty"));
                }
                credentials.validate()
            }
        }
    }

    /// Get the provider kind
    pub fn kind(&self) -> ProviderKind {
        match self {
            ProviderConfig::Cloudflare { .. } => ProviderKind::Cloudflare,
            ProviderConfig::Oci { .. } => ProviderKind::Oci,
        }
    }

    /// Get the provider type name
    pub fn type_name(&self) -> &'static str {
        self.kind().as_str()
    }
}

/// Source of OCI API-key credentials
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum OciCredentials {
    /// Local credential chain: an OCI CLI config file profile
    ConfigFile {
        /// Config file path (default `~/.oci/config`)
        #[serde(default)]
        path: Option<PathBuf>,
        /// Profile name
        #[serde(default = "default_oci_profile")]
        profile: String,
    },

    /// Explicit API-key credentials
    ApiKey {
        tenancy: String,
        user: String,
        fingerprint: String,
        private_key_path: PathBuf,
    },
}

impl OciCredentials {
    fn validate(&self) -> Result<(), crate::Error> {
        match self {
            OciCredentials::ConfigFile { profile, .. } => {
                if profile.is_empty() {
                    return Err(crate::Error::config("OCI profile cannot be empty"));
                }
                Ok(())
            }
            OciCredentials::ApiKey {
                tenancy,
                user,
                fingerprint,
                private_key_path,
            } => {
                for (name, value) in [
                    ("tenancy", tenancy.as_str()),
                    ("user", user.as_str()),
                    ("fingerprint", fingerprint.as_str()),
                ] {
                    if value.is_empty() {
                        return Err(crate::Error::config(format!(
                            "OCI API key {} cannot be empty",
                            name
                        )));
                    }
                }
                if private_key_path.as_os_str().is_empty() {
                    return Err(crate::Error::config("OCI private key path cannot be empty"));
                }
                Ok(())
            }
        }
    }
}

/// How reconciliations are triggered
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum TriggerConfig {
    /// Resolve once, reconcile once, exit
    #[default]
    OneShot,

    /// Reconcile on each `GET /ip?ip=` report
    Server {
        /// Listen address (e.g. "0.0.0.0:8080")
        bind_addr: String,
    },
}

/// Idempotency cache backend
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CacheConfig {
    /// Plain text file
    File {
        /// Path to the cache file
        path: PathBuf,
    },

    /// In-memory only (not persistent)
    Memory,
}

impl CacheConfig {
    /// File cache at the default location, `<temp_dir>/ip_cache`
    pub fn default_file() -> Self {
        CacheConfig::File {
            path: std::env::temp_dir().join(CACHE_FILE_NAME),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self::default_file()
    }
}

/// Transport policy for provider HTTP clients
///
/// Applied once at provider construction. Only idempotent reads are retried.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Total attempts for a read, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay between read attempts (in milliseconds)
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Per-request timeout (in seconds)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl TransportConfig {
    fn validate(&self) -> Result<(), crate::Error> {
        if self.max_attempts == 0 {
            return Err(crate::Error::config("Transport max attempts must be > 0"));
        }
        if self.timeout_secs == 0 {
            return Err(crate::Error::config("Transport timeout must be > 0"));
        }
        Ok(())
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_allowed_ports() -> Vec<u16> {
    DEFAULT_ALLOWED_PORTS.to_vec()
}

fn default_oci_profile() -> String {
    "DEFAULT".to_string()
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    500
}

fn default_timeout_secs() -> u64 {
    30
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cloudflare() -> ProviderConfig {
        ProviderConfig::Cloudflare {
            api_token: Secret::new("cf-token"),
            account_id: "acct".to_string(),
            list_id: "list".to_string(),
            base_url: None,
        }
    }

    #[test]
    fn provider_kind_parses_case_insensitively() {
        assert_eq!("Cloudflare".parse::<ProviderKind>().unwrap(), ProviderKind::Cloudflare);
        assert_eq!("OCI".parse::<ProviderKind>().unwrap(), ProviderKind::Oci);

        let err = "Azure".parse::<ProviderKind>().unwrap_err();
        assert!(matches!(err, crate::Error::UnsupportedProvider(ref p) if p == "Azure"));
    }

    #[test]
    fn one_shot_requires_records() {
        let config = AllowSyncConfig::new(cloudflare());
        assert!(config.validate().is_err());

        let config = config.with_records(vec!["home.example.com".to_string()]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn server_mode_does_not_require_records() {
        let config = AllowSyncConfig::new(cloudflare()).with_trigger(TriggerConfig::Server {
            bind_addr: "127.0.0.1:8080".to_string(),
        });
        assert!(config.validate().is_ok());
    }

    #[test]
    fn secret_is_redacted_in_debug() {
        let debug = format!("{:?}", cloudflare());
        assert!(!debug.contains("cf-token"));
        assert!(debug.contains("<REDACTED>"));
    }

    #[test]
    fn oci_defaults_to_standard_ports() {
        let json = serde_json::json!({
            "type": "oci",
            "nsg_id": "ocid1.networksecuritygroup.oc1..x",
            "credentials": { "source": "config_file" }
        });
        let config: ProviderConfig = serde_json::from_value(json).unwrap();
        match config {
            ProviderConfig::Oci {
                allowed_ports,
                credentials: OciCredentials::ConfigFile { profile, .. },
                ..
            } => {
                assert_eq!(allowed_ports, vec![80, 443, 7000]);
                assert_eq!(profile, "DEFAULT");
            }
            other => panic!("unexpected config: {:?}", other),
        }
    }

    #[test]
    fn default_cache_lives_in_temp_dir() {
        match CacheConfig::default() {
            CacheConfig::File { path } => {
                assert_eq!(path, std::env::temp_dir().join("ip_cache"));
            }
            CacheConfig::Memory => panic!("expected file cache"),
        }
    }
}
