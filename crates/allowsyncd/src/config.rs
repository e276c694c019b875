// Environment configuration for allowsyncd
//
// Everything is read once at startup into `Config`, validated, and converted
// into an `AllowSyncConfig` for the core crate. Nothing reads the environment
// after that.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use allowsync_core::config::{
    CacheConfig, OciCredentials, ProviderConfig, ProviderKind, Secret, TransportConfig,
    TriggerConfig,
};
use allowsync_core::model::DEFAULT_ALLOWED_PORTS;
use allowsync_core::trigger::split_records;
use allowsync_core::AllowSyncConfig;
use anyhow::{Context, Result};
use tracing::Level;

/// Default server-mode listen address
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

/// Daemon configuration read from the environment
#[derive(Debug, Clone)]
pub struct Config {
    pub provider: String,
    pub records: Vec<String>,

    // Cloudflare
    pub list_id: Option<String>,
    pub account_id: Option<String>,
    pub cloudflare_api_token: Option<Secret>,

    // OCI
    pub nsg_id: Option<String>,
    pub oci_region: Option<String>,
    pub oci_tenancy: Option<String>,
    pub oci_user: Option<String>,
    pub oci_fingerprint: Option<String>,
    pub oci_private_key_path: Option<PathBuf>,
    pub oci_config_file: Option<PathBuf>,
    pub oci_profile: Option<String>,
    pub oci_allowed_ports: Vec<u16>,
    pub local: bool,

    pub server_mode: bool,
    pub bind_addr: String,
    pub cache_path: Option<PathBuf>,
    pub disable_update: bool,
    pub disable_checks: bool,
    pub dry_run: bool,
    pub max_attempts: u32,
    pub retry_delay_ms: u64,
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through a variable lookup function
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        // Only the lowercase literal `true` switches a flag on
        let flag = |key: &str| var(key).is_some_and(|v| v == "true");

        let transport = TransportConfig::default();

        Ok(Self {
            provider: var("PROVIDER").unwrap_or_default(),
            records: var("DNS_RECORD")
                .map(|raw| split_records(&raw))
                .unwrap_or_default(),

            list_id: var("LIST_ID"),
            account_id: var("ACCOUNT_ID"),
            cloudflare_api_token: var("CLOUDFLARE_API_TOKEN").map(Secret::new),

            nsg_id: var("NSG_ID"),
            oci_region: var("OCI_REGION"),
            oci_tenancy: var("OCI_TENANCY_OCID"),
            oci_user: var("OCI_USER_OCID"),
            oci_fingerprint: var("OCI_FINGERPRINT"),
            oci_private_key_path: var("OCI_PRIVATE_KEY_PATH").map(PathBuf::from),
            oci_config_file: var("OCI_CONFIG_FILE").map(PathBuf::from),
            oci_profile: var("OCI_PROFILE"),
            oci_allowed_ports: match var("OCI_ALLOWED_PORTS") {
                Some(raw) => parse_ports(&raw)?,
                None => DEFAULT_ALLOWED_PORTS.to_vec(),
            },
            // Any non-empty value selects the local credential chain
            local: var("LOCAL").is_some(),

            server_mode: flag("SERVER_MODE"),
            bind_addr: var("BIND_ADDR")
                .map(|raw| normalize_bind_addr(&raw))
                .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            cache_path: var("CACHE_PATH").map(PathBuf::from),
            disable_update: flag("DISABLE_UPDATE"),
            disable_checks: flag("DISABLE_CHECKS"),
            dry_run: flag("DRY_RUN"),
            max_attempts: match var("MAX_ATTEMPTS") {
                Some(raw) => raw
                    .parse()
                    .with_context(|| format!("MAX_ATTEMPTS must be a number. Got: {}", raw))?,
                None => transport.max_attempts,
            },
            retry_delay_ms: match var("RETRY_DELAY_MS") {
                Some(raw) => raw
                    .parse()
                    .with_context(|| format!("RETRY_DELAY_MS must be a number. Got: {}", raw))?,
                None => transport.retry_delay_ms,
            },
            log_level: var("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Validate the configuration
    ///
    /// Checks the settings the daemon owns (mode, records, ranges, log level)
    /// and the presence of provider credentials. Provider-level checks run
    /// again in the core config's `validate()`.
    pub fn validate(&self) -> Result<()> {
        let kind = self.provider_kind()?;

        match kind {
            ProviderKind::Cloudflare => {
                if self.list_id.is_none() {
                    anyhow::bail!("LIST_ID is required when PROVIDER=Cloudflare");
                }
                if self.account_id.is_none() {
                    anyhow::bail!("ACCOUNT_ID is required when PROVIDER=Cloudflare");
                }
                if self.cloudflare_api_token.is_none() {
                    anyhow::bail!(
                        "CLOUDFLARE_API_TOKEN is required when PROVIDER=Cloudflare. \
                        Set it via: export CLOUDFLARE_API_TOKEN=your_token"
                    );
                }
            }
            ProviderKind::Oci => {
                if self.nsg_id.is_none() {
                    anyhow::bail!("NSG_ID is required when PROVIDER=OCI");
                }
                if !self.local {
                    let missing: Vec<&str> = [
                        ("OCI_TENANCY_OCID", self.oci_tenancy.is_none()),
                        ("OCI_USER_OCID", self.oci_user.is_none()),
                        ("OCI_FINGERPRINT", self.oci_fingerprint.is_none()),
                        ("OCI_PRIVATE_KEY_PATH", self.oci_private_key_path.is_none()),
                    ]
                    .into_iter()
                    .filter(|(_, missing)| *missing)
                    .map(|(name, _)| name)
                    .collect();

                    if !missing.is_empty() {
                        anyhow::bail!(
                            "OCI API key credentials are incomplete, missing: {}. \
                            Set LOCAL=1 to use ~/.oci/config instead \
                            (instance principal authentication is not supported)",
                            missing.join(", ")
                        );
                    }
                }
            }
        }

        if self.server_mode {
            self.bind_addr.parse::<SocketAddr>().with_context(|| {
                format!(
                    "BIND_ADDR must be an address like {}. Got: {}",
                    DEFAULT_BIND_ADDR, self.bind_addr
                )
            })?;
        } else if self.records.is_empty() {
            anyhow::bail!(
                "DNS_RECORD must contain at least one record. \
                Set it via: export DNS_RECORD=home.example.com;office.example.com"
            );
        }

        for record in &self.records {
            validate_record(record)?;
        }

        if self.max_attempts == 0 || self.max_attempts > 10 {
            anyhow::bail!("MAX_ATTEMPTS must be between 1 and 10. Got: {}", self.max_attempts);
        }

        if self.retry_delay_ms > 60_000 {
            anyhow::bail!(
                "RETRY_DELAY_MS must be at most 60000. Got: {}",
                self.retry_delay_ms
            );
        }

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        Ok(())
    }

    /// Provider kind named by `PROVIDER`
    pub fn provider_kind(&self) -> Result<ProviderKind> {
        if self.provider.is_empty() {
            anyhow::bail!("PROVIDER is required. Supported providers: OCI, Cloudflare");
        }
        Ok(self.provider.parse::<ProviderKind>()?)
    }

    /// Tracing level for `LOG_LEVEL`
    pub fn log_level(&self) -> Level {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        }
    }

    /// Convert into the core configuration
    pub fn to_allowsync_config(&self) -> Result<AllowSyncConfig> {
        let provider = match self.provider_kind()? {
            ProviderKind::Cloudflare => ProviderConfig::Cloudflare {
                api_token: self.cloudflare_api_token.clone().unwrap_or_default(),
                account_id: self.account_id.clone().unwrap_or_default(),
                list_id: self.list_id.clone().unwrap_or_default(),
                base_url: None,
            },
            ProviderKind::Oci => ProviderConfig::Oci {
                nsg_id: self.nsg_id.clone().unwrap_or_default(),
                region: self.oci_region.clone(),
                credentials: self.oci_credentials(),
                allowed_ports: self.oci_allowed_ports.clone(),
                endpoint: None,
            },
        };

        let trigger = if self.server_mode {
            TriggerConfig::Server {
                bind_addr: self.bind_addr.clone(),
            }
        } else {
            TriggerConfig::OneShot
        };

        let mut config = AllowSyncConfig::new(provider)
            .with_records(self.records.clone())
            .with_trigger(trigger);

        config.cache = match &self.cache_path {
            Some(path) => CacheConfig::File { path: path.clone() },
            None => CacheConfig::default_file(),
        };
        config.transport = TransportConfig {
            max_attempts: self.max_attempts,
            retry_delay_ms: self.retry_delay_ms,
            ..TransportConfig::default()
        };
        config.dry_run = self.dry_run;

        config.validate()?;
        Ok(config)
    }

    fn oci_credentials(&self) -> OciCredentials {
        if self.local {
            OciCredentials::ConfigFile {
                path: self.oci_config_file.clone(),
                profile: self
                    .oci_profile
                    .clone()
                    .unwrap_or_else(|| "DEFAULT".to_string()),
            }
        } else {
            OciCredentials::ApiKey {
                tenancy: self.oci_tenancy.clone().unwrap_or_default(),
                user: self.oci_user.clone().unwrap_or_default(),
                fingerprint: self.oci_fingerprint.clone().unwrap_or_default(),
                private_key_path: self.oci_private_key_path.clone().unwrap_or_default(),
            }
        }
    }
}

/// Expand a bare `:port` to every IPv4 interface
fn normalize_bind_addr(raw: &str) -> String {
    match raw.strip_prefix(':') {
        Some(port) => format!("0.0.0.0:{}", port),
        None => raw.to_string(),
    }
}

fn parse_ports(raw: &str) -> Result<Vec<u16>> {
    raw.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| {
            p.parse::<u16>()
                .with_context(|| format!("OCI_ALLOWED_PORTS contains an invalid port: {}", p))
        })
        .collect()
}

/// Validate a DNS record name (RFC 1035 labels), or a literal address
fn validate_record(record: &str) -> Result<()> {
    if record.parse::<IpAddr>().is_ok() {
        return Ok(());
    }

    if record.len() > 253 {
        anyhow::bail!(
            "Domain name too long: {} chars (max 253). Got: {}",
            record.len(),
            record
        );
    }

    // A single trailing dot marks a fully-qualified name
    let name = record.strip_suffix('.').unwrap_or(record);

    for label in name.split('.') {
        if label.is_empty() {
            anyhow::bail!("Domain name has empty label: '{}'", record);
        }

        if label.len() > 63 {
            anyhow::bail!(
                "Domain label too long: {} chars (max 63). Label: '{}'",
                label.len(),
                label
            );
        }

        if !label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
            anyhow::bail!(
                "Domain label contains invalid characters. Label: '{}'. \
                Valid: alphanumeric, hyphen and underscore only.",
                label
            );
        }

        if label.starts_with('-') || label.ends_with('-') {
            anyhow::bail!(
                "Domain label cannot start or end with hyphen. Label: '{}'",
                label
            );
        }
    }

    Ok(())
}
