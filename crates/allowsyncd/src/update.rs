// Release update check
//
// Best-effort background task started once at startup. It looks up the latest
// published release and logs how it compares with the running version. The
// binary is never replaced in place; a newer release is only announced.
//
// - `DISABLE_CHECKS=true`: no lookup at all
// - `DISABLE_UPDATE=true`: log the latest version only

use std::time::Duration;

use semver::{BuildMetadata, Version};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Repository whose releases are checked
pub const RELEASE_REPOSITORY: &str = "rich7690/dns-whitelist";

const GITHUB_API: &str = "https://api.github.com";
const CHECK_TIMEOUT: Duration = Duration::from_secs(10);

/// What the update check does
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdatePolicy {
    /// Skip the check
    Disabled,
    /// Report the latest version
    ReportOnly,
    /// Report and announce a newer release
    Notify,
}

impl UpdatePolicy {
    /// Policy for the `DISABLE_CHECKS` / `DISABLE_UPDATE` flags
    pub fn from_flags(disable_checks: bool, disable_update: bool) -> Self {
        if disable_checks {
            UpdatePolicy::Disabled
        } else if disable_update {
            UpdatePolicy::ReportOnly
        } else {
            UpdatePolicy::Notify
        }
    }
}

/// Result of comparing the latest release with the running version
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateStatus {
    UpToDate,
    Available { latest: String, url: String },
}

#[derive(Debug, Deserialize)]
struct Release {
    tag_name: String,
    #[serde(default)]
    html_url: String,
}

/// GitHub latest-release lookup
#[derive(Debug, Clone)]
pub struct UpdateChecker {
    api_base: String,
    repository: String,
    current: String,
}

impl UpdateChecker {
    pub fn new() -> Self {
        Self {
            api_base: GITHUB_API.to_string(),
            repository: RELEASE_REPOSITORY.to_string(),
            current: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Override the API base URL
    #[cfg(test)]
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// Override the version considered current
    #[cfg(test)]
    pub fn with_current_version(mut self, current: impl Into<String>) -> Self {
        self.current = current.into();
        self
    }

    /// Look up the latest release and compare it with the current version
    pub async fn check(&self) -> anyhow::Result<UpdateStatus> {
        let url = format!(
            "{}/repos/{}/releases/latest",
            self.api_base.trim_end_matches('/'),
            self.repository
        );

        let client = reqwest::Client::builder()
            .timeout(CHECK_TIMEOUT)
            .user_agent(concat!("allowsyncd/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let response = client
            .get(&url)
            .header("Accept", "application/vnd.github+json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("Release lookup failed: {}", status);
        }

        let release: Release = response.json().await?;
        let latest = release.tag_name.trim_start_matches('v').to_string();
        info!("Found latest version: {}", latest);

        if is_newer(&latest, &self.current)? {
            Ok(UpdateStatus::Available {
                latest,
                url: release.html_url,
            })
        } else {
            Ok(UpdateStatus::UpToDate)
        }
    }
}

impl Default for UpdateChecker {
    fn default() -> Self {
        Self::new()
    }
}

/// Run the update check unless the policy disables it or shutdown wins
pub async fn run_update_check(
    checker: UpdateChecker,
    policy: UpdatePolicy,
    shutdown: CancellationToken,
) {
    if policy == UpdatePolicy::Disabled {
        debug!("Update checks disabled");
        return;
    }

    let result = tokio::select! {
        biased;
        _ = shutdown.cancelled() => return,
        result = checker.check() => result,
    };

    match (result, policy) {
        (Ok(UpdateStatus::Available { latest, url }), UpdatePolicy::Notify) => {
            warn!(
                "A newer version is available: {} (running {}). Download: {}",
                latest, checker.current, url
            );
        }
        (Ok(UpdateStatus::UpToDate), UpdatePolicy::Notify) => {
            info!("Current binary is the latest version {}", checker.current);
        }
        (Ok(_), _) => {}
        (Err(e), _) => warn!("Error finding latest version: {}", e),
    }
}

/// Semver precedence of `latest` over `current`
///
/// Build metadata does not take part in precedence.
fn is_newer(latest: &str, current: &str) -> anyhow::Result<bool> {
    let mut latest = Version::parse(latest)
        .map_err(|e| anyhow::anyhow!("Release tag '{}' is not a version: {}", latest, e))?;
    let mut current = Version::parse(current)
        .map_err(|e| anyhow::anyhow!("Running version '{}' is not valid: {}", current, e))?;
    latest.build = BuildMetadata::EMPTY;
    current.build = BuildMetadata::EMPTY;
    Ok(latest > current)
}
