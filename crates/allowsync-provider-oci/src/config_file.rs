// # OCI CLI Config File
//
// Reads API-key credentials from the OCI CLI config file (`~/.oci/config`).
//
// ## File Format
//
// ```text
// [DEFAULT]
// user=ocid1.user.oc1..aaaa
// fingerprint=20:3b:97:13:55:1c:...
// key_file=~/.oci/oci_api_key.pem
// tenancy=ocid1.tenancy.oc1..aaaa
// region=us-ashburn-1
//
// [OTHER]
// region=eu-frankfurt-1
// ```
//
// Named profiles inherit any key they do not set from `[DEFAULT]`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use allowsync_core::{Error, Result};

/// Profile used when none is configured
pub const DEFAULT_PROFILE: &str = "DEFAULT";

/// Credentials read from one profile
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigProfile {
    pub user: String,
    pub tenancy: String,
    pub fingerprint: String,
    pub key_file: PathBuf,
    pub region: Option<String>,
}

/// Default config file location, `~/.oci/config`
pub fn default_config_path() -> Result<PathBuf> {
    dirs::home_dir()
        .map(|home| home.join(".oci").join("config"))
        .ok_or_else(|| Error::config("Cannot locate home directory for ~/.oci/config"))
}

/// Read and parse one profile from a config file
pub fn load_profile(path: &Path, profile: &str) -> Result<ConfigProfile> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::config(format!(
            "Failed to read OCI config file {}: {}",
            path.display(),
            e
        ))
    })?;

    parse_profile(&content, profile)
}

/// Parse one profile out of config file text
pub fn parse_profile(content: &str, profile: &str) -> Result<ConfigProfile> {
    let sections = parse_sections(content);

    let selected = sections
        .get(profile)
        .ok_or_else(|| Error::config(format!("OCI config profile [{}] not found", profile)))?;

    let mut values = sections.get(DEFAULT_PROFILE).cloned().unwrap_or_default();
    values.extend(selected.clone());

    let required = |key: &str| -> Result<String> {
        values
            .get(key)
            .filter(|v| !v.is_empty())
            .cloned()
            .ok_or_else(|| {
                Error::config(format!(
                    "OCI config profile [{}] is missing '{}'",
                    profile, key
                ))
            })
    };

    Ok(ConfigProfile {
        user: required("user")?,
        tenancy: required("tenancy")?,
        fingerprint: required("fingerprint")?,
        key_file: expand_home(&required("key_file")?),
        region: values.get("region").filter(|v| !v.is_empty()).cloned(),
    })
}

fn parse_sections(content: &str) -> HashMap<String, HashMap<String, String>> {
    let mut sections: HashMap<String, HashMap<String, String>> = HashMap::new();
    let mut current: Option<String> = None;

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }

        if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            let name = name.trim().to_string();
            sections.entry(name.clone()).or_default();
            current = Some(name);
            continue;
        }

        if let (Some(section), Some((key, value))) = (&current, line.split_once('=')) {
            sections
                .entry(section.clone())
                .or_default()
                .insert(key.trim().to_string(), value.trim().to_string());
        }
    }

    sections
}

/// Expand a leading `~/` to the home directory
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = "\
# managed by oci setup config
[DEFAULT]
user=ocid1.user.oc1..default
fingerprint=aa:bb
key_file=/keys/default.pem
tenancy=ocid1.tenancy.oc1..t
region=us-ashburn-1

[FRANKFURT]
region = eu-frankfurt-1
key_file = /keys/fra.pem
";

    #[test]
    fn default_profile_is_read() {
        let profile = parse_profile(CONFIG, DEFAULT_PROFILE).unwrap();
        assert_eq!(profile.user, "ocid1.user.oc1..default");
        assert_eq!(profile.tenancy, "ocid1.tenancy.oc1..t");
        assert_eq!(profile.fingerprint, "aa:bb");
        assert_eq!(profile.key_file, PathBuf::from("/keys/default.pem"));
        assert_eq!(profile.region.as_deref(), Some("us-ashburn-1"));
    }

    #[test]
    fn named_profile_inherits_from_default() {
        let profile = parse_profile(CONFIG, "FRANKFURT").unwrap();
        assert_eq!(profile.user, "ocid1.user.oc1..default");
        assert_eq!(profile.key_file, PathBuf::from("/keys/fra.pem"));
        assert_eq!(profile.region.as_deref(), Some("eu-frankfurt-1"));
    }

    #[test]
    fn missing_profile_or_key_is_a_config_error() {
        let err = parse_profile(CONFIG, "NOPE").unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let err = parse_profile("[DEFAULT]\nuser=u\n", DEFAULT_PROFILE).unwrap_err();
        assert!(err.to_string().contains("tenancy"));
    }

    #[test]
    fn home_is_expanded() {
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_home("~/.oci/key.pem"), home.join(".oci/key.pem"));
        }
        assert_eq!(expand_home("/abs/key.pem"), PathBuf::from("/abs/key.pem"));
    }
}
