//! Data model shared by the reconciler, providers and triggers
//!
//! Addresses are compared by their canonical string form. Provider-side text
//! goes through [`normalize_address`] before it is stored in an
//! [`AllowListEntry`], so `"001.002.003.004"`-style oddities or a `/32` suffix
//! never cause churn.

use std::collections::BTreeSet;
use std::fmt;
use std::net::IpAddr;

/// Destination ports whose rules are rewritten by the rule-based variant
pub const DEFAULT_ALLOWED_PORTS: [u16; 3] = [80, 443, 7000];

/// Normalize provider-side address text to its canonical form
///
/// - Valid IPs are rendered with `IpAddr::to_string()`
/// - Full-host prefixes (`/32` for v4, `/128` for v6) are stripped
/// - Anything else is returned trimmed and otherwise untouched
pub fn normalize_address(raw: &str) -> String {
    let trimmed = raw.trim();

    if let Ok(ip) = trimmed.parse::<IpAddr>() {
        return ip.to_string();
    }

    if let Some((addr, prefix)) = trimmed.split_once('/') {
        if let Ok(ip) = addr.parse::<IpAddr>() {
            let full_host = match ip {
                IpAddr::V4(_) => prefix == "32",
                IpAddr::V6(_) => prefix == "128",
            };
            if full_host {
                return ip.to_string();
            }
        }
    }

    trimmed.to_string()
}

/// Render an address as a single-host CIDR (`/32` or `/128`)
pub fn host_cidr(ip: IpAddr) -> String {
    match ip {
        IpAddr::V4(v4) => format!("{}/32", v4),
        IpAddr::V6(v6) => format!("{}/128", v6),
    }
}

/// The addresses that should be present in the allow-list
///
/// Remembers the first address inserted as the primary one; the rule-based
/// variant can only apply a single address and uses that one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DesiredSet {
    addresses: BTreeSet<IpAddr>,
    primary: Option<IpAddr>,
}

impl DesiredSet {
    /// Create an empty desired set
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a desired set holding exactly one address
    pub fn single(ip: IpAddr) -> Self {
        let mut set = Self::new();
        set.insert(ip);
        set
    }

    /// Add an address, returning `false` if it was already present
    pub fn insert(&mut self, ip: IpAddr) -> bool {
        if self.primary.is_none() {
            self.primary = Some(ip);
        }
        self.addresses.insert(ip)
    }

    /// The first address ever inserted
    pub fn primary(&self) -> Option<IpAddr> {
        self.primary
    }

    pub fn contains(&self, ip: &IpAddr) -> bool {
        self.addresses.contains(ip)
    }

    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &IpAddr> {
        self.addresses.iter()
    }
}

impl FromIterator<IpAddr> for DesiredSet {
    fn from_iter<I: IntoIterator<Item = IpAddr>>(iter: I) -> Self {
        let mut set = Self::new();
        set.extend(iter);
        set
    }
}

impl Extend<IpAddr> for DesiredSet {
    fn extend<I: IntoIterator<Item = IpAddr>>(&mut self, iter: I) {
        for ip in iter {
            self.insert(ip);
        }
    }
}

impl fmt::Display for DesiredSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined: Vec<String> = self.addresses.iter().map(|ip| ip.to_string()).collect();
        write!(f, "[{}]", joined.join(", "))
    }
}

/// A provider-side allow-list item
///
/// The `id` is assigned by the provider and only matters for deletion.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AllowListEntry {
    /// Provider-assigned identifier
    pub id: String,
    /// Normalized address text
    pub address: String,
}

impl AllowListEntry {
    /// Create an entry, normalizing the address text
    pub fn new(id: impl Into<String>, address: &str) -> Self {
        Self {
            id: id.into(),
            address: normalize_address(address),
        }
    }
}

/// Changes required to converge a list-based allow-list
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diff {
    /// Desired addresses missing from the list
    pub to_add: BTreeSet<IpAddr>,
    /// Entries whose address is not desired
    pub to_remove: Vec<AllowListEntry>,
}

impl Diff {
    /// True when nothing needs to change
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }
}

/// A provider-side security rule (rule-based variant)
///
/// `details` is the provider's complete rule document. The reconciler only
/// reads the port and writes `source`; providers serialize everything else
/// back unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct SecurityRule {
    /// Provider-assigned identifier
    pub id: String,
    /// Source CIDR the rule allows
    pub source: Option<String>,
    /// Minimum of the TCP destination port range, if the rule is TCP-scoped
    pub tcp_destination_port_min: Option<u16>,
    /// Full provider rule document
    pub details: serde_json::Value,
}

/// Result of a single reconciliation pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Remote state already matched; no writes issued
    Unchanged,
    /// List entries were added and/or removed
    Applied {
        /// Number of addresses added
        added: usize,
        /// Number of entries removed
        removed: usize,
    },
    /// Security rules were rewritten in one replace call
    Replaced {
        /// Number of rules submitted
        rules: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_canonicalizes_and_strips_host_prefix() {
        assert_eq!(normalize_address(" 1.2.3.4 "), "1.2.3.4");
        assert_eq!(normalize_address("1.2.3.4/32"), "1.2.3.4");
        assert_eq!(normalize_address("2001:DB8::0001"), "2001:db8::1");
        assert_eq!(normalize_address("2001:db8::1/128"), "2001:db8::1");
    }

    #[test]
    fn normalize_keeps_ranges_verbatim() {
        assert_eq!(normalize_address("10.0.0.0/8"), "10.0.0.0/8");
        assert_eq!(normalize_address("1.2.3.4/31"), "1.2.3.4/31");
        assert_eq!(normalize_address("garbage"), "garbage");
    }

    #[test]
    fn host_cidr_by_family() {
        assert_eq!(host_cidr("1.2.3.4".parse().unwrap()), "1.2.3.4/32");
        assert_eq!(host_cidr("::1".parse().unwrap()), "::1/128");
    }

    #[test]
    fn desired_set_tracks_first_insert_as_primary() {
        let mut set = DesiredSet::new();
        assert_eq!(set.primary(), None);

        set.insert("9.9.9.9".parse().unwrap());
        set.insert("1.1.1.1".parse().unwrap());
        assert!(!set.insert("9.9.9.9".parse().unwrap()));

        assert_eq!(set.len(), 2);
        assert_eq!(set.primary(), Some("9.9.9.9".parse().unwrap()));
        assert_eq!(set.to_string(), "[1.1.1.1, 9.9.9.9]");
    }
}
