// # Diff computation (list-based variant)
//
// to_add    = desired − addresses(current)
// to_remove = { e ∈ current | e.address ∉ desired }
//
// Equality is by normalized address string, never by entry id.

use std::collections::{BTreeSet, HashSet};
use std::net::IpAddr;

use crate::model::{AllowListEntry, DesiredSet, Diff};

/// Compute the changes needed to turn `current` into `desired`
pub fn compute_diff(desired: &DesiredSet, current: &[AllowListEntry]) -> Diff {
    let desired_keys: HashSet<String> = desired.iter().map(|ip| ip.to_string()).collect();
    let current_keys: HashSet<&str> = current.iter().map(|e| e.address.as_str()).collect();

    let to_add: BTreeSet<IpAddr> = desired
        .iter()
        .filter(|ip| !current_keys.contains(ip.to_string().as_str()))
        .copied()
        .collect();

    let to_remove: Vec<AllowListEntry> = current
        .iter()
        .filter(|entry| !desired_keys.contains(&entry.address))
        .cloned()
        .collect();

    Diff { to_add, to_remove }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    fn desired(addrs: &[&str]) -> DesiredSet {
        addrs.iter().map(|a| ip(a)).collect()
    }

    #[test]
    fn stale_entry_is_removed_and_kept_entry_untouched() {
        let current = vec![
            AllowListEntry::new("a", "1.2.3.4"),
            AllowListEntry::new("b", "9.9.9.9"),
        ];

        let diff = compute_diff(&desired(&["1.2.3.4"]), &current);

        assert!(diff.to_add.is_empty());
        assert_eq!(diff.to_remove, vec![AllowListEntry::new("b", "9.9.9.9")]);
    }

    #[test]
    fn empty_list_gets_every_desired_address() {
        let diff = compute_diff(&desired(&["1.2.3.4", "5.6.7.8"]), &[]);

        assert_eq!(
            diff.to_add.into_iter().collect::<Vec<_>>(),
            vec![ip("1.2.3.4"), ip("5.6.7.8")]
        );
        assert!(diff.to_remove.is_empty());
    }

    #[test]
    fn comparison_uses_normalized_addresses() {
        let current = vec![
            AllowListEntry::new("a", "1.2.3.4/32"),
            AllowListEntry::new("b", "2001:DB8::1"),
        ];

        let diff = compute_diff(&desired(&["1.2.3.4", "2001:db8::1"]), &current);
        assert!(diff.is_empty());
    }

    #[test]
    fn ranges_never_match_single_addresses() {
        let current = vec![AllowListEntry::new("net", "1.2.3.0/24")];

        let diff = compute_diff(&desired(&["1.2.3.4"]), &current);

        assert_eq!(diff.to_add.len(), 1);
        assert_eq!(diff.to_remove.len(), 1);
        assert_eq!(diff.to_remove[0].id, "net");
    }

    #[test]
    fn duplicate_entries_for_a_desired_address_are_left_alone() {
        let current = vec![
            AllowListEntry::new("a", "1.2.3.4"),
            AllowListEntry::new("a2", "1.2.3.4"),
        ];

        let diff = compute_diff(&desired(&["1.2.3.4"]), &current);
        assert!(diff.is_empty());
    }

    #[test]
    fn applying_a_diff_converges() {
        let want = desired(&["1.2.3.4", "5.6.7.8", "10.0.0.1"]);
        let mut current = vec![
            AllowListEntry::new("a", "1.2.3.4"),
            AllowListEntry::new("b", "9.9.9.9"),
            AllowListEntry::new("c", "8.8.8.8"),
        ];

        let diff = compute_diff(&want, &current);

        // Simulate the provider applying it
        current.retain(|e| !diff.to_remove.contains(e));
        for (n, addr) in diff.to_add.iter().enumerate() {
            current.push(AllowListEntry::new(format!("new-{}", n), &addr.to_string()));
        }

        assert!(compute_diff(&want, &current).is_empty());
    }
}
