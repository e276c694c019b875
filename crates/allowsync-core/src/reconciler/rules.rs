// # Rule selection (rule-based variant)
//
// Every rule whose TCP destination-port minimum is an allowed port is cloned
// with its source replaced by the desired host CIDR. Rules outside the port
// set are not part of the result.

use std::net::IpAddr;

use crate::model::{SecurityRule, host_cidr};

/// Build the replacement rule list for `address`
pub fn select_rules(
    rules: &[SecurityRule],
    address: IpAddr,
    allowed_ports: &[u16],
) -> Vec<SecurityRule> {
    let source = host_cidr(address);

    rules
        .iter()
        .filter(|rule| {
            rule.tcp_destination_port_min
                .is_some_and(|port| allowed_ports.contains(&port))
        })
        .map(|rule| SecurityRule {
            source: Some(source.clone()),
            ..rule.clone()
        })
        .collect()
}
