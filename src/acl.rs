//! Network ACL evaluation.
//!
//! Entries of one direction are scanned once per required port in ascending
//! rule-number order. The first entry whose protocol, port and CIDR match
//! decides the port; a port nothing matches falls through to the provider's
//! catch-all deny.

use std::collections::BTreeMap;
use std::net::IpAddr;

use ipnet::IpNet;
use itertools::Itertools;
use tracing::debug;

use crate::error::ReachabilityError;
use crate::rule_match::{Remote, entry_admits_port};
use crate::traits::NetworkResource;
use crate::types::{
    Direction, MatchedEntry, NetworkAcl, NetworkAclEntry, PortVerdict, Protocol, RuleAction,
    ordered_entries,
};

/// Ports that must be allowed, each with the protocol it is used with.
pub type RequiredPorts = BTreeMap<u16, Protocol>;

/// Per-port verdicts of one ACL in one direction.
pub type PortVerdicts = BTreeMap<u16, PortVerdict>;

/// Evaluate `entries` in `direction` against remote subnet blocks.
pub fn evaluate_direction(
    entries: &[NetworkAclEntry],
    direction: Direction,
    required_ports: &RequiredPorts,
    remote_cidrs: &[IpNet],
    resource_id: &str,
) -> Result<PortVerdicts, ReachabilityError> {
    evaluate_remote(
        entries,
        direction,
        required_ports,
        Remote::Networks(remote_cidrs),
        resource_id,
    )
}

/// Evaluate `entries` in `direction` against concrete remote addresses.
pub fn evaluate_direction_by_ip(
    entries: &[NetworkAclEntry],
    direction: Direction,
    required_ports: &RequiredPorts,
    remote_ips: &[IpAddr],
    resource_id: &str,
) -> Result<PortVerdicts, ReachabilityError> {
    evaluate_remote(
        entries,
        direction,
        required_ports,
        Remote::Addresses(remote_ips),
        resource_id,
    )
}

/// Scan one direction for every required port. Any port that is not
/// explicitly allowed fails the evaluation.
pub fn evaluate_remote(
    entries: &[NetworkAclEntry],
    direction: Direction,
    required_ports: &RequiredPorts,
    remote: Remote<'_>,
    resource_id: &str,
) -> Result<PortVerdicts, ReachabilityError> {
    let ordered = ordered_entries(entries, direction);
    let verdicts: PortVerdicts = required_ports
        .iter()
        .map(|(&port, &protocol)| (port, scan_port(&ordered, port, protocol, remote)))
        .collect();

    debug!(
        event = "NetworkAcl",
        phase = "Scan",
        acl = resource_id,
        direction = %direction,
        verdicts = ?verdicts
    );

    let denied = verdicts
        .iter()
        .filter(|(_, verdict)| !verdict.is_allowed())
        .map(|(port, verdict)| format!("{port} ({verdict})"))
        .join(", ");

    if denied.is_empty() {
        return Ok(verdicts);
    }

    Err(ReachabilityError::TrafficNotAllowed {
        resource_id: resource_id.to_string(),
        direction,
        message: format!(
            "network acl {resource_id} is not allowing {direction} traffic for port(s) {denied}"
        ),
    })
}

fn scan_port(
    ordered: &[&NetworkAclEntry],
    port: u16,
    protocol: Protocol,
    remote: Remote<'_>,
) -> PortVerdict {
    let Some(entry) = ordered
        .iter()
        .find(|entry| entry_admits_port(entry, protocol, port) && remote.reached_by(&entry.cidr_block))
    else {
        return PortVerdict::Unresolved;
    };

    let matched = MatchedEntry {
        rule_number: entry.rule_number,
        cidr_block: entry.cidr_block,
    };
    match entry.rule_action {
        RuleAction::Allow => PortVerdict::Allowed(matched),
        RuleAction::Deny => PortVerdict::Denied(matched),
    }
}

/// Evaluate several ACLs in the same direction. The first failing ACL is
/// returned with a hint naming the ACL, direction and ports to review.
pub fn evaluate_acls(
    acls: &[NetworkAcl],
    direction: Direction,
    required_ports: &RequiredPorts,
    remote: Remote<'_>,
) -> Result<(), ReachabilityError> {
    let ports = required_ports.keys().join(", ");
    for acl in acls {
        evaluate_remote(&acl.entries, direction, required_ports, remote, acl.resource_id())
            .map_err(|err| {
                err.with_context(format!(
                    "review {} for {direction} rules allowing port(s) {ports}",
                    acl.describe()
                ))
            })?;
    }
    Ok(())
}
