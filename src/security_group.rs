//! Security group evaluation.
//!
//! Security groups are allow-only and unordered: any applicable rule grants.
//! A rule that references one of the remote side's groups grants before any
//! CIDR is looked at.

use std::collections::BTreeSet;
use std::net::IpAddr;

use ipnet::IpNet;
use itertools::Itertools;
use tracing::debug;

use crate::cidr::overlaps;
use crate::error::ReachabilityError;
use crate::rule_match::{Remote, referenced_group, rule_applies};
use crate::traits::{NetworkResource, resource_ids};
use crate::types::{Direction, Protocol, SecurityGroup, SecurityGroupRule};

/// Why a rule set allowed the traffic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Grant {
    /// A rule references a group the remote side belongs to.
    ReferencedGroup { group_id: String },
    /// Every remote network is overlapped by some applicable rule.
    Networks,
    /// An applicable rule's CIDR contains the remote address.
    Address { cidr: IpNet },
}

/// The group that granted access in [`evaluate_groups`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupGrant {
    pub group_id: String,
    pub grant: Grant,
}

/// Require every remote network to be reachable through the rule set.
pub fn evaluate_cidr_mode(
    rules: &[SecurityGroupRule],
    remote_cidrs: &[IpNet],
    remote_group_ids: &[String],
    protocol: Protocol,
    port: u16,
    resource_id: &str,
) -> Result<Grant, ReachabilityError> {
    let mut residual: BTreeSet<IpNet> = remote_cidrs.iter().copied().collect();

    for rule in rules.iter().filter(|rule| rule_applies(rule, protocol, port)) {
        if let Some(group_id) = referenced_group(rule, remote_group_ids) {
            return Ok(Grant::ReferencedGroup {
                group_id: group_id.to_string(),
            });
        }
        residual.retain(|remote| !rule.cidr_ranges.iter().any(|cidr| overlaps(cidr, remote)));
    }

    if remote_cidrs.is_empty() {
        return Err(ReachabilityError::Validation(format!(
            "security group {resource_id} has no remote IP ranges to check for {protocol} port {port}"
        )));
    }
    if residual.is_empty() {
        return Ok(Grant::Networks);
    }

    Err(ReachabilityError::Validation(format!(
        "security group {resource_id} is not allowing {protocol} traffic to/from IP ranges {} for port(s) {port}",
        residual.iter().join(", ")
    )))
}

/// Grant on the first applicable rule that references a remote group or
/// contains the remote address.
pub fn evaluate_ip_mode(
    rules: &[SecurityGroupRule],
    remote_ip: IpAddr,
    remote_group_ids: &[String],
    protocol: Protocol,
    port: u16,
    resource_id: &str,
) -> Result<Grant, ReachabilityError> {
    for rule in rules.iter().filter(|rule| rule_applies(rule, protocol, port)) {
        if let Some(group_id) = referenced_group(rule, remote_group_ids) {
            return Ok(Grant::ReferencedGroup {
                group_id: group_id.to_string(),
            });
        }
        if let Some(cidr) = rule.cidr_ranges.iter().find(|cidr| cidr.contains(&remote_ip)) {
            return Ok(Grant::Address { cidr: *cidr });
        }
    }

    Err(ReachabilityError::Validation(format!(
        "security group {resource_id} is not allowing {protocol} traffic to/from IP {remote_ip} for port(s) {port}"
    )))
}

fn evaluate_group(
    group: &SecurityGroup,
    direction: Direction,
    remote: Remote<'_>,
    remote_group_ids: &[String],
    protocol: Protocol,
    port: u16,
) -> Result<Grant, ReachabilityError> {
    let rules = group.rules(direction);
    match remote {
        Remote::Networks(cidrs) => {
            evaluate_cidr_mode(rules, cidrs, remote_group_ids, protocol, port, &group.id)
        }
        Remote::Addresses(addrs) => {
            let mut grants = addrs.iter().map(|ip| {
                evaluate_ip_mode(rules, *ip, remote_group_ids, protocol, port, &group.id)
            });
            let first = grants.next().ok_or_else(|| {
                ReachabilityError::Validation(format!(
                    "security group {} has no remote address to check",
                    group.id
                ))
            })??;
            // Every remaining address must be granted too.
            for grant in grants {
                grant?;
            }
            Ok(first)
        }
    }
}

/// Scan `groups` until one grants the traffic in `direction`.
///
/// When none does, the error names every scanned group and carries each
/// group's own failure.
pub fn evaluate_groups(
    groups: &[SecurityGroup],
    direction: Direction,
    remote: Remote<'_>,
    remote_group_ids: &[String],
    protocol: Protocol,
    port: u16,
) -> Result<GroupGrant, ReachabilityError> {
    let mut failures = Vec::with_capacity(groups.len());

    for group in groups {
        match evaluate_group(group, direction, remote, remote_group_ids, protocol, port) {
            Ok(grant) => {
                debug!(
                    event = "SecurityGroup",
                    phase = "Grant",
                    group = group.resource_id(),
                    direction = %direction,
                    grant = ?grant
                );
                return Ok(GroupGrant {
                    group_id: group.id.clone(),
                    grant,
                });
            }
            Err(err) => failures.push(err.message().to_string()),
        }
    }

    if groups.is_empty() {
        return Err(ReachabilityError::TrafficNotAllowed {
            resource_id: String::new(),
            direction,
            message: format!(
                "no security groups attached to allow {direction} {protocol} traffic on port {port}"
            ),
        });
    }

    let ids = resource_ids(groups);
    Err(ReachabilityError::TrafficNotAllowed {
        resource_id: ids.clone(),
        direction,
        message: format!(
            "review security group(s) {ids} for rules allowing {direction} {protocol} traffic on port {port}: {}",
            failures.join("; ")
        ),
    })
}
