use std::net::IpAddr;

use ipnet::IpNet;

use crate::cidr::{overlaps, port_in_range, range_covers};
use crate::types::{NetworkAclEntry, PortRange, Protocol, SecurityGroupRule};

/// The remote side an ACL entry's CIDR block is compared against.
#[derive(Debug, Clone, Copy)]
pub enum Remote<'a> {
    /// Subnet blocks, matched by overlap.
    Networks(&'a [IpNet]),
    /// Concrete addresses, matched by containment.
    Addresses(&'a [IpAddr]),
}

impl Remote<'_> {
    /// True if `block` reaches at least one remote network or address.
    pub fn reached_by(&self, block: &IpNet) -> bool {
        match self {
            Remote::Networks(nets) => nets.iter().any(|net| overlaps(block, net)),
            Remote::Addresses(addrs) => addrs.iter().any(|addr| block.contains(addr)),
        }
    }
}

/// Protocol and port test for an ACL entry. Port ranges only constrain
/// entries whose protocol carries ports.
pub(crate) fn entry_admits_port(entry: &NetworkAclEntry, protocol: Protocol, port: u16) -> bool {
    entry.protocol.admits(protocol)
        && (!entry.protocol.has_ports() || port_in_range(port, entry.port_range.as_ref()))
}

/// Like [`entry_admits_port`] but the entry must cover a whole port range.
pub(crate) fn entry_admits_range(
    entry: &NetworkAclEntry,
    protocol: Protocol,
    range: Option<&PortRange>,
) -> bool {
    entry.protocol.admits(protocol)
        && (!entry.protocol.has_ports() || range_covers(entry.port_range.as_ref(), range))
}

/// A security group rule applies when it allows every protocol, or the
/// requested protocol on a port inside its range.
pub(crate) fn rule_applies(rule: &SecurityGroupRule, protocol: Protocol, port: u16) -> bool {
    match rule.protocol {
        Protocol::All => true,
        p if p == protocol => !p.has_ports() || port_in_range(port, rule.port_range.as_ref()),
        _ => false,
    }
}

/// The first referenced group of `rule` that the remote side belongs to.
pub(crate) fn referenced_group<'a>(
    rule: &'a SecurityGroupRule,
    remote_group_ids: &[String],
) -> Option<&'a str> {
    rule.referenced_group_ids
        .iter()
        .find(|id| remote_group_ids.contains(id))
        .map(String::as_str)
}
