//! Network ACL records.

use ipnet::IpNet;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::cidr::parse_network;
use crate::error::ReachabilityError;

use super::direction::{Direction, RuleAction};
use super::port_range::PortRange;
use super::protocol::Protocol;

/// One numbered entry of a network ACL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub struct NetworkAclEntry {
    pub rule_number: u32,
    #[schema(value_type = String)]
    pub protocol: Protocol,
    pub rule_action: RuleAction,
    #[serde(with = "crate::cidr::serde_network")]
    #[schema(value_type = String)]
    pub cidr_block: IpNet,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port_range: Option<PortRange>,
    pub egress: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icmp_type: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icmp_code: Option<i32>,
}

/// The positional entry shape some inventories emit:
/// `(rule_number, protocol, action, cidr, icmp_type, icmp_code, port_from, port_to)`.
pub type NetworkAclEntryTuple = (
    u32,
    String,
    String,
    Option<String>,
    Option<i32>,
    Option<i32>,
    Option<u16>,
    Option<u16>,
);

impl NetworkAclEntry {
    pub fn new(
        rule_number: u32,
        protocol: Protocol,
        rule_action: RuleAction,
        cidr_block: IpNet,
        port_range: Option<PortRange>,
        direction: Direction,
    ) -> Self {
        NetworkAclEntry {
            rule_number,
            protocol,
            rule_action,
            cidr_block,
            port_range,
            egress: direction.is_egress(),
            icmp_type: None,
            icmp_code: None,
        }
    }

    pub fn direction(&self) -> Direction {
        Direction::from_egress(self.egress)
    }

    /// Build an entry from the positional tuple shape.
    ///
    /// Returns `Ok(None)` for tuples without an IPv4/IPv6 CIDR (e.g. entries
    /// keyed on a prefix list), which cannot take part in address matching.
    pub fn from_tuple(
        tuple: NetworkAclEntryTuple,
        direction: Direction,
    ) -> Result<Option<Self>, ReachabilityError> {
        let (rule_number, protocol, action, cidr, icmp_type, icmp_code, port_from, port_to) =
            tuple;
        let Some(cidr) = cidr.filter(|c| !c.trim().is_empty()) else {
            return Ok(None);
        };
        let rule_action = action.parse::<RuleAction>().map_err(|_| {
            ReachabilityError::Validation(format!(
                "network acl rule {rule_number} has unknown action '{action}'"
            ))
        })?;
        let port_range = match (port_from, port_to) {
            (Some(from), Some(to)) => Some(PortRange::new(from, to)?),
            (Some(port), None) | (None, Some(port)) => Some(PortRange::single(port)),
            (None, None) => None,
        };
        Ok(Some(NetworkAclEntry {
            rule_number,
            protocol: protocol.parse()?,
            rule_action,
            cidr_block: parse_network(&cidr)?,
            port_range,
            egress: direction.is_egress(),
            icmp_type,
            icmp_code,
        }))
    }
}

/// A network ACL with its subnet associations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct NetworkAcl {
    pub id: String,
    #[serde(default)]
    pub associations: Vec<String>,
    #[serde(default)]
    pub entries: Vec<NetworkAclEntry>,
}

impl NetworkAcl {
    pub fn new(id: impl Into<String>, entries: Vec<NetworkAclEntry>) -> Self {
        NetworkAcl {
            id: id.into(),
            associations: Vec::new(),
            entries,
        }
    }

    pub fn with_associations(mut self, subnet_ids: &[&str]) -> Self {
        self.associations = subnet_ids.iter().map(|s| s.to_string()).collect();
        self
    }
}

/// Filter `entries` to one direction and order them by rule number.
pub fn ordered_entries(entries: &[NetworkAclEntry], direction: Direction) -> Vec<&NetworkAclEntry> {
    entries
        .iter()
        .filter(|entry| entry.direction() == direction)
        .sorted_by_key(|entry| entry.rule_number)
        .collect()
}
