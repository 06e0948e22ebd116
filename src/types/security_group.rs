//! Security group records.

use ipnet::IpNet;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::direction::Direction;
use super::port_range::PortRange;
use super::protocol::Protocol;

/// An allow-only security group permission.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub struct SecurityGroupRule {
    #[schema(value_type = String)]
    pub protocol: Protocol,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port_range: Option<PortRange>,
    #[serde(default, with = "crate::cidr::serde_networks")]
    #[schema(value_type = Vec<String>)]
    pub cidr_ranges: Vec<IpNet>,
    #[serde(default)]
    pub referenced_group_ids: Vec<String>,
}

impl SecurityGroupRule {
    pub fn new(protocol: Protocol, port_range: Option<PortRange>) -> Self {
        SecurityGroupRule {
            protocol,
            port_range,
            cidr_ranges: Vec::new(),
            referenced_group_ids: Vec::new(),
        }
    }

    pub fn with_cidrs(mut self, cidrs: impl IntoIterator<Item = IpNet>) -> Self {
        self.cidr_ranges.extend(cidrs);
        self
    }

    pub fn with_group(mut self, group_id: impl Into<String>) -> Self {
        self.referenced_group_ids.push(group_id.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SecurityGroup {
    pub id: String,
    #[serde(default)]
    pub ingress: Vec<SecurityGroupRule>,
    #[serde(default)]
    pub egress: Vec<SecurityGroupRule>,
}

impl SecurityGroup {
    pub fn new(id: impl Into<String>) -> Self {
        SecurityGroup {
            id: id.into(),
            ingress: Vec::new(),
            egress: Vec::new(),
        }
    }

    pub fn with_ingress(mut self, rule: SecurityGroupRule) -> Self {
        self.ingress.push(rule);
        self
    }

    pub fn with_egress(mut self, rule: SecurityGroupRule) -> Self {
        self.egress.push(rule);
        self
    }

    pub fn rules(&self, direction: Direction) -> &[SecurityGroupRule] {
        match direction {
            Direction::Ingress => &self.ingress,
            Direction::Egress => &self.egress,
        }
    }
}
