//! Reachability requests.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::net::IpAddr;

use ipnet::IpNet;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::endpoint::Endpoint;
use super::network_acl::{NetworkAcl, NetworkAclEntry};
use super::port_range::PortRange;
use super::protocol::Protocol;
use super::route_table::RouteTable;
use super::security_group::SecurityGroup;

/// The network objects governing one side of a path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ResourceNetwork {
    pub vpc_id: String,
    #[serde(default)]
    pub subnet_ids: Vec<String>,
    #[serde(default)]
    pub network_acls: Vec<NetworkAcl>,
    #[serde(default)]
    pub security_groups: Vec<SecurityGroup>,
    /// Tables explicitly associated with `subnet_ids`.
    #[serde(default)]
    pub route_tables: Vec<RouteTable>,
    /// All tables of the VPC, used when a subnet has no explicit association.
    #[serde(default)]
    pub vpc_route_tables: Vec<RouteTable>,
}

impl ResourceNetwork {
    pub fn new(vpc_id: impl Into<String>) -> Self {
        ResourceNetwork {
            vpc_id: vpc_id.into(),
            ..Default::default()
        }
    }

    pub fn with_subnets(mut self, subnet_ids: &[&str]) -> Self {
        self.subnet_ids = subnet_ids.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_network_acl(mut self, acl: NetworkAcl) -> Self {
        self.network_acls.push(acl);
        self
    }

    pub fn with_security_group(mut self, group: SecurityGroup) -> Self {
        self.security_groups.push(group);
        self
    }

    pub fn with_route_table(mut self, table: RouteTable) -> Self {
        self.route_tables.push(table);
        self
    }

    pub fn with_vpc_route_table(mut self, table: RouteTable) -> Self {
        self.vpc_route_tables.push(table);
        self
    }

    pub fn security_group_ids(&self) -> Vec<String> {
        self.security_groups.iter().map(|g| g.id.clone()).collect()
    }
}

/// The initiating side, e.g. a compute instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SourceResource {
    #[schema(value_type = Vec<String>)]
    pub addresses: Vec<IpAddr>,
    pub network: ResourceNetwork,
}

impl SourceResource {
    pub fn new(addresses: Vec<IpAddr>, network: ResourceNetwork) -> Self {
        SourceResource { addresses, network }
    }

    /// Each address as a host network.
    pub fn address_networks(&self) -> Vec<IpNet> {
        self.addresses.iter().copied().map(IpNet::from).collect()
    }
}

/// The receiving side, e.g. a database spread over several subnets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DestinationResource {
    #[serde(with = "crate::cidr::serde_networks")]
    #[schema(value_type = Vec<String>)]
    pub subnet_cidrs: Vec<IpNet>,
    pub ports: Vec<u16>,
    pub network: ResourceNetwork,
}

impl DestinationResource {
    pub fn new(subnet_cidrs: Vec<IpNet>, ports: Vec<u16>, network: ResourceNetwork) -> Self {
        DestinationResource {
            subnet_cidrs,
            ports,
            network,
        }
    }
}

/// Outbound path through a NAT gateway to a public destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct NatPathQuery {
    /// Egress entries of the NAT subnet's network ACL.
    pub egress_entries: Vec<NetworkAclEntry>,
    /// Ingress entries of the NAT subnet's network ACL.
    pub ingress_entries: Vec<NetworkAclEntry>,
    /// Route table of the NAT subnet.
    pub route_table: RouteTable,
    pub src_subnet_id: String,
    pub nat_subnet_id: String,
    pub source: Endpoint,
    /// Must carry the destination port.
    pub destination: Endpoint,
    /// Ephemeral ports the source uses; `None` is only satisfied by
    /// entries without a port range.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src_port_range: Option<PortRange>,
    #[serde(default)]
    #[schema(value_type = String)]
    pub protocol: Protocol,
}

/// A full source to destination diagnosis request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ReachabilityRequest {
    pub source: SourceResource,
    pub destination: DestinationResource,
    /// Defaults to the engine's configured protocol.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>)]
    pub protocol: Option<Protocol>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nat: Option<NatPathQuery>,
}

impl ReachabilityRequest {
    pub fn new(source: SourceResource, destination: DestinationResource) -> Self {
        ReachabilityRequest {
            source,
            destination,
            protocol: None,
            nat: None,
        }
    }

    pub fn with_protocol(mut self, protocol: Protocol) -> Self {
        self.protocol = Some(protocol);
        self
    }

    pub fn with_nat(mut self, nat: NatPathQuery) -> Self {
        self.nat = Some(nat);
        self
    }
}

impl Display for ReachabilityRequest {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(
            f,
            "{} [{}] -> {} [{}] port(s) {}",
            self.source.network.vpc_id,
            self.source.addresses.iter().join(", "),
            self.destination.network.vpc_id,
            self.destination.subnet_cidrs.iter().join(", "),
            self.destination.ports.iter().join(", ")
        )
    }
}
