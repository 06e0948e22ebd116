//! Route table records.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use ipnet::IpNet;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use strum_macros::{Display as StrumDisplay, EnumString};
use utoipa::ToSchema;

use crate::error::ReachabilityError;

/// Gateway identifiers look like `igw-0abc123`, `pcx-1f2e`, `nat-09`.
static GATEWAY_ID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<kind>igw|eigw|pcx|nat|vgw|tgw|eni|vpce|lgw|cagw)-[0-9A-Za-z]+$")
        .expect("gateway id pattern is valid")
});

/// Where a route sends matching traffic.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum RouteTarget {
    Local,
    InternetGateway(String),
    PeeringConnection(String),
    NatGateway(String),
    Blackhole,
    /// A gateway the engine does not model (transit, VPN, endpoint, ...).
    Other(String),
}

impl RouteTarget {
    /// Classify a provider gateway identifier.
    pub fn from_gateway_id(id: &str) -> Result<Self, ReachabilityError> {
        let id = id.trim();
        match id {
            "local" => return Ok(RouteTarget::Local),
            "blackhole" => return Ok(RouteTarget::Blackhole),
            _ => {}
        }
        let caps = GATEWAY_ID.captures(id).ok_or_else(|| {
            ReachabilityError::Validation(format!("unrecognised route target '{id}'"))
        })?;
        Ok(match &caps["kind"] {
            "igw" => RouteTarget::InternetGateway(id.to_string()),
            "pcx" => RouteTarget::PeeringConnection(id.to_string()),
            "nat" => RouteTarget::NatGateway(id.to_string()),
            _ => RouteTarget::Other(id.to_string()),
        })
    }

    pub fn is_internet_gateway(&self) -> bool {
        matches!(self, RouteTarget::InternetGateway(_))
    }

    pub fn is_peering_connection(&self) -> bool {
        matches!(self, RouteTarget::PeeringConnection(_))
    }
}

impl Display for RouteTarget {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            RouteTarget::Local => write!(f, "local"),
            RouteTarget::Blackhole => write!(f, "blackhole"),
            RouteTarget::InternetGateway(id)
            | RouteTarget::PeeringConnection(id)
            | RouteTarget::NatGateway(id)
            | RouteTarget::Other(id) => write!(f, "{id}"),
        }
    }
}

impl FromStr for RouteTarget {
    type Err = ReachabilityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RouteTarget::from_gateway_id(s)
    }
}

impl TryFrom<String> for RouteTarget {
    type Error = ReachabilityError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        RouteTarget::from_gateway_id(&value)
    }
}

impl From<RouteTarget> for String {
    fn from(target: RouteTarget) -> Self {
        target.to_string()
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    StrumDisplay,
    EnumString,
    ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RouteState {
    #[default]
    Active,
    Blackhole,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub struct Route {
    #[serde(with = "crate::cidr::serde_network")]
    #[schema(value_type = String)]
    pub destination_cidr: IpNet,
    #[schema(value_type = String)]
    pub target: RouteTarget,
    #[serde(default)]
    pub state: RouteState,
}

impl Route {
    pub fn new(destination_cidr: IpNet, target: RouteTarget) -> Self {
        Route {
            destination_cidr,
            target,
            state: RouteState::Active,
        }
    }

    pub fn blackholed(mut self) -> Self {
        self.state = RouteState::Blackhole;
        self
    }

    /// Blackhole routes never forward traffic.
    pub fn is_usable(&self) -> bool {
        self.state == RouteState::Active && self.target != RouteTarget::Blackhole
    }
}

impl Display for Route {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{} -> {} ({})", self.destination_cidr, self.target, self.state)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RouteTable {
    pub id: String,
    /// Set on the VPC's main table, which governs unassociated subnets.
    #[serde(default)]
    pub main: bool,
    #[serde(default)]
    pub associations: Vec<String>,
    #[serde(default)]
    pub routes: Vec<Route>,
}

impl RouteTable {
    pub fn new(id: impl Into<String>, routes: Vec<Route>) -> Self {
        RouteTable {
            id: id.into(),
            main: false,
            associations: Vec::new(),
            routes,
        }
    }

    pub fn with_associations(mut self, subnet_ids: &[&str]) -> Self {
        self.associations = subnet_ids.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn as_main(mut self) -> Self {
        self.main = true;
        self
    }

    pub fn is_associated_with(&self, subnet_id: &str) -> bool {
        self.associations.iter().any(|a| a == subnet_id)
    }

    /// Active routes through a VPC peering connection.
    pub fn peering_routes(&self) -> impl Iterator<Item = &Route> {
        self.routes
            .iter()
            .filter(|route| route.is_usable() && route.target.is_peering_connection())
    }
}
