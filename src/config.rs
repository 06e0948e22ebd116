//! Engine configuration.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::ReachabilityError;
use crate::types::{Check, Protocol};

/// Which checks run and how failures are reported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct EngineConfig {
    /// Stop at the first failing check. When false, `diagnose` runs every
    /// enabled check and reports all failures.
    #[serde(default = "default_true")]
    pub fail_fast: bool,
    #[serde(default = "default_true")]
    pub network_acls: bool,
    #[serde(default = "default_true")]
    pub security_groups: bool,
    #[serde(default = "default_true")]
    pub route_tables: bool,
    /// Only applies to requests carrying a NAT path.
    #[serde(default = "default_true")]
    pub nat_gateway: bool,
    /// Protocol for requests that do not name one.
    #[serde(default)]
    #[schema(value_type = String)]
    pub protocol: Protocol,
}

fn default_true() -> bool {
    true
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            fail_fast: true,
            network_acls: true,
            security_groups: true,
            route_tables: true,
            nat_gateway: true,
            protocol: Protocol::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_json(json: &str) -> Result<Self, ReachabilityError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    pub fn with_protocol(mut self, protocol: Protocol) -> Self {
        self.protocol = protocol;
        self
    }

    /// Turn a single check on or off.
    pub fn with_check(mut self, check: Check, enabled: bool) -> Self {
        match check {
            Check::NetworkAcl => self.network_acls = enabled,
            Check::SecurityGroup => self.security_groups = enabled,
            Check::RouteTable => self.route_tables = enabled,
            Check::NatGateway => self.nat_gateway = enabled,
        }
        self
    }

    pub fn is_enabled(&self, check: Check) -> bool {
        match check {
            Check::NetworkAcl => self.network_acls,
            Check::SecurityGroup => self.security_groups,
            Check::RouteTable => self.route_tables,
            Check::NatGateway => self.nat_gateway,
        }
    }
}
