use std::fmt::{Display, Formatter, Result as FmtResult};
use std::net::IpAddr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::cidr::parse_address;
use crate::error::ReachabilityError;

/// An address with an optional port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub struct Endpoint {
    #[schema(value_type = String)]
    pub ip: IpAddr,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

impl Endpoint {
    pub fn new(ip: IpAddr, port: Option<u16>) -> Self {
        Endpoint { ip, port }
    }

    pub fn require_port(&self) -> Result<u16, ReachabilityError> {
        self.port.ok_or_else(|| {
            ReachabilityError::Validation(format!("endpoint {} has no port", self.ip))
        })
    }
}

impl Display for Endpoint {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match (self.ip, self.port) {
            (IpAddr::V6(ip), Some(port)) => write!(f, "[{ip}]:{port}"),
            (ip, Some(port)) => write!(f, "{ip}:{port}"),
            (ip, None) => write!(f, "{ip}"),
        }
    }
}

impl FromStr for Endpoint {
    type Err = ReachabilityError;

    /// Accepts `10.0.0.5`, `10.0.0.5:5432`, `2001:db8::1` and `[2001:db8::1]:5432`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(socket) = s.parse::<std::net::SocketAddr>() {
            return Ok(Endpoint::new(socket.ip(), Some(socket.port())));
        }
        Ok(Endpoint::new(parse_address(s)?, None))
    }
}
