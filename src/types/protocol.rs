//! IP protocol selector used by ACL entries, security group rules and queries.

use std::collections::HashMap;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::error::ReachabilityError;

/// Well-known protocol names accepted in place of their IANA numbers.
static PROTOCOL_NAMES: Lazy<HashMap<&'static str, u8>> = Lazy::new(|| {
    HashMap::from([
        ("icmp", 1),
        ("igmp", 2),
        ("tcp", 6),
        ("udp", 17),
        ("gre", 47),
        ("esp", 50),
        ("ah", 51),
        ("icmpv6", 58),
        ("sctp", 132),
    ])
});

/// Either every protocol (`"-1"` / `"all"`) or one specific IP protocol.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub enum Protocol {
    All,
    Icmp,
    #[default]
    Tcp,
    Udp,
    Icmpv6,
    Other(u8),
}

impl Protocol {
    pub fn from_number(number: u8) -> Self {
        match number {
            1 => Protocol::Icmp,
            6 => Protocol::Tcp,
            17 => Protocol::Udp,
            58 => Protocol::Icmpv6,
            n => Protocol::Other(n),
        }
    }

    /// True if a rule carrying `self` applies to traffic of `requested`.
    pub fn admits(&self, requested: Protocol) -> bool {
        *self == Protocol::All || *self == requested
    }

    /// Port ranges are only meaningful for TCP and UDP.
    pub fn has_ports(&self) -> bool {
        matches!(self, Protocol::Tcp | Protocol::Udp)
    }
}

impl Display for Protocol {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Protocol::All => write!(f, "all"),
            Protocol::Icmp => write!(f, "icmp"),
            Protocol::Tcp => write!(f, "tcp"),
            Protocol::Udp => write!(f, "udp"),
            Protocol::Icmpv6 => write!(f, "icmpv6"),
            Protocol::Other(n) => write!(f, "{n}"),
        }
    }
}

impl FromStr for Protocol {
    type Err = ReachabilityError;

    /// Accepts:
    /// - `-1` or `all`
    /// - a decimal protocol number, e.g. `6`
    /// - a well-known name, e.g. `tcp`, `UDP`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s == "-1" || s.eq_ignore_ascii_case("all") {
            return Ok(Protocol::All);
        }
        if let Ok(number) = s.parse::<u8>() {
            return Ok(Protocol::from_number(number));
        }
        PROTOCOL_NAMES
            .get(s.to_ascii_lowercase().as_str())
            .map(|n| Protocol::from_number(*n))
            .ok_or_else(|| ReachabilityError::Validation(format!("unknown protocol '{s}'")))
    }
}

impl TryFrom<String> for Protocol {
    type Error = ReachabilityError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Protocol> for String {
    fn from(protocol: Protocol) -> Self {
        protocol.to_string()
    }
}
