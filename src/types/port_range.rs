//! Inclusive port ranges.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::ReachabilityError;

/// An inclusive `from..=to` port range. `from <= to` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(try_from = "RawPortRange")]
pub struct PortRange {
    pub from: u16,
    pub to: u16,
}

#[derive(Deserialize)]
struct RawPortRange {
    from: u16,
    to: u16,
}

impl TryFrom<RawPortRange> for PortRange {
    type Error = ReachabilityError;

    fn try_from(raw: RawPortRange) -> Result<Self, Self::Error> {
        PortRange::new(raw.from, raw.to)
    }
}

impl PortRange {
    pub fn new(from: u16, to: u16) -> Result<Self, ReachabilityError> {
        if from > to {
            return Err(ReachabilityError::Validation(format!(
                "port range {from}-{to} is inverted"
            )));
        }
        Ok(PortRange { from, to })
    }

    pub fn single(port: u16) -> Self {
        PortRange { from: port, to: port }
    }

    pub fn contains(&self, port: u16) -> bool {
        self.from <= port && port <= self.to
    }
}

impl Display for PortRange {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        if self.from == self.to {
            write!(f, "{}", self.from)
        } else {
            write!(f, "{}-{}", self.from, self.to)
        }
    }
}

impl FromStr for PortRange {
    type Err = ReachabilityError;

    /// Accepts `443` or `1024-65535`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse_port = |p: &str| {
            p.trim()
                .parse::<u16>()
                .map_err(|_| ReachabilityError::Validation(format!("malformed port range '{s}'")))
        };
        match s.split_once('-') {
            Some((from, to)) => PortRange::new(parse_port(from)?, parse_port(to)?),
            None => Ok(PortRange::single(parse_port(s)?)),
        }
    }
}
