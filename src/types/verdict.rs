//! Evaluation outcomes.

use std::fmt::{Display, Formatter, Result as FmtResult};

use ipnet::IpNet;
use serde::{Deserialize, Serialize};
use strum_macros::{Display as StrumDisplay, EnumIter};
use utoipa::ToSchema;

use crate::error::{ErrorKind, ReachabilityError};

/// The ACL entry that decided a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub struct MatchedEntry {
    pub rule_number: u32,
    #[serde(with = "crate::cidr::serde_network")]
    #[schema(value_type = String)]
    pub cidr_block: IpNet,
}

impl Display for MatchedEntry {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "rule {} ({})", self.rule_number, self.cidr_block)
    }
}

/// Per-port state of a network ACL scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum PortVerdict {
    /// No entry matched; the provider's catch-all denies it.
    #[default]
    Unresolved,
    Allowed(MatchedEntry),
    Denied(MatchedEntry),
}

impl PortVerdict {
    pub fn is_allowed(&self) -> bool {
        matches!(self, PortVerdict::Allowed(_))
    }

    pub fn entry(&self) -> Option<&MatchedEntry> {
        match self {
            PortVerdict::Unresolved => None,
            PortVerdict::Allowed(entry) | PortVerdict::Denied(entry) => Some(entry),
        }
    }
}

impl Display for PortVerdict {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            PortVerdict::Unresolved => write!(f, "no matching rule"),
            PortVerdict::Allowed(entry) => write!(f, "allowed by {entry}"),
            PortVerdict::Denied(entry) => write!(f, "denied by {entry}"),
        }
    }
}

/// The checks the orchestrator runs, in execution order.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    StrumDisplay,
    EnumIter,
    ToSchema,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Check {
    NetworkAcl,
    SecurityGroup,
    RouteTable,
    NatGateway,
}

/// Structured reason for a denial.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Cause {
    pub kind: ErrorKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
    pub message: String,
}

impl From<&ReachabilityError> for Cause {
    fn from(err: &ReachabilityError) -> Self {
        Cause {
            kind: err.kind(),
            resource_id: err.resource_id().map(str::to_string),
            message: err.message().to_string(),
        }
    }
}

impl Display for Cause {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CheckReport {
    pub check: Check,
    pub passed: bool,
    pub message: String,
}

impl CheckReport {
    pub fn passed(check: Check, message: impl Into<String>) -> Self {
        CheckReport {
            check,
            passed: true,
            message: message.into(),
        }
    }

    pub fn failed(check: Check, err: &ReachabilityError) -> Self {
        CheckReport {
            check,
            passed: false,
            message: err.to_string(),
        }
    }
}

/// End-to-end reachability verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Verdict {
    pub allowed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<Cause>,
    #[serde(default)]
    pub checks: Vec<CheckReport>,
}

impl Verdict {
    pub fn allowed(checks: Vec<CheckReport>) -> Self {
        Verdict {
            allowed: true,
            reason: None,
            checks,
        }
    }

    pub fn denied(cause: Cause, checks: Vec<CheckReport>) -> Self {
        Verdict {
            allowed: false,
            reason: Some(cause),
            checks,
        }
    }

    /// Reports of the checks that failed.
    pub fn failures(&self) -> impl Iterator<Item = &CheckReport> {
        self.checks.iter().filter(|report| !report.passed)
    }
}

impl Display for Verdict {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match &self.reason {
            None => write!(f, "Allowed"),
            Some(cause) => write!(f, "Denied({cause})"),
        }
    }
}
