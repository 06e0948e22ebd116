//! Canonical network records consumed by the evaluators.
//!
//! Records are read-only snapshots supplied per evaluation. CIDR fields
//! accept lenient literals (`10.0.0.5/24`, bare addresses) and serialize in
//! canonical `network/prefix` form.

mod direction;
mod endpoint;
mod network_acl;
mod port_range;
mod protocol;
mod request;
mod route_table;
mod security_group;
mod verdict;

pub use direction::{Direction, RuleAction};
pub use endpoint::Endpoint;
pub use network_acl::{NetworkAcl, NetworkAclEntry, NetworkAclEntryTuple, ordered_entries};
pub use port_range::PortRange;
pub use protocol::Protocol;
pub use request::{
    DestinationResource, NatPathQuery, ReachabilityRequest, ResourceNetwork, SourceResource,
};
pub use route_table::{Route, RouteState, RouteTable, RouteTarget};
pub use security_group::{SecurityGroup, SecurityGroupRule};
pub use verdict::{Cause, Check, CheckReport, MatchedEntry, PortVerdict, Verdict};
