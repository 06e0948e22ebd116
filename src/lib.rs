//! Static reachability diagnosis for cloud virtual networks.
//!
//! Given snapshots of the network ACLs, security groups and route tables
//! around a source and a destination, [`ReachabilityEngine`] decides whether
//! traffic can flow and, when it cannot, names the resource to fix.
pub use config::EngineConfig;
pub use engine::ReachabilityEngine;
pub use error::{ErrorKind, ReachabilityError};
pub use rule_match::Remote;
pub use traits::{NetworkResource, resource_ids};
pub use types::{
    Cause, Check, CheckReport, DestinationResource, Direction, Endpoint, MatchedEntry,
    NatPathQuery, NetworkAcl, NetworkAclEntry, PortRange, PortVerdict, Protocol,
    ReachabilityRequest, ResourceNetwork, Route, RouteState, RouteTable, RouteTarget, RuleAction,
    SecurityGroup, SecurityGroupRule, SourceResource, Verdict,
};

pub mod acl;
pub mod cidr;
pub mod config;
mod engine;
mod error;
pub mod loader;
pub mod metrics;
pub mod nat;
pub mod route;
mod rule_match;
pub mod security_group;
mod timers;
mod traits;
pub mod types;
