//! Route table evaluation.
//!
//! Resources in one VPC route to each other implicitly. Across VPCs, every
//! route table governing either side needs active peering routes covering
//! everything on the other side. Subnets without an explicit association
//! fall back to the VPC's main route table.

use std::collections::BTreeSet;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::net::IpAddr;

use ipnet::IpNet;
use itertools::Itertools;
use tracing::debug;

use crate::cidr::{longest_prefix, overlaps};
use crate::error::ReachabilityError;
use crate::traits::{NetworkResource, resource_ids};
use crate::types::{Route, RouteTable};

/// One side of a cross-VPC path.
#[derive(Debug, Clone, Copy)]
pub struct RouteEndpoint<'a> {
    pub vpc_id: &'a str,
    pub subnet_ids: &'a [String],
    /// Networks the other side must be able to reach on this side.
    pub targets: &'a [IpNet],
    /// Tables explicitly associated with this side's subnets.
    pub route_tables: &'a [RouteTable],
    /// Every table of this side's VPC, main table included.
    pub vpc_route_tables: &'a [RouteTable],
}

#[derive(Debug, Clone, Copy)]
pub struct RoutePathQuery<'a> {
    pub source: RouteEndpoint<'a>,
    pub destination: RouteEndpoint<'a>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    SameVpc,
    SharedRouteTables { route_table_ids: Vec<String> },
    Peered { route_table_ids: Vec<String> },
}

impl Display for RouteOutcome {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            RouteOutcome::SameVpc => write!(f, "resources are located in the same VPC"),
            RouteOutcome::SharedRouteTables { route_table_ids } => write!(
                f,
                "source and destination use the same route table(s): {}",
                route_table_ids.join(", ")
            ),
            RouteOutcome::Peered { route_table_ids } => write!(
                f,
                "route table(s) {} hold peering routes in both directions",
                route_table_ids.join(", ")
            ),
        }
    }
}

pub fn evaluate_routes(query: &RoutePathQuery<'_>) -> Result<RouteOutcome, ReachabilityError> {
    let RoutePathQuery {
        source,
        destination,
    } = *query;
    if source.vpc_id == destination.vpc_id {
        return Ok(RouteOutcome::SameVpc);
    }
    validate_endpoint(&source)?;
    validate_endpoint(&destination)?;

    if let Some((src, dst)) = source
        .targets
        .iter()
        .cartesian_product(destination.targets)
        .find(|(src, dst)| overlaps(src, dst))
    {
        return Err(ReachabilityError::CidrOverlap(format!(
            "resources are located in different VPCs ({} and {}), however source {src} overlaps destination {dst}",
            source.vpc_id, destination.vpc_id
        )));
    }

    let source_fallback = needs_fallback(&source);
    let destination_fallback = needs_fallback(&destination);
    debug!(
        event = "RouteTable",
        phase = "Fallback",
        source_vpc = source.vpc_id,
        destination_vpc = destination.vpc_id,
        source_fallback,
        destination_fallback
    );

    let source_ids = table_ids(source.route_tables);
    if !source_fallback
        && !destination_fallback
        && !source_ids.is_empty()
        && source_ids == table_ids(destination.route_tables)
    {
        return Ok(RouteOutcome::SharedRouteTables {
            route_table_ids: source_ids.into_iter().map(str::to_string).collect(),
        });
    }

    let source_tables = governing_tables(&source, source_fallback)?;
    let destination_tables = governing_tables(&destination, destination_fallback)?;

    require_peering_routes(&source_tables, destination.targets, Leg::Outbound)?;
    require_peering_routes(&destination_tables, source.targets, Leg::Return)?;

    Ok(RouteOutcome::Peered {
        route_table_ids: source_tables
            .iter()
            .chain(&destination_tables)
            .map(|table| table.id.clone())
            .collect(),
    })
}

fn validate_endpoint(side: &RouteEndpoint<'_>) -> Result<(), ReachabilityError> {
    if side.subnet_ids.is_empty() {
        return Err(ReachabilityError::Validation(format!(
            "no subnets given for VPC {}",
            side.vpc_id
        )));
    }
    if side.targets.is_empty() {
        return Err(ReachabilityError::Validation(format!(
            "no addresses given for VPC {}",
            side.vpc_id
        )));
    }
    Ok(())
}

fn table_ids(tables: &[RouteTable]) -> BTreeSet<&str> {
    tables.iter().map(|table| table.id.as_str()).collect()
}

/// True when fewer of the side's subnets have an explicit association than
/// there are subnets.
fn needs_fallback(side: &RouteEndpoint<'_>) -> bool {
    let subnets: BTreeSet<&str> = side.subnet_ids.iter().map(String::as_str).collect();
    let associated = subnets
        .iter()
        .filter(|subnet| {
            side.route_tables
                .iter()
                .any(|table| table.is_associated_with(subnet))
        })
        .count();
    associated < subnets.len()
}

/// Explicit tables, plus the VPC main tables when the fallback applies.
/// VPC tables stand in for the main table when none is flagged as main.
fn governing_tables<'a>(
    side: &RouteEndpoint<'a>,
    fallback: bool,
) -> Result<Vec<&'a RouteTable>, ReachabilityError> {
    let mut tables: Vec<&RouteTable> = side.route_tables.iter().collect();
    if fallback {
        let has_main = side.vpc_route_tables.iter().any(|table| table.main);
        tables.extend(
            side.vpc_route_tables
                .iter()
                .filter(|table| table.main || !has_main),
        );
    }
    let tables: Vec<&RouteTable> = tables.into_iter().unique_by(|table| table.id.clone()).collect();

    if tables.is_empty() {
        return Err(ReachabilityError::RouteTableAssociation(format!(
            "no route table governs subnet(s) {} in VPC {}",
            side.subnet_ids.join(", "),
            side.vpc_id
        )));
    }
    Ok(tables)
}

/// Which way a set of peering routes has to carry traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Leg {
    /// Source tables toward the destination.
    Outbound,
    /// Destination tables back toward the source.
    Return,
}

impl Display for Leg {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Leg::Outbound => write!(f, "outbound"),
            Leg::Return => write!(f, "return"),
        }
    }
}

/// Every table must hold active peering routes overlapping every target.
fn require_peering_routes(
    tables: &[&RouteTable],
    targets: &[IpNet],
    leg: Leg,
) -> Result<(), ReachabilityError> {
    let mut unsatisfied: Vec<&RouteTable> = Vec::new();
    let mut unmatched: BTreeSet<IpNet> = BTreeSet::new();

    for &table in tables {
        let mut residual: BTreeSet<IpNet> = targets.iter().copied().collect();
        for route in table.peering_routes() {
            if residual.is_empty() {
                break;
            }
            residual.retain(|target| !overlaps(&route.destination_cidr, target));
        }
        if !residual.is_empty() {
            unsatisfied.push(table);
            unmatched.extend(residual);
        }
    }

    if unsatisfied.is_empty() {
        return Ok(());
    }

    Err(ReachabilityError::MissingRoute {
        route_table_ids: unsatisfied.iter().map(|table| table.id.clone()).collect(),
        message: format!(
            "review route table(s) {} for {leg} peering routes matching {}",
            resource_ids(unsatisfied.iter().copied()),
            unmatched.iter().join(", ")
        ),
    })
}

/// Longest-prefix next hop for `address`. Blackhole routes are never chosen.
pub fn next_hop(table: &RouteTable, address: IpAddr) -> Result<&Route, ReachabilityError> {
    let missing = |reason: String| ReachabilityError::MissingRoute {
        route_table_ids: vec![table.id.clone()],
        message: format!("{} {reason}", table.describe()),
    };

    let mut usable = table.routes.iter().filter(|route| route.is_usable()).peekable();
    if usable.peek().is_none() {
        return Err(missing("has no usable routes".to_string()));
    }

    longest_prefix(usable.map(|route| (route.destination_cidr, route)), &address)?
        .ok_or_else(|| missing(format!("has no route for destination {address}")))
}
