//! NAT gateway path evaluation.
//!
//! Outbound traffic through a NAT gateway crosses the NAT subnet's network
//! ACL four times: out toward the destination, back in from it, in from
//! the source, and back out to the source. The NAT subnet must also send
//! the destination to an internet gateway.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::net::IpAddr;

use itertools::Itertools;
use tracing::debug;

use crate::error::ReachabilityError;
use crate::route::next_hop;
use crate::rule_match::{entry_admits_port, entry_admits_range};
use crate::types::{
    Direction, MatchedEntry, NatPathQuery, NetworkAclEntry, PortRange, PortVerdict, Protocol,
    RuleAction,
};

/// Successful NAT path, exiting through `internet_gateway_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NatOutcome {
    pub internet_gateway_id: String,
    pub checks: Vec<(NatLeg, MatchedEntry)>,
}

impl Display for NatOutcome {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(
            f,
            "nat path allowed through internet gateway {}",
            self.internet_gateway_id
        )
    }
}

/// One crossing of the NAT subnet's network ACL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NatLeg {
    EgressToDestination,
    IngressFromDestination,
    IngressFromSource,
    EgressToSource,
}

impl NatLeg {
    pub fn direction(&self) -> Direction {
        match self {
            NatLeg::EgressToDestination | NatLeg::EgressToSource => Direction::Egress,
            NatLeg::IngressFromDestination | NatLeg::IngressFromSource => Direction::Ingress,
        }
    }
}

/// What an entry must cover on a leg.
#[derive(Debug, Clone, Copy)]
enum PortRequirement<'a> {
    Port(u16),
    Range(Option<&'a PortRange>),
}

impl Display for PortRequirement<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            PortRequirement::Port(port) => write!(f, "port {port}"),
            PortRequirement::Range(Some(range)) => write!(f, "ports {range}"),
            PortRequirement::Range(None) => write!(f, "all ports"),
        }
    }
}

pub fn evaluate_nat_path(query: &NatPathQuery) -> Result<NatOutcome, ReachabilityError> {
    if query.src_subnet_id == query.nat_subnet_id {
        return Err(ReachabilityError::Validation(format!(
            "nat gateway and source cannot be placed in the same subnet {}, the nat gateway should be in a public subnet",
            query.nat_subnet_id
        )));
    }

    let dst_port = query.destination.require_port()?;
    let src_range = query.src_port_range.as_ref();
    let legs = [
        (
            NatLeg::EgressToDestination,
            &query.egress_entries,
            query.destination.ip,
            PortRequirement::Port(dst_port),
        ),
        (
            NatLeg::IngressFromDestination,
            &query.ingress_entries,
            query.destination.ip,
            PortRequirement::Range(src_range),
        ),
        (
            NatLeg::IngressFromSource,
            &query.ingress_entries,
            query.source.ip,
            PortRequirement::Port(dst_port),
        ),
        (
            NatLeg::EgressToSource,
            &query.egress_entries,
            query.source.ip,
            PortRequirement::Range(src_range),
        ),
    ];

    let mut checks = Vec::with_capacity(legs.len());
    for (leg, entries, address, ports) in legs {
        let verdict = scan_leg(entries, address, query.protocol, ports);
        debug!(
            event = "NatGateway",
            phase = "Acl",
            subnet = %query.nat_subnet_id,
            leg = ?leg,
            verdict = %verdict
        );
        match verdict {
            PortVerdict::Allowed(entry) => checks.push((leg, entry)),
            denied => {
                return Err(ReachabilityError::TrafficNotAllowed {
                    resource_id: query.nat_subnet_id.clone(),
                    direction: leg.direction(),
                    message: leg_failure(query, leg, address, ports, denied),
                });
            }
        }
    }

    let hop = next_hop(&query.route_table, query.destination.ip)?;
    if !hop.target.is_internet_gateway() {
        return Err(ReachabilityError::MissingRoute {
            route_table_ids: vec![query.route_table.id.clone()],
            message: format!(
                "no internet gateway route found for destination {} in route table {}, next hop is {}",
                query.destination.ip, query.route_table.id, hop.target
            ),
        });
    }

    Ok(NatOutcome {
        internet_gateway_id: hop.target.to_string(),
        checks,
    })
}

/// First entry by rule number whose CIDR contains `address` and whose
/// protocol and ports match.
fn scan_leg(
    entries: &[NetworkAclEntry],
    address: IpAddr,
    protocol: Protocol,
    ports: PortRequirement<'_>,
) -> PortVerdict {
    let found = entries
        .iter()
        .sorted_by_key(|entry| entry.rule_number)
        .find(|entry| {
            entry.cidr_block.contains(&address)
                && match ports {
                    PortRequirement::Port(port) => entry_admits_port(entry, protocol, port),
                    PortRequirement::Range(range) => entry_admits_range(entry, protocol, range),
                }
        });

    let Some(entry) = found else {
        return PortVerdict::Unresolved;
    };
    let matched = MatchedEntry {
        rule_number: entry.rule_number,
        cidr_block: entry.cidr_block,
    };
    match entry.rule_action {
        RuleAction::Allow => PortVerdict::Allowed(matched),
        RuleAction::Deny => PortVerdict::Denied(matched),
    }
}

fn leg_failure(
    query: &NatPathQuery,
    leg: NatLeg,
    address: IpAddr,
    ports: PortRequirement<'_>,
    verdict: PortVerdict,
) -> String {
    let subnet = &query.nat_subnet_id;
    let what = match leg {
        NatLeg::EgressToDestination => format!("outbound traffic to destination {address}"),
        NatLeg::IngressFromDestination => format!("return traffic from destination {address}"),
        NatLeg::IngressFromSource => format!("inbound traffic from source {address}"),
        NatLeg::EgressToSource => format!("return traffic to source {address}"),
    };
    format!(
        "nat gateway subnet {subnet} network acl {} rules do not allow {what} on {ports} ({verdict})",
        leg.direction()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cidr::parse_network;
    use crate::error::ErrorKind;
    use crate::types::{Endpoint, NetworkAclEntryTuple, Route, RouteTable, RouteTarget};
    use yare::parameterized;

    fn entries(tuples: Vec<NetworkAclEntryTuple>, direction: Direction) -> Vec<NetworkAclEntry> {
        tuples
            .into_iter()
            .filter_map(|t| NetworkAclEntry::from_tuple(t, direction).unwrap())
            .collect()
    }

    fn open(direction: Direction) -> Vec<NetworkAclEntry> {
        entries(
            vec![(100, "all".into(), "allow".into(), Some("0.0.0.0/0".into()), None, None, None, None)],
            direction,
        )
    }

    fn query() -> NatPathQuery {
        NatPathQuery {
            egress_entries: open(Direction::Egress),
            ingress_entries: open(Direction::Ingress),
            route_table: RouteTable::new(
                "rtb-public",
                vec![
                    Route::new(parse_network("10.0.0.0/16").unwrap(), RouteTarget::Local),
                    Route::new(
                        parse_network("0.0.0.0/0").unwrap(),
                        RouteTarget::InternetGateway("igw-1".into()),
                    ),
                ],
            ),
            src_subnet_id: "subnet-private".into(),
            nat_subnet_id: "subnet-public".into(),
            source: "10.0.1.20".parse().unwrap(),
            destination: "93.184.216.34:443".parse::<Endpoint>().unwrap(),
            src_port_range: Some(PortRange::new(1024, 65535).unwrap()),
            protocol: Protocol::Tcp,
        }
    }

    #[test]
    fn test_open_acls_reach_internet_gateway() {
        let outcome = evaluate_nat_path(&query()).unwrap();
        assert_eq!(outcome.internet_gateway_id, "igw-1");
        assert_eq!(outcome.checks.len(), 4);
        insta::assert_snapshot!(outcome.to_string(), @"nat path allowed through internet gateway igw-1");
    }

    #[test]
    fn test_same_subnet_fails_before_acls() {
        let mut q = query();
        q.src_subnet_id = q.nat_subnet_id.clone();
        q.egress_entries.clear();
        let err = evaluate_nat_path(&q).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_destination_port_required() {
        let mut q = query();
        q.destination.port = None;
        assert_eq!(evaluate_nat_path(&q).unwrap_err().kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_egress_deny_toward_destination() {
        let mut q = query();
        q.egress_entries = entries(
            vec![
                (90, "6".into(), "deny".into(), Some("93.184.216.0/24".into()), None, None, Some(443), Some(443)),
                (100, "all".into(), "allow".into(), Some("0.0.0.0/0".into()), None, None, None, None),
            ],
            Direction::Egress,
        );
        let err = evaluate_nat_path(&q).unwrap_err();
        assert_eq!(err.resource_id(), Some("subnet-public"));
        insta::assert_snapshot!(err.message(), @"nat gateway subnet subnet-public network acl egress rules do not allow outbound traffic to destination 93.184.216.34 on port 443 (denied by rule 90 (93.184.216.0/24))");
    }

    #[parameterized(
        covering = { 1024, 65535, true },
        exact = { 32768, 60999, true },
        narrower = { 32768, 40000, false },
    )]
    fn test_return_traffic_must_cover_source_range(from: u16, to: u16, allowed: bool) {
        let mut q = query();
        q.src_port_range = Some(PortRange::new(32768, 60999).unwrap());
        q.ingress_entries = entries(
            vec![
                (100, "6".into(), "allow".into(), Some("0.0.0.0/0".into()), None, None, Some(443), Some(443)),
                (110, "6".into(), "allow".into(), Some("0.0.0.0/0".into()), None, None, Some(from), Some(to)),
            ],
            Direction::Ingress,
        );
        assert_eq!(evaluate_nat_path(&q).is_ok(), allowed);
    }

    #[test]
    fn test_missing_source_range_needs_portless_entry() {
        let mut q = query();
        q.src_port_range = None;
        q.egress_entries = entries(
            vec![(100, "6".into(), "allow".into(), Some("0.0.0.0/0".into()), None, None, Some(0), Some(65535))],
            Direction::Egress,
        );
        let err = evaluate_nat_path(&q).unwrap_err();
        insta::assert_snapshot!(err.message(), @"nat gateway subnet subnet-public network acl egress rules do not allow return traffic to source 10.0.1.20 on all ports (no matching rule)");
    }

    #[test]
    fn test_rule_number_order_wins_over_input_order() {
        let mut q = query();
        q.ingress_entries = entries(
            vec![
                (200, "all".into(), "allow".into(), Some("0.0.0.0/0".into()), None, None, None, None),
                (50, "all".into(), "deny".into(), Some("10.0.1.0/24".into()), None, None, None, None),
            ],
            Direction::Ingress,
        );
        let err = evaluate_nat_path(&q).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TrafficNotAllowed);
        assert!(err.message().contains("inbound traffic from source 10.0.1.20"));
    }

    #[test]
    fn test_default_route_must_be_internet_gateway() {
        let mut q = query();
        q.route_table.routes[1].target = RouteTarget::NatGateway("nat-1".into());
        let err = evaluate_nat_path(&q).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRoute);
        insta::assert_snapshot!(err.message(), @"no internet gateway route found for destination 93.184.216.34 in route table rtb-public, next hop is nat-1");
    }

    #[test]
    fn test_blackholed_internet_route() {
        let mut q = query();
        q.route_table.routes[1] = q.route_table.routes[1].clone().blackholed();
        assert_eq!(evaluate_nat_path(&q).unwrap_err().kind(), ErrorKind::MissingRoute);
    }
}
