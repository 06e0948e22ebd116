use ipnet::IpNet;

use super::*;
use crate::cidr::{parse_address, parse_network};
use crate::error::ErrorKind;
use crate::types::{
    DestinationResource, NatPathQuery, NetworkAcl, NetworkAclEntry, PortRange, ResourceNetwork,
    Route, RouteTable, RouteTarget, RuleAction, SecurityGroup, SecurityGroupRule, SourceResource,
};
use yare::parameterized;


fn net(literal: &str) -> IpNet {
    parse_network(literal).unwrap()
}

fn allow_all(direction: Direction) -> NetworkAclEntry {
    NetworkAclEntry::new(100, Protocol::All, RuleAction::Allow, net("0.0.0.0/0"), None, direction)
}

fn open_acl(id: &str) -> NetworkAcl {
    NetworkAcl::new(id, vec![allow_all(Direction::Egress), allow_all(Direction::Ingress)])
}

/// An application instance at 10.1.0.15 in vpc-app, open egress.
fn app_network() -> ResourceNetwork {
    ResourceNetwork::new("vpc-app")
        .with_subnets(&["subnet-app"])
        .with_network_acl(open_acl("acl-app"))
        .with_security_group(
            SecurityGroup::new("sg-app")
                .with_egress(SecurityGroupRule::new(Protocol::All, None).with_cidrs([net("0.0.0.0/0")])),
        )
        .with_route_table(
            RouteTable::new(
                "rtb-app",
                vec![
                    Route::new(net("10.1.0.0/16"), RouteTarget::Local),
                    Route::new(net("10.2.0.0/16"), RouteTarget::PeeringConnection("pcx-1".into())),
                ],
            )
            .with_associations(&["subnet-app"]),
        )
}

/// A database subnet 10.2.1.0/24 in vpc-db, reachable from sg-app on 5432.
fn db_network() -> ResourceNetwork {
    ResourceNetwork::new("vpc-db")
        .with_subnets(&["subnet-db"])
        .with_network_acl(open_acl("acl-db"))
        .with_security_group(
            SecurityGroup::new("sg-db").with_ingress(
                SecurityGroupRule::new(Protocol::Tcp, Some(PortRange::single(5432))).with_group("sg-app"),
            ),
        )
        .with_route_table(
            RouteTable::new(
                "rtb-db",
                vec![
                    Route::new(net("10.2.0.0/16"), RouteTarget::Local),
                    Route::new(net("10.1.0.0/16"), RouteTarget::PeeringConnection("pcx-1".into())),
                ],
            )
            .with_associations(&["subnet-db"]),
        )
}

fn request_with(app: ResourceNetwork, db: ResourceNetwork) -> ReachabilityRequest {
    ReachabilityRequest::new(
        SourceResource::new(vec![parse_address("10.1.0.15").unwrap()], app),
        DestinationResource::new(vec![net("10.2.1.0/24")], vec![5432], db),
    )
}

fn request() -> ReachabilityRequest {
    request_with(app_network(), db_network())
}

/// Outbound path from subnet-app through a NAT gateway in subnet-public.
fn nat_path() -> NatPathQuery {
    NatPathQuery {
        egress_entries: vec![allow_all(Direction::Egress)],
        ingress_entries: vec![allow_all(Direction::Ingress)],
        route_table: RouteTable::new(
            "rtb-public",
            vec![
                Route::new(net("10.1.0.0/16"), RouteTarget::Local),
                Route::new(net("0.0.0.0/0"), RouteTarget::InternetGateway("igw-1".into())),
            ],
        ),
        src_subnet_id: "subnet-app".into(),
        nat_subnet_id: "subnet-public".into(),
        source: "10.1.0.15".parse().unwrap(),
        destination: "93.184.216.34:443".parse().unwrap(),
        src_port_range: Some(PortRange::new(1024, 65535).unwrap()),
        protocol: Protocol::Tcp,
    }
}
