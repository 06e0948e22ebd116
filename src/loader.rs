//! JSON ingestion of requests and NAT path inventories.

use serde::Deserialize;
use tracing::debug;

use crate::cidr::parse_address;
use crate::error::ReachabilityError;
use crate::types::{
    Direction, Endpoint, NatPathQuery, NetworkAclEntry, NetworkAclEntryTuple, PortRange, Protocol,
    ReachabilityRequest, RouteTable,
};

/// Parse a [`ReachabilityRequest`] from its JSON form.
///
/// ```rust
/// use netreach_core::loader::request_from_json;
/// let request = request_from_json(r#"{
///     "source": {"addresses": ["10.1.0.15"], "network": {"vpc_id": "vpc-app"}},
///     "destination": {
///         "subnet_cidrs": ["10.2.1.0/24"],
///         "ports": [5432],
///         "network": {"vpc_id": "vpc-db"}
///     }
/// }"#).unwrap();
/// assert_eq!(request.destination.ports, vec![5432]);
/// ```
pub fn request_from_json(json: &str) -> Result<ReachabilityRequest, ReachabilityError> {
    let request: ReachabilityRequest = serde_json::from_str(json)?;
    debug!(event = "Loader", phase = "Request", request = %request);
    Ok(request)
}

/// A NAT path as inventories report it: ACL entries as positional tuples,
/// addresses as strings and the source port range as `from-to`.
#[derive(Debug, Clone, Deserialize)]
pub struct NatPathInput {
    pub egress_acl: Vec<NetworkAclEntryTuple>,
    pub ingress_acl: Vec<NetworkAclEntryTuple>,
    pub route_table: RouteTable,
    pub src_subnet_id: String,
    pub nat_subnet_id: String,
    pub src_ip: String,
    pub dst_ip: String,
    pub dst_port: u16,
    #[serde(default)]
    pub src_port_range: Option<String>,
    #[serde(default)]
    pub protocol: Protocol,
}

impl TryFrom<NatPathInput> for NatPathQuery {
    type Error = ReachabilityError;

    fn try_from(input: NatPathInput) -> Result<Self, Self::Error> {
        let src_port_range = input
            .src_port_range
            .as_deref()
            .filter(|range| !range.trim().is_empty())
            .map(str::parse::<PortRange>)
            .transpose()
            .map_err(|err| err.with_context("source port range"))?;

        Ok(NatPathQuery {
            egress_entries: entries_from_tuples(input.egress_acl, Direction::Egress)?,
            ingress_entries: entries_from_tuples(input.ingress_acl, Direction::Ingress)?,
            route_table: input.route_table,
            src_subnet_id: input.src_subnet_id,
            nat_subnet_id: input.nat_subnet_id,
            source: Endpoint::new(parse_address(&input.src_ip)?, None),
            destination: Endpoint::new(parse_address(&input.dst_ip)?, Some(input.dst_port)),
            src_port_range,
            protocol: input.protocol,
        })
    }
}

/// Parse a [`NatPathInput`] document into a [`NatPathQuery`].
pub fn nat_path_from_json(json: &str) -> Result<NatPathQuery, ReachabilityError> {
    let input: NatPathInput = serde_json::from_str(json)?;
    let query = NatPathQuery::try_from(input)?;
    debug!(
        event = "Loader",
        phase = "NatPath",
        nat_subnet = %query.nat_subnet_id,
        egress_entries = query.egress_entries.len(),
        ingress_entries = query.ingress_entries.len()
    );
    Ok(query)
}

/// Convert positional tuples into entries of one direction. Tuples without
/// a CIDR block are dropped.
pub fn entries_from_tuples(
    tuples: Vec<NetworkAclEntryTuple>,
    direction: Direction,
) -> Result<Vec<NetworkAclEntry>, ReachabilityError> {
    let mut entries = Vec::with_capacity(tuples.len());
    for tuple in tuples {
        let rule_number = tuple.0;
        match NetworkAclEntry::from_tuple(tuple, direction)? {
            Some(entry) => entries.push(entry),
            None => debug!(event = "Loader", phase = "Entries", rule_number, "skipping entry without cidr block"),
        }
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::nat::evaluate_nat_path;

    const NAT_PATH: &str = r#"{
        "egress_acl": [
            [100, "-1", "allow", "0.0.0.0/0", null, null, null, null],
            [110, "6", "allow", null, null, null, 443, 443]
        ],
        "ingress_acl": [
            [90, "6", "deny", "203.0.113.0/24", null, null, 0, 65535],
            [100, "-1", "allow", "0.0.0.0/0", null, null, null, null]
        ],
        "route_table": {
            "id": "rtb-public",
            "routes": [
                {"destination_cidr": "10.0.0.0/16", "target": "local"},
                {"destination_cidr": "0.0.0.0/0", "target": "igw-0a1b2c"}
            ]
        },
        "src_subnet_id": "subnet-private",
        "nat_subnet_id": "subnet-public",
        "src_ip": "10.0.1.20",
        "dst_ip": "93.184.216.34",
        "dst_port": 443,
        "src_port_range": "1024-65535"
    }"#;

    #[test]
    fn test_nat_path_from_json() {
        let query = nat_path_from_json(NAT_PATH).unwrap();
        assert_eq!(query.egress_entries.len(), 1);
        assert_eq!(query.ingress_entries.len(), 2);
        assert_eq!(query.ingress_entries[0].rule_number, 90);
        assert!(!query.ingress_entries[0].egress);
        assert_eq!(query.destination.to_string(), "93.184.216.34:443");
        assert_eq!(query.src_port_range, Some(PortRange::new(1024, 65535).unwrap()));
        assert_eq!(query.protocol, Protocol::Tcp);

        let outcome = evaluate_nat_path(&query).unwrap();
        assert_eq!(outcome.internet_gateway_id, "igw-0a1b2c");
    }

    #[test]
    fn test_missing_source_range() {
        let json = NAT_PATH.replace(r#""src_port_range": "1024-65535""#, r#""src_port_range": """#);
        assert_eq!(nat_path_from_json(&json).unwrap().src_port_range, None);
    }

    #[test]
    fn test_malformed_source_range() {
        let json = NAT_PATH.replace("1024-65535", "65535-1024");
        let err = nat_path_from_json(&json).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(err.message().starts_with("source port range: "));
    }

    #[test]
    fn test_bad_address() {
        let json = NAT_PATH.replace("93.184.216.34", "example.com");
        assert_eq!(nat_path_from_json(&json).unwrap_err().kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_unknown_action() {
        let tuples = vec![(100, "-1".to_string(), "permit".to_string(), Some("0.0.0.0/0".to_string()), None, None, None, None)];
        let err = entries_from_tuples(tuples, Direction::Egress).unwrap_err();
        insta::assert_snapshot!(err.message(), @"network acl rule 100 has unknown action 'permit'");
    }

    #[test]
    fn test_request_from_json_rejects_garbage() {
        let err = request_from_json(r#"{"source": 1}"#).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }
}
