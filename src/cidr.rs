//! CIDR and port arithmetic.
//!
//! Network literals are parsed leniently: host bits are truncated
//! (`10.0.0.5/24` becomes `10.0.0.0/24`) and a bare address becomes a host
//! network (`/32` or `/128`).

use std::net::IpAddr;

use ipnet::IpNet;

use crate::error::ReachabilityError;
use crate::types::PortRange;

/// Parse a CIDR block or a bare address into a network.
pub fn parse_network(literal: &str) -> Result<IpNet, ReachabilityError> {
    let literal = literal.trim();
    if literal.contains('/') {
        let net: IpNet = literal.parse().map_err(|_| {
            ReachabilityError::Validation(format!("malformed CIDR block '{literal}'"))
        })?;
        return Ok(net.trunc());
    }
    Ok(IpNet::from(parse_address(literal)?))
}

/// Parse a single IPv4 or IPv6 address.
pub fn parse_address(literal: &str) -> Result<IpAddr, ReachabilityError> {
    literal
        .trim()
        .parse()
        .map_err(|_| ReachabilityError::Validation(format!("malformed IP address '{literal}'")))
}

/// True if the two blocks share at least one address.
///
/// CIDR blocks are either nested or disjoint, so overlap reduces to
/// containment in one direction or the other.
pub fn overlaps(a: &IpNet, b: &IpNet) -> bool {
    a.contains(b) || b.contains(a)
}

pub fn contains(network: &IpNet, address: &IpAddr) -> bool {
    network.contains(address)
}

/// Inclusive port containment. A missing range matches every port.
pub fn port_in_range(port: u16, range: Option<&PortRange>) -> bool {
    range.is_none_or(|r| r.contains(port))
}

/// True if `inner` lies entirely within `outer`. A missing outer range
/// covers everything; a missing inner range is only covered by a missing
/// outer range.
pub fn range_covers(outer: Option<&PortRange>, inner: Option<&PortRange>) -> bool {
    match (outer, inner) {
        (None, _) => true,
        (Some(_), None) => false,
        (Some(outer), Some(inner)) => outer.from <= inner.from && inner.to <= outer.to,
    }
}

/// Pick the candidate with the most specific network containing `address`.
///
/// Returns `Ok(None)` when no candidate contains the address. An empty
/// candidate list, or two containing candidates with the same prefix
/// length, is a validation error.
pub fn longest_prefix<'a, T, I>(
    candidates: I,
    address: &IpAddr,
) -> Result<Option<&'a T>, ReachabilityError>
where
    I: IntoIterator<Item = (IpNet, &'a T)>,
{
    let mut seen = 0usize;
    let mut best: Option<(IpNet, &'a T)> = None;
    let mut tied: Option<IpNet> = None;

    for (net, candidate) in candidates {
        seen += 1;
        if !net.contains(address) {
            continue;
        }
        match best {
            Some((current, _)) if net.prefix_len() < current.prefix_len() => {}
            Some((current, _)) if net.prefix_len() == current.prefix_len() => {
                tied = Some(net);
            }
            _ => {
                best = Some((net, candidate));
                tied = None;
            }
        }
    }

    if seen == 0 {
        return Err(ReachabilityError::Validation(format!(
            "no candidate networks to resolve {address} against"
        )));
    }
    if let (Some(net), Some((current, _))) = (tied, best) {
        return Err(ReachabilityError::Validation(format!(
            "ambiguous longest-prefix match for {address}: {current} and {net} have the same prefix length"
        )));
    }
    Ok(best.map(|(_, candidate)| candidate))
}

/// Serde adapter for a single network literal, parsed leniently.
pub(crate) mod serde_network {
    use ipnet::IpNet;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(net: &IpNet, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(net)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<IpNet, D::Error> {
        let literal = String::deserialize(deserializer)?;
        super::parse_network(&literal).map_err(serde::de::Error::custom)
    }
}

/// Serde adapter for a list of network literals, parsed leniently.
pub(crate) mod serde_networks {
    use ipnet::IpNet;
    use serde::ser::SerializeSeq;
    use serde::{Deserialize, Deserializer, Serializer};

    #[allow(clippy::ptr_arg)]
    pub fn serialize<S: Serializer>(nets: &Vec<IpNet>, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(nets.len()))?;
        for net in nets {
            seq.serialize_element(&net.to_string())?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<IpNet>, D::Error> {
        let literals = Vec::<String>::deserialize(deserializer)?;
        literals
            .iter()
            .map(|literal| super::parse_network(literal).map_err(serde::de::Error::custom))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use proptest::prelude::*;
    use yare::parameterized;

    fn net(s: &str) -> IpNet {
        parse_network(s).unwrap()
    }

    fn ip(s: &str) -> IpAddr {
        parse_address(s).unwrap()
    }

    #[parameterized(
        plain_cidr = { "10.0.0.0/16", "10.0.0.0/16" },
        host_bits_truncated = { "10.0.0.5/24", "10.0.0.0/24" },
        bare_v4_address = { "10.0.0.5", "10.0.0.5/32" },
        bare_v6_address = { "2001:db8::1", "2001:db8::1/128" },
        v6_cidr = { "2001:db8::/32", "2001:db8::/32" },
        padded = { " 192.168.1.0/24 ", "192.168.1.0/24" },
    )]
    fn test_parse_network(literal: &str, expected: &str) {
        assert_eq!(parse_network(literal).unwrap().to_string(), expected);
    }

    #[parameterized(
        empty = { "" },
        short_octets = { "10.0.0/8" },
        prefix_too_long = { "10.0.0.0/33" },
        garbage = { "subnet-123" },
    )]
    fn test_parse_network_rejects_malformed(literal: &str) {
        let err = parse_network(literal).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[parameterized(
        nested = { "10.0.0.0/16", "10.0.1.0/24", true },
        identical = { "10.0.0.0/24", "10.0.0.0/24", true },
        disjoint = { "10.0.0.0/24", "10.0.1.0/24", false },
        default_route = { "0.0.0.0/0", "172.16.0.0/12", true },
        host_in_subnet = { "10.0.0.0/24", "10.0.0.5/32", true },
        mixed_families = { "0.0.0.0/0", "::/0", false },
    )]
    fn test_overlaps(a: &str, b: &str, expected: bool) {
        assert_eq!(overlaps(&net(a), &net(b)), expected);
        assert_eq!(overlaps(&net(b), &net(a)), expected);
    }

    #[test]
    fn test_contains() {
        assert!(contains(&net("10.0.0.0/24"), &ip("10.0.0.200")));
        assert!(!contains(&net("10.0.0.0/24"), &ip("10.0.1.1")));
        assert!(!contains(&net("10.0.0.0/8"), &ip("::ffff:10.0.0.1")));
    }

    #[test]
    fn test_port_in_range() {
        let range = PortRange::new(1024, 65535).unwrap();
        assert!(port_in_range(1024, Some(&range)));
        assert!(port_in_range(65535, Some(&range)));
        assert!(!port_in_range(443, Some(&range)));
        assert!(port_in_range(443, None));
    }

    #[test]
    fn test_range_covers() {
        let wide = PortRange::new(1024, 65535).unwrap();
        let narrow = PortRange::new(32768, 60999).unwrap();
        assert!(range_covers(Some(&wide), Some(&narrow)));
        assert!(!range_covers(Some(&narrow), Some(&wide)));
        assert!(range_covers(None, Some(&narrow)));
        assert!(range_covers(None, None));
        assert!(!range_covers(Some(&wide), None));
    }

    #[test]
    fn test_longest_prefix_prefers_most_specific() {
        let candidates = [
            (net("0.0.0.0/0"), "igw"),
            (net("10.0.0.0/16"), "local"),
            (net("10.0.1.0/24"), "pcx"),
        ];
        let pick = |addr: &str| {
            longest_prefix(candidates.iter().map(|(n, t)| (*n, t)), &ip(addr)).unwrap()
        };
        assert_eq!(pick("10.0.1.9"), Some(&"pcx"));
        assert_eq!(pick("10.0.2.9"), Some(&"local"));
        assert_eq!(pick("93.184.216.34"), Some(&"igw"));
    }

    #[test]
    fn test_longest_prefix_no_containing_candidate() {
        let candidates = [(net("10.0.0.0/16"), "local")];
        let result =
            longest_prefix(candidates.iter().map(|(n, t)| (*n, t)), &ip("93.184.216.34")).unwrap();
        assert_eq!(result, None);
    }

    #[test]
    fn test_longest_prefix_empty_is_error() {
        let candidates: [(IpNet, &str); 0] = [];
        let err = longest_prefix(candidates.iter().map(|(n, t)| (*n, t)), &ip("10.0.0.1"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_longest_prefix_tie_is_ambiguous() {
        let candidates = [
            (net("10.0.0.0/16"), "local"),
            (net("10.0.0.0/16"), "pcx"),
        ];
        let err = longest_prefix(candidates.iter().map(|(n, t)| (*n, t)), &ip("10.0.3.3"))
            .unwrap_err();
        assert!(err.to_string().contains("ambiguous"));
    }

    #[test]
    fn test_longest_prefix_tie_resolved_by_longer_prefix() {
        let candidates = [
            (net("10.0.0.0/16"), "a"),
            (net("10.0.0.0/16"), "b"),
            (net("10.0.3.0/24"), "c"),
        ];
        let result =
            longest_prefix(candidates.iter().map(|(n, t)| (*n, t)), &ip("10.0.3.3")).unwrap();
        assert_eq!(result, Some(&"c"));
    }

    fn arb_v4_net() -> impl Strategy<Value = IpNet> {
        (any::<u32>(), 0u8..=32).prop_map(|(bits, prefix)| {
            let addr = IpAddr::from(std::net::Ipv4Addr::from(bits));
            IpNet::new(addr, prefix).unwrap().trunc()
        })
    }

    proptest! {
        #[test]
        fn prop_overlaps_is_symmetric(a in arb_v4_net(), b in arb_v4_net()) {
            prop_assert_eq!(overlaps(&a, &b), overlaps(&b, &a));
        }

        #[test]
        fn prop_overlaps_is_reflexive(a in arb_v4_net()) {
            prop_assert!(overlaps(&a, &a));
        }

        #[test]
        fn prop_network_contains_its_own_address(a in arb_v4_net()) {
            prop_assert!(contains(&a, &a.network()));
            prop_assert!(contains(&a, &a.broadcast()));
        }

        #[test]
        fn prop_longest_prefix_result_contains_address(
            nets in proptest::collection::btree_set(arb_v4_net(), 1..16),
            bits in any::<u32>(),
        ) {
            let addr = IpAddr::from(std::net::Ipv4Addr::from(bits));
            let nets: Vec<IpNet> = nets.into_iter().collect();
            let picked = longest_prefix(nets.iter().map(|n| (*n, n)), &addr).unwrap();
            match picked {
                Some(best) => {
                    prop_assert!(best.contains(&addr));
                    for other in nets.iter().filter(|n| n.contains(&addr)) {
                        prop_assert!(other.prefix_len() <= best.prefix_len());
                    }
                }
                None => prop_assert!(nets.iter().all(|n| !n.contains(&addr))),
            }
        }
    }
}
