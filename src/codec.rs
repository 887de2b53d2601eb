//! Conversion between names, addresses and node keys.
//!
//! A node in a reverse zone is named by the components of an address that
//! are not covered by the zone's prefix, in reverse order. For IPv4 the
//! components are decimal octets, for IPv6 they are hexadecimal nibbles.
//! Prefix lengths that do not fall on a component boundary are rounded
//! down, so the node `5.17` in the zone for `10.0.16.0/20` is the address
//! `10.0.17.5`.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::string::{String, ToString};
use std::vec::Vec;

use ipnet::IpNet;

use crate::error::Error;
use crate::name::{self, APEX};
use crate::zone::Zone;

//------------ Constants -----------------------------------------------------

const IN_ADDR_ARPA: &str = "in-addr.arpa.";
const IP6_ARPA: &str = "ip6.arpa.";

//------------ Address components --------------------------------------------

/// Splits an address into its reverse DNS components.
///
/// Returns the components and the number of bits per component.
fn components(addr: IpAddr) -> (Vec<u8>, u8) {
    match addr {
        IpAddr::V4(addr) => (addr.octets().to_vec(), 8),
        IpAddr::V6(addr) => (
            addr.octets()
                .iter()
                .flat_map(|octet| [octet >> 4, octet & 0x0f])
                .collect(),
            4,
        ),
    }
}

fn from_components(v4: bool, comps: &[u8]) -> IpAddr {
    if v4 {
        IpAddr::V4(Ipv4Addr::new(comps[0], comps[1], comps[2], comps[3]))
    } else {
        let mut octets = [0u8; 16];
        for (octet, pair) in octets.iter_mut().zip(comps.chunks(2)) {
            *octet = (pair[0] << 4) | pair[1];
        }
        IpAddr::V6(Ipv6Addr::from(octets))
    }
}

fn format_component(comp: u8, bits: u8) -> String {
    if bits == 8 {
        comp.to_string()
    } else {
        format!("{comp:x}")
    }
}

fn parse_component(comp: &str, bits: u8) -> Option<u8> {
    if bits == 8 {
        if comp.is_empty()
            || comp.len() > 3
            || (comp.len() > 1 && comp.starts_with('0'))
            || !comp.bytes().all(|ch| ch.is_ascii_digit())
        {
            return None;
        }
        comp.parse().ok()
    } else {
        let mut chars = comp.chars();
        match (chars.next(), chars.next()) {
            (Some(ch), None) => ch.to_digit(16).map(|digit| digit as u8),
            _ => None,
        }
    }
}

//------------ Node keys -----------------------------------------------------

/// Returns the node name of an address in a reverse zone.
///
/// The components of `addr` not covered by `prefix_len`, rounded down to a
/// component boundary, are joined in reverse order. An address fully
/// covered by the prefix is the zone apex.
pub fn address_to_reverse_label(addr: IpAddr, prefix_len: u8) -> String {
    let (comps, bits) = components(addr);
    let covered = (usize::from(prefix_len) / usize::from(bits)).min(comps.len());
    if covered == comps.len() {
        return APEX.into();
    }
    let labels: Vec<String> = comps[covered..]
        .iter()
        .rev()
        .map(|comp| format_component(*comp, bits))
        .collect();
    labels.join(".")
}

/// Returns the address named by a node of a reverse zone.
///
/// Fails with [`Error::InvalidName`] if the zone is not a reverse zone, if
/// the label does not have exactly as many components as the zone leaves
/// uncovered, if a component is malformed, or if the resulting address is
/// outside the zone's network.
pub fn reverse_label_to_address(
    zone: &Zone,
    label: &str,
) -> Result<IpAddr, Error> {
    let net = zone.network().ok_or_else(|| {
        Error::InvalidName(format!(
            "zone '{}' is not a reverse zone",
            zone.name()
        ))
    })?;
    let (mut comps, bits) = components(net.network());
    let covered = usize::from(net.prefix_len()) / usize::from(bits);
    let expected = comps.len() - covered;

    let label = name::normalize_label(label);
    let parts: Vec<&str> = if label == APEX {
        Vec::new()
    } else {
        label.split('.').collect()
    };
    if parts.len() != expected {
        return Err(Error::InvalidName(format!(
            "'{label}' has {} components but zone '{}' expects {expected}",
            parts.len(),
            zone.name()
        )));
    }
    for (slot, part) in comps[covered..].iter_mut().zip(parts.iter().rev()) {
        *slot = parse_component(part, bits).ok_or_else(|| {
            Error::InvalidName(format!(
                "'{part}' is not a valid address component in '{label}'"
            ))
        })?;
    }

    let addr = from_components(net.network().is_ipv4(), &comps);
    if !net.contains(&addr) {
        return Err(Error::InvalidName(format!(
            "'{label}' names {addr} which is outside {net}"
        )));
    }
    Ok(addr)
}

/// Returns the node name of a fully qualified name within a zone.
///
/// The zone apex is returned as [`APEX`]. Fails with [`Error::NotInZone`]
/// if the name is not at or below the zone.
pub fn fqdn_to_local_label(fqdn: &str, zone_name: &str) -> Result<String, Error> {
    let fqdn = name::normalize_fqdn(fqdn);
    let zone = name::normalize_fqdn(zone_name);
    if fqdn == zone {
        return Ok(APEX.into());
    }
    let prefix = if zone == "." {
        Some(fqdn.as_str())
    } else {
        fqdn.strip_suffix(zone.as_str())
    };
    match prefix {
        Some(prefix) if prefix.len() > 1 && prefix.ends_with('.') => {
            Ok(prefix[..prefix.len() - 1].into())
        }
        _ => Err(Error::NotInZone {
            name: fqdn.clone(),
            zone,
        }),
    }
}

/// Returns the fully qualified name of a node within a zone.
pub fn local_label_to_fqdn(label: &str, zone_name: &str) -> String {
    let label = name::normalize_label(label);
    let zone = name::normalize_fqdn(zone_name);
    if label == APEX {
        zone
    } else if zone == "." {
        format!("{label}.")
    } else {
        format!("{label}.{zone}")
    }
}

//------------ Reverse zone names --------------------------------------------

/// Returns the conventional name of the reverse zone for a network.
///
/// Unaligned IPv4 networks get an RFC 2317 style `first-last` label for
/// the partially covered octet. Unaligned IPv6 networks are named after the
/// enclosing nibble-aligned network.
pub fn reverse_zone_name(net: &IpNet) -> String {
    let net = net.trunc();
    let (comps, bits) = components(net.network());
    let prefix = usize::from(net.prefix_len());
    let full = prefix / usize::from(bits);

    let mut labels: Vec<String> = comps[..full]
        .iter()
        .rev()
        .map(|comp| format_component(*comp, bits))
        .collect();
    if bits == 8 && prefix % 8 != 0 {
        let low = u16::from(comps[full]);
        let size = 1u16 << (8 - prefix % 8);
        labels.insert(0, format!("{low}-{}", low + size - 1));
    }
    labels.push(if bits == 8 { IN_ADDR_ARPA } else { IP6_ARPA }.into());
    labels.join(".")
}

/// Returns the network described by a reverse zone name.
///
/// Accepts `*.in-addr.arpa.` names with at most four octet labels, the
/// left-most of which may be an RFC 2317 `first-last` range, and
/// `*.ip6.arpa.` names with at most 32 nibble labels.
pub fn network_from_reverse_zone_name(zone_name: &str) -> Result<IpNet, Error> {
    let zone_name = name::normalize_fqdn(zone_name);
    let invalid = || {
        Error::InvalidName(format!(
            "'{zone_name}' is not a reverse zone name"
        ))
    };

    if let Some(rest) = strip_arpa_suffix(&zone_name, IN_ADDR_ARPA) {
        let labels: Vec<&str> = split_labels(rest);
        if labels.len() > 4 {
            return Err(invalid());
        }
        let mut octets = [0u8; 4];
        let mut prefix = 0u8;
        for (idx, label) in labels.iter().rev().enumerate() {
            if let Some((low, high)) = label.split_once('-') {
                // Only the left-most label may carry a range.
                if idx + 1 != labels.len() {
                    return Err(invalid());
                }
                let low = parse_component(low, 8).ok_or_else(invalid)?;
                let high = parse_component(high, 8).ok_or_else(invalid)?;
                if high < low {
                    return Err(invalid());
                }
                let size = u16::from(high) - u16::from(low) + 1;
                if !size.is_power_of_two() || u16::from(low) % size != 0 {
                    return Err(invalid());
                }
                octets[idx] = low;
                prefix += 8 - size.trailing_zeros() as u8;
            } else {
                octets[idx] = parse_component(label, 8).ok_or_else(invalid)?;
                prefix += 8;
            }
        }
        IpNet::new(IpAddr::V4(Ipv4Addr::from(octets)), prefix)
            .map_err(|_| invalid())
    } else if let Some(rest) = strip_arpa_suffix(&zone_name, IP6_ARPA) {
        let labels: Vec<&str> = split_labels(rest);
        if labels.len() > 32 {
            return Err(invalid());
        }
        let mut nibbles = [0u8; 32];
        for (slot, label) in nibbles.iter_mut().zip(labels.iter().rev()) {
            *slot = parse_component(label, 4).ok_or_else(invalid)?;
        }
        let addr = from_components(false, &nibbles);
        IpNet::new(addr, (labels.len() * 4) as u8).map_err(|_| invalid())
    } else {
        Err(invalid())
    }
}

/// Returns the address named by a fully qualified reverse name.
///
/// Returns `None` unless the name covers the complete address, e.g.
/// `5.1.0.10.in-addr.arpa.`.
pub fn reverse_name_to_address(fqdn: &str) -> Option<IpAddr> {
    let net = network_from_reverse_zone_name(fqdn).ok()?;
    if net.prefix_len() == net.max_prefix_len() {
        Some(net.addr())
    } else {
        None
    }
}

fn strip_arpa_suffix<'a>(name: &'a str, suffix: &str) -> Option<&'a str> {
    if name == suffix {
        return Some("");
    }
    name.strip_suffix(suffix)?.strip_suffix('.')
}

fn split_labels(rest: &str) -> Vec<&str> {
    if rest.is_empty() {
        Vec::new()
    } else {
        rest.split('.').collect()
    }
}

//============ Testing =======================================================

#[cfg(test)]
mod test {
    use rstest::rstest;

    use super::*;

    fn zone(net: &str) -> Zone {
        Zone::reverse(net.parse().unwrap())
    }

    #[test]
    fn octet_aligned_label() {
        let addr = "10.0.1.5".parse().unwrap();
        assert_eq!(address_to_reverse_label(addr, 16), "5.1");
        assert_eq!(address_to_reverse_label(addr, 24), "5");
        assert_eq!(address_to_reverse_label(addr, 8), "5.1.0");
        assert_eq!(address_to_reverse_label(addr, 32), APEX);
    }

    #[test]
    fn unaligned_prefix_rounds_down() {
        let addr = "10.0.17.5".parse().unwrap();
        assert_eq!(address_to_reverse_label(addr, 20), "5.17");
        assert_eq!(address_to_reverse_label(addr, 26), "5");
    }

    #[test]
    fn ipv6_nibbles() {
        let addr = "2001:db8::1".parse().unwrap();
        let label = address_to_reverse_label(addr, 64);
        assert_eq!(label, "1.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0");
        let zone = zone("2001:db8::/64");
        assert_eq!(reverse_label_to_address(&zone, &label).unwrap(), addr);
    }

    #[rstest]
    #[case("10.0.0.0/16", "10.0.1.5")]
    #[case("10.0.1.0/24", "10.0.1.255")]
    #[case("10.0.16.0/20", "10.0.31.7")]
    #[case("192.168.4.64/26", "192.168.4.100")]
    #[case("172.16.0.0/12", "172.31.200.3")]
    #[case("0.0.0.0/0", "8.8.4.4")]
    #[case("10.0.1.5/32", "10.0.1.5")]
    fn label_round_trip(#[case] net: &str, #[case] addr: &str) {
        let zone = zone(net);
        let addr: IpAddr = addr.parse().unwrap();
        let label =
            address_to_reverse_label(addr, zone.prefix_len().unwrap());
        assert_eq!(reverse_label_to_address(&zone, &label).unwrap(), addr);
    }

    #[rstest]
    #[case("10.0.0.0/16", "5")]
    #[case("10.0.0.0/16", "5.1.0")]
    #[case("10.0.0.0/16", "5.x")]
    #[case("10.0.0.0/16", "5.01")]
    #[case("10.0.0.0/16", "5.256")]
    #[case("10.0.16.0/20", "5.200")]
    #[case("10.0.1.0/24", "@")]
    fn invalid_labels(#[case] net: &str, #[case] label: &str) {
        assert!(matches!(
            reverse_label_to_address(&zone(net), label),
            Err(Error::InvalidName(_))
        ));
    }

    #[test]
    fn forward_zone_has_no_reverse_labels() {
        assert!(matches!(
            reverse_label_to_address(&Zone::forward("example.com"), "5"),
            Err(Error::InvalidName(_))
        ));
    }

    #[test]
    fn local_labels() {
        assert_eq!(
            fqdn_to_local_label("Host.Example.com", "example.com.").unwrap(),
            "host"
        );
        assert_eq!(
            fqdn_to_local_label("a.b.example.com.", "example.com").unwrap(),
            "a.b"
        );
        assert_eq!(
            fqdn_to_local_label("example.com", "example.com").unwrap(),
            APEX
        );
        assert!(matches!(
            fqdn_to_local_label("host.badexample.com", "example.com"),
            Err(Error::NotInZone { .. })
        ));
        assert!(matches!(
            fqdn_to_local_label("host.example.org", "example.com"),
            Err(Error::NotInZone { .. })
        ));
        assert_eq!(
            local_label_to_fqdn("host", "example.com"),
            "host.example.com."
        );
        assert_eq!(local_label_to_fqdn(APEX, "example.com"), "example.com.");
    }

    #[rstest]
    #[case("10.0.0.0/16", "0.10.in-addr.arpa.")]
    #[case("10.0.1.0/24", "1.0.10.in-addr.arpa.")]
    #[case("10.0.16.0/20", "16-31.0.10.in-addr.arpa.")]
    #[case("192.168.4.64/26", "64-127.4.168.192.in-addr.arpa.")]
    #[case("2001:db8::/32", "8.b.d.0.1.0.0.2.ip6.arpa.")]
    fn zone_names(#[case] net: &str, #[case] expected: &str) {
        let net: IpNet = net.parse().unwrap();
        assert_eq!(reverse_zone_name(&net), expected);
        assert_eq!(network_from_reverse_zone_name(expected).unwrap(), net);
    }

    #[rstest]
    #[case("example.com.")]
    #[case("1.2.3.4.5.in-addr.arpa.")]
    #[case("16-30.0.10.in-addr.arpa.")]
    #[case("0.16-31.10.in-addr.arpa.")]
    #[case("x.ip6.arpa.")]
    fn bad_zone_names(#[case] zone_name: &str) {
        assert!(network_from_reverse_zone_name(zone_name).is_err());
    }

    #[test]
    fn full_reverse_names() {
        assert_eq!(
            reverse_name_to_address("5.1.0.10.in-addr.arpa"),
            Some("10.0.1.5".parse().unwrap())
        );
        assert_eq!(reverse_name_to_address("1.0.10.in-addr.arpa"), None);
    }
}
