//! Mesh resolver: mapping a peer IP to its hardware address (§4.9).
//!
//! For IPv6 link-local EUI-64 addresses the MAC is algorithmically
//! recoverable from the address's interface identifier; everything else
//! (IPv4, non-EUI-64 IPv6) defers to an injected [`MeshTableResolver`]
//! modeling the external mesh link-quality table named only by interface in
//! §1.

use std::collections::HashMap;
use std::net::{IpAddr, Ipv6Addr};

use alfred_proto::MacAddr;

/// External collaborator mapping a peer IP to a hardware address for
/// addresses this crate cannot resolve algorithmically (§1, §6).
pub trait MeshTableResolver {
    /// Looks up the hardware address reachable at `ip` on `interface`.
    fn resolve(&self, interface: &str, ip: IpAddr) -> Option<MacAddr>;
}

/// A static, `HashMap`-backed resolver. Stands in for the real mesh routing
/// table in tests and in deployments where IPv4 peers are pre-provisioned.
#[derive(Debug, Clone, Default)]
pub struct StaticMeshResolver {
    entries: HashMap<(String, IpAddr), MacAddr>,
}

impl StaticMeshResolver {
    /// Builds an empty resolver.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a mapping.
    pub fn insert(&mut self, interface: impl Into<String>, ip: IpAddr, mac: MacAddr) {
        self.entries.insert((interface.into(), ip), mac);
    }
}

impl MeshTableResolver for StaticMeshResolver {
    fn resolve(&self, interface: &str, ip: IpAddr) -> Option<MacAddr> {
        self.entries.get(&(interface.to_string(), ip)).copied()
    }
}

/// Recovers the 6-byte hardware address encoded in an EUI-64 IPv6
/// link-local address's interface identifier, or `None` if `ip` is not
/// link-local or not EUI-64 shaped.
///
/// The EUI-64 expansion inserts `ff:fe` in the middle of the MAC and flips
/// the universal/local bit (bit 1 of the first octet); this inverts both
/// steps.
#[must_use]
pub fn mac_from_eui64_link_local(ip: &Ipv6Addr) -> Option<MacAddr> {
    if !is_link_local(ip) {
        return None;
    }
    let segments = ip.octets();
    let iid = &segments[8..16];
    if iid[3] != 0xff || iid[4] != 0xfe {
        return None;
    }
    let mut mac = [0u8; 6];
    mac[0] = iid[0] ^ 0x02;
    mac[1] = iid[1];
    mac[2] = iid[2];
    mac[3] = iid[5];
    mac[4] = iid[6];
    mac[5] = iid[7];
    Some(MacAddr::new(mac))
}

/// Whether `ip` is EUI-64 link-local (`fe80::/10` with an EUI-64 shaped
/// interface identifier) — the discipline the dispatcher enforces for IPv6
/// senders (§4.5 rule 2).
#[must_use]
pub fn is_eui64_link_local(ip: &Ipv6Addr) -> bool {
    mac_from_eui64_link_local(ip).is_some()
}

fn is_link_local(ip: &Ipv6Addr) -> bool {
    let segments = ip.segments();
    (segments[0] & 0xffc0) == 0xfe80
}

/// Resolves a sender's hardware address: EUI-64 link-local IPv6 addresses
/// are decoded directly, everything else defers to `resolver` (§4.9).
#[must_use]
pub fn resolve_mac(interface: &str, ip: IpAddr, resolver: &dyn MeshTableResolver) -> Option<MacAddr> {
    if let IpAddr::V6(v6) = ip {
        if let Some(mac) = mac_from_eui64_link_local(&v6) {
            return Some(mac);
        }
    }
    resolver.resolve(interface, ip)
}

#[cfg(test)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

    use super::{is_eui64_link_local, mac_from_eui64_link_local, resolve_mac, StaticMeshResolver};
    use alfred_proto::MacAddr;

    fn eui64_link_local_for(mac: [u8; 6]) -> Ipv6Addr {
        let mut iid = [0u8; 8];
        iid[0] = mac[0] ^ 0x02;
        iid[1] = mac[1];
        iid[2] = mac[2];
        iid[3] = 0xff;
        iid[4] = 0xfe;
        iid[5] = mac[3];
        iid[6] = mac[4];
        iid[7] = mac[5];
        Ipv6Addr::new(
            0xfe80,
            0,
            0,
            0,
            u16::from_be_bytes([iid[0], iid[1]]),
            u16::from_be_bytes([iid[2], iid[3]]),
            u16::from_be_bytes([iid[4], iid[5]]),
            u16::from_be_bytes([iid[6], iid[7]]),
        )
    }

    #[test]
    fn round_trips_mac_through_eui64_link_local() {
        let mac = [0x02, 0x11, 0x22, 0x33, 0x44, 0x55];
        let ip = eui64_link_local_for(mac);
        assert!(is_eui64_link_local(&ip));
        assert_eq!(mac_from_eui64_link_local(&ip), Some(MacAddr::new(mac)));
    }

    #[test]
    fn rejects_non_link_local_address() {
        let ip: Ipv6Addr = "2001:db8::1".parse().unwrap();
        assert!(!is_eui64_link_local(&ip));
        assert_eq!(mac_from_eui64_link_local(&ip), None);
    }

    #[test]
    fn rejects_non_eui64_link_local_address() {
        let ip: Ipv6Addr = "fe80::1".parse().unwrap();
        assert!(!is_eui64_link_local(&ip));
    }

    #[test]
    fn ipv4_defers_to_injected_resolver() {
        let mut resolver = StaticMeshResolver::new();
        let ip = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1));
        let mac = MacAddr::new([9; 6]);
        resolver.insert("bat0", ip, mac);
        assert_eq!(resolve_mac("bat0", ip, &resolver), Some(mac));
    }

    #[test]
    fn unresolvable_ipv4_returns_none() {
        let resolver = StaticMeshResolver::new();
        let ip = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 9));
        assert_eq!(resolve_mac("bat0", ip, &resolver), None);
    }

    #[test]
    fn eui64_link_local_ipv6_never_consults_resolver() {
        let resolver = StaticMeshResolver::new();
        let mac = [0x02, 0x11, 0x22, 0x33, 0x44, 0x55];
        let ip = IpAddr::V6(eui64_link_local_for(mac));
        assert_eq!(resolve_mac("bat0", ip, &resolver), Some(MacAddr::new(mac)));
    }
}
