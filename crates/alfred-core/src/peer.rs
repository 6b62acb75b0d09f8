//! Per-interface peer (master) table (§3, §4.3).

use std::collections::HashMap;
use std::net::IpAddr;

use alfred_proto::MacAddr;

/// A remote master discovered on one interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Peer<Instant> {
    /// Hardware address of the peer. Key into the table.
    pub hwaddr: MacAddr,
    /// IP address the peer last announced from.
    pub address: IpAddr,
    /// Link quality, updated externally by the mesh link-quality collaborator
    /// (§1). Not touched by the core beyond storage; defaults to `0`.
    pub tq: u8,
    /// Time this peer's announce was last seen.
    pub last_seen: Instant,
}

/// Known masters reachable on one interface, keyed by hardware address.
#[derive(Debug, Clone)]
pub struct PeerTable<Instant> {
    peers: HashMap<MacAddr, Peer<Instant>>,
}

impl<Instant> Default for PeerTable<Instant> {
    fn default() -> Self {
        Self { peers: HashMap::new() }
    }
}

impl<Instant: Copy + Ord + std::ops::Sub<Output = std::time::Duration>> PeerTable<Instant> {
    /// Builds an empty peer table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an `ANNOUNCE_MASTER` from `sender_mac`/`sender_ip`: creates
    /// the entry if absent, refreshes `last_seen` and `address` either way.
    pub fn on_announce(&mut self, sender_mac: MacAddr, sender_ip: IpAddr, now: Instant) {
        self.peers
            .entry(sender_mac)
            .and_modify(|peer| {
                peer.address = sender_ip;
                peer.last_seen = now;
            })
            .or_insert(Peer { hwaddr: sender_mac, address: sender_ip, tq: 0, last_seen: now });
    }

    /// Looks up a peer by hardware address.
    #[must_use]
    pub fn get(&self, hwaddr: &MacAddr) -> Option<&Peer<Instant>> {
        self.peers.get(hwaddr)
    }

    /// Updates the link-quality metric for a peer, if known. Link quality is
    /// supplied externally (§3); the core only stores it.
    pub fn set_tq(&mut self, hwaddr: &MacAddr, tq: u8) {
        if let Some(peer) = self.peers.get_mut(hwaddr) {
            peer.tq = tq;
        }
    }

    /// Iterates all known peers on this interface.
    pub fn iterate(&self) -> impl Iterator<Item = &Peer<Instant>> {
        self.peers.values()
    }

    /// Number of known peers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.peers.len()
    }

    /// Whether no peers are known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Evicts peers whose last announce is older than `ttl`.
    pub fn sweep(&mut self, now: Instant, ttl: std::time::Duration) {
        self.peers.retain(|_, peer| now - peer.last_seen <= ttl);
    }
}

#[cfg(test)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr};
    use std::time::Duration;

    use alfred_proto::MacAddr;

    use super::PeerTable;

    type D = Duration;

    fn ip(last: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(10, 0, 0, last))
    }

    #[test]
    fn announce_creates_then_refreshes_last_seen() {
        let mut table: PeerTable<D> = PeerTable::new();
        let mac = MacAddr::new([1; 6]);
        table.on_announce(mac, ip(1), D::ZERO);
        assert_eq!(table.len(), 1);
        table.on_announce(mac, ip(1), D::from_secs(5));
        assert_eq!(table.len(), 1);
        assert_eq!(table.get(&mac).unwrap().last_seen, D::from_secs(5));
    }

    #[test]
    fn sweep_evicts_stale_peers_only() {
        let mut table: PeerTable<D> = PeerTable::new();
        let fresh = MacAddr::new([1; 6]);
        let stale = MacAddr::new([2; 6]);
        table.on_announce(fresh, ip(1), D::from_secs(95));
        table.on_announce(stale, ip(2), D::ZERO);
        table.sweep(D::from_secs(100), D::from_secs(10));
        assert!(table.get(&fresh).is_some());
        assert!(table.get(&stale).is_none());
    }

    #[test]
    fn at_most_one_entry_per_hwaddr() {
        let mut table: PeerTable<D> = PeerTable::new();
        let mac = MacAddr::new([9; 6]);
        for i in 0..4u8 {
            table.on_announce(mac, ip(i), D::from_secs(u64::from(i)));
        }
        assert_eq!(table.len(), 1);
    }
}
