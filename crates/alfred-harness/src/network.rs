//! A synchronous, in-memory router standing in for real multicast sockets
//! (§4.8, §8 ambient test tooling): frames sent by one node's
//! [`NodeTransport`] land directly in another registered node's inbox, with
//! no task, socket, or clock involved.

use std::collections::{HashMap, HashSet, VecDeque};
use std::net::IpAddr;

use alfred_core::FrameTransport;

struct Inbound {
    sender_ip: IpAddr,
    bytes: Vec<u8>,
}

/// Routes frames between registered node addresses, and fans frames sent to
/// a registered multicast group out to every other node — the two
/// destination shapes the real transport distinguishes by socket type
/// (§4.8), collapsed here to address-based delivery.
#[derive(Default)]
pub struct Network {
    owners: HashMap<IpAddr, String>,
    multicast_groups: HashSet<IpAddr>,
    inboxes: HashMap<String, VecDeque<Inbound>>,
}

impl Network {
    /// Builds an empty network with no registered nodes or groups.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `ip` as the address `node` sends from and receives unicast
    /// frames addressed to.
    pub fn register_node(&mut self, node: impl Into<String>, ip: IpAddr) {
        let node = node.into();
        self.owners.insert(ip, node.clone());
        self.inboxes.entry(node).or_default();
    }

    /// Marks `group` as a multicast address: frames sent to it fan out to
    /// every other registered node instead of being looked up by owner.
    pub fn register_multicast_group(&mut self, group: IpAddr) {
        self.multicast_groups.insert(group);
    }

    fn deliver(&mut self, sender_ip: IpAddr, dest: IpAddr, bytes: Vec<u8>) {
        if self.multicast_groups.contains(&dest) {
            for node in self.owners.values() {
                self.inboxes.entry(node.clone()).or_default().push_back(Inbound { sender_ip, bytes: bytes.clone() });
            }
            return;
        }
        if let Some(node) = self.owners.get(&dest) {
            self.inboxes.entry(node.clone()).or_default().push_back(Inbound { sender_ip, bytes });
        }
        // Frames to unregistered addresses vanish silently, same as real UDP
        // with nobody listening.
    }

    /// Queues a frame directly into `node`'s inbox as if `sender_ip` had
    /// sent it, without requiring a full registered peer node — useful for
    /// injecting a one-off `REQUEST` from an address the test doesn't model
    /// as its own [`crate::Node`].
    pub fn inject(&mut self, node: impl Into<String>, sender_ip: IpAddr, bytes: Vec<u8>) {
        self.inboxes.entry(node.into()).or_default().push_back(Inbound { sender_ip, bytes });
    }

    fn take_inbound(&mut self, node: &str) -> VecDeque<Inbound> {
        self.inboxes.get_mut(node).map(std::mem::take).unwrap_or_default()
    }

    /// Whether any node has frames still waiting to be processed.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        self.inboxes.values().any(|queue| !queue.is_empty())
    }
}

/// A [`FrameTransport`] bound to one node's address, routing every send
/// through the shared [`Network`].
pub struct NodeTransport<'net> {
    pub(crate) network: &'net mut Network,
    pub(crate) sender_ip: IpAddr,
}

impl FrameTransport for NodeTransport<'_> {
    fn send_frame(&mut self, _interface: &str, dest: IpAddr, bytes: &[u8]) -> bool {
        self.network.deliver(self.sender_ip, dest, bytes.to_vec());
        true
    }
}

pub(crate) struct DeliveredFrame {
    pub sender_ip: IpAddr,
    pub bytes: Vec<u8>,
}

impl Network {
    /// Drains one node's inbox into a plain `Vec`, for the simulation
    /// driver to feed through `on_frame` one at a time.
    pub(crate) fn drain(&mut self, node: &str) -> Vec<DeliveredFrame> {
        self.take_inbound(node).into_iter().map(|inbound| DeliveredFrame { sender_ip: inbound.sender_ip, bytes: inbound.bytes }).collect()
    }
}
