//! The aggregate root ("Globals") threaded through every core call (§3, §9).

use std::collections::HashMap;
use std::net::IpAddr;

use alfred_proto::MacAddr;

use crate::dataset::DatasetCache;
use crate::env::Environment;
use crate::peer::PeerTable;
use crate::transaction::{Transaction, TransactionTable};

/// The role a node operates in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpMode {
    /// Authoritative cache; responds to pulls, accepts unsolicited pushes
    /// from other masters syncing, re-broadcasts.
    Master,
    /// Pushes local data to its chosen master; answers local client queries
    /// by requesting from a master.
    Slave,
}

/// Diagnostics counters for conditions that are dropped silently at the
/// protocol level but worth surfacing for observability (§7, §9 Open
/// Questions).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Diagnostics {
    /// Frames dropped for being malformed: truncated, a length mismatch,
    /// wrong version, an unknown frame type, or (for IPv6 senders) not
    /// EUI-64 link-local — §7 collapses all of these into one error kind.
    pub malformed_frames: u64,
    /// Frames dropped because `resolve_mac` failed for the sender.
    pub unresolved_mac: u64,
    /// Frames dropped for violating the master/slave role rules (§4.4).
    pub role_violations: u64,
    /// Frames dropped because the sender was one of our own addresses
    /// (§4.5 rule 1).
    pub own_address_filtered: u64,
    /// Dataset records that could not be packed into any packet because they
    /// alone exceed the packet budget (§4.6, §9 Open Question).
    pub oversized_record_skips: u64,
}

/// A single observed dataset-type change, for the external
/// `changed_data_type(type)` callback (§4.2).
pub trait ChangeListener {
    /// Invoked when an `upsert_remote` or `upsert_local` call created a new
    /// entry, or changed the payload of an existing one.
    fn changed_data_type(&mut self, record_type: u8);
}

/// No-op listener for contexts that don't care about change notifications.
impl ChangeListener for () {
    fn changed_data_type(&mut self, _record_type: u8) {}
}

/// The IPC layer's hook for transaction completion (§4.4, §4.10, §6).
pub trait ClientFinish<Instant> {
    /// Invoked once, when a client-bound transaction completes. The
    /// transaction's buffered records have already been applied to the
    /// dataset cache by the time this fires.
    fn client_request_finish(&mut self, transaction: Transaction<Instant>);
}

impl<Instant> ClientFinish<Instant> for () {
    fn client_request_finish(&mut self, _transaction: Transaction<Instant>) {}
}

/// Binding context for one network interface: its own addresses (for the
/// dispatcher's own-address filter), an optional IPv6 scope id, and its
/// per-interface peer table (§3 "Interface").
#[derive(Debug, Clone)]
pub struct InterfaceState<Instant> {
    /// Interface name, e.g. `"bat0"`.
    pub name: String,
    /// Addresses bound to this interface; frames from any of these are
    /// ignored by the dispatcher (§4.5 rule 1).
    pub own_addrs: Vec<IpAddr>,
    /// IPv6 scope id for link-local sends on this interface, if applicable.
    pub scope_id: Option<u32>,
    /// Masters known on this interface.
    pub peers: PeerTable<Instant>,
}

impl<Instant: Copy + Ord + std::ops::Sub<Output = std::time::Duration>> InterfaceState<Instant> {
    /// Builds a fresh interface binding with no known peers.
    #[must_use]
    pub fn new(name: impl Into<String>, own_addrs: Vec<IpAddr>, scope_id: Option<u32>) -> Self {
        Self { name: name.into(), own_addrs, scope_id, peers: PeerTable::new() }
    }
}

/// TTLs governing the three retention sweeps (§4.11, `tick_sweep`).
#[derive(Debug, Clone, Copy)]
pub struct RetentionTtls {
    /// Dataset cache entry TTL.
    pub dataset: std::time::Duration,
    /// Peer table entry TTL.
    pub peer: std::time::Duration,
    /// Transaction table entry TTL.
    pub transaction: std::time::Duration,
}

/// The aggregate root: dataset cache, transaction table, interfaces,
/// best-server pointer, role/mode flags, diagnostics, and the environment
/// handle. All mutable state; accessed from a single event-loop thread (§5).
pub struct Context<E: Environment> {
    /// Keyed dataset cache, shared across all interfaces.
    pub cache: DatasetCache<E::Instant>,
    /// In-flight transaction reassembly state, shared across all interfaces
    /// (a peer's hardware address is unambiguous mesh-wide).
    pub transactions: TransactionTable<E::Instant>,
    /// Per-interface binding contexts, keyed by interface name.
    pub interfaces: HashMap<String, InterfaceState<E::Instant>>,
    /// The best known master to push local data to, if any: `(interface,
    /// hwaddr)`, resolved against that interface's peer table.
    pub best_server: Option<(String, MacAddr)>,
    /// Master or slave.
    pub opmode: OpMode,
    /// Whether this node operates over IPv4 multicast instead of IPv6.
    pub ipv4mode: bool,
    /// The well-known multicast group `ANNOUNCE_MASTER`/sync traffic targets.
    pub multicast_group: IpAddr,
    /// Observability counters for conditions dropped at the protocol level.
    pub diagnostics: Diagnostics,
    /// Time and randomness source.
    pub env: E,
}

impl<E: Environment> Context<E> {
    /// Builds a context with no interfaces, caches, or transactions yet.
    #[must_use]
    pub fn new(opmode: OpMode, ipv4mode: bool, multicast_group: IpAddr, env: E) -> Self {
        Self {
            cache: DatasetCache::new(),
            transactions: TransactionTable::new(),
            interfaces: HashMap::new(),
            best_server: None,
            opmode,
            ipv4mode,
            multicast_group,
            diagnostics: Diagnostics::default(),
            env,
        }
    }

    /// Registers an interface binding. Replaces any existing binding of the
    /// same name, discarding its peer table.
    pub fn add_interface(&mut self, interface: InterfaceState<E::Instant>) {
        self.interfaces.insert(interface.name.clone(), interface);
    }

    /// Returns whether `addr` belongs to any of our own interfaces
    /// (dispatcher rule 1, §4.5).
    #[must_use]
    pub fn is_own_address(&self, addr: IpAddr) -> bool {
        self.interfaces.values().any(|iface| iface.own_addrs.contains(&addr))
    }

    /// Sweeps the dataset cache, every interface's peer table, and the
    /// transaction table, using the given TTLs (`tick_sweep`, §4.11).
    pub fn sweep(&mut self, ttls: RetentionTtls) {
        let now = self.env.now();
        self.cache.sweep(now, ttls.dataset);
        for iface in self.interfaces.values_mut() {
            iface.peers.sweep(now, ttls.peer);
        }
        self.transactions.sweep(now, ttls.transaction);
    }
}

#[cfg(test)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr};

    use super::{Context, InterfaceState, OpMode, RetentionTtls};
    use crate::env::sim::SimEnv;

    fn mcast() -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(224, 0, 0, 1))
    }

    #[test]
    fn own_address_filter_checks_every_interface() {
        let mut ctx: Context<SimEnv> = Context::new(OpMode::Master, true, mcast(), SimEnv::new());
        let own = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 5));
        ctx.add_interface(InterfaceState::new("bat0", vec![own], None));
        assert!(ctx.is_own_address(own));
        assert!(!ctx.is_own_address(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 6))));
    }

    #[test]
    fn sweep_touches_cache_peers_and_transactions() {
        let mut ctx: Context<SimEnv> = Context::new(OpMode::Master, true, mcast(), SimEnv::new());
        ctx.add_interface(InterfaceState::new("bat0", vec![], None));
        let ttls = RetentionTtls {
            dataset: std::time::Duration::from_secs(1),
            peer: std::time::Duration::from_secs(1),
            transaction: std::time::Duration::from_secs(1),
        };
        // Should not panic on an empty context.
        ctx.sweep(ttls);
        assert!(ctx.cache.is_empty());
    }
}
