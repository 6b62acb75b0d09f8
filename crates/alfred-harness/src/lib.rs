//! In-process multi-node simulation harness for `alfred-core` (§8).
//!
//! Wires two or three full [`Context`]s together over an in-memory
//! [`Network`] instead of real multicast sockets, so a test can exercise
//! genuine cross-node protocol exchanges — announce, sync, a local push to
//! the chosen master — without a `tokio` runtime or the daemon crate's
//! socket layer. Modeled on the teacher's in-process cluster harness, scaled
//! down because the core under test is fully synchronous.

mod network;

use std::net::IpAddr;

use alfred_core::{
    sim::SimEnv, ChangeListener, ClientFinish, Context, Environment, InterfaceState, MacAddr, OpMode,
    StaticMeshResolver, Transaction,
};

pub use network::{Network, NodeTransport};

/// Records every `changed_data_type` callback, in call order.
#[derive(Debug, Clone, Default)]
pub struct RecordingListener {
    /// Record types passed to `changed_data_type`, in arrival order.
    pub changed_types: Vec<u8>,
}

impl ChangeListener for RecordingListener {
    fn changed_data_type(&mut self, record_type: u8) {
        self.changed_types.push(record_type);
    }
}

/// Records every completed client-bound transaction, in call order.
#[derive(Debug, Clone, Default)]
pub struct RecordingClientFinish<Instant> {
    /// Transactions passed to `client_request_finish`, in completion order.
    pub finished: Vec<Transaction<Instant>>,
}

impl<Instant> ClientFinish<Instant> for RecordingClientFinish<Instant> {
    fn client_request_finish(&mut self, transaction: Transaction<Instant>) {
        self.finished.push(transaction);
    }
}

/// One simulated daemon: a full protocol [`Context`] plus the collaborators
/// `on_frame` needs, all addressed at a single IP on a single interface.
pub struct Node {
    name: String,
    ip: IpAddr,
    interface: String,
    /// The node's protocol state. Public so tests can seed local data,
    /// inspect the cache, or set `best_server` directly.
    pub ctx: Context<SimEnv>,
    /// The node's view of the mesh routing table. Public so tests can wire
    /// up peer MAC resolution for addresses beyond the simulated nodes.
    pub resolver: StaticMeshResolver,
    /// Every dataset change this node has observed.
    pub listener: RecordingListener,
    /// Every client-bound transaction this node has completed.
    pub client_finish: RecordingClientFinish<std::time::Duration>,
}

impl Node {
    /// This node's name, as given to [`Simulation::add_node`].
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// This node's simulated address.
    #[must_use]
    pub fn ip(&self) -> IpAddr {
        self.ip
    }

    /// This node's single interface name.
    #[must_use]
    pub fn interface(&self) -> &str {
        &self.interface
    }
}

/// A small fixed mesh of [`Node`]s sharing one [`Network`], and the virtual
/// clock driving their `Environment`.
///
/// Every node runs one interface named `interface_name` (`"bat0"` unless
/// built with [`Simulation::with_interface_name`]) bound to its own address,
/// and peer hardware addresses are derived deterministically from the IP's
/// last octet so tests don't need to hand-assign MACs.
pub struct Simulation {
    interface_name: String,
    multicast_group: IpAddr,
    env: SimEnv,
    nodes: std::collections::HashMap<String, Node>,
    network: Network,
}

fn mac_for(ip: IpAddr) -> MacAddr {
    let octet = match ip {
        IpAddr::V4(v4) => v4.octets()[3],
        IpAddr::V6(v6) => v6.octets()[15],
    };
    MacAddr::new([0, 0, 0, 0, 0, octet])
}

impl Simulation {
    /// Builds an empty simulation with no nodes, using interface `"bat0"`
    /// and multicast group `224.0.0.1`.
    #[must_use]
    pub fn new(multicast_group: IpAddr) -> Self {
        Self {
            interface_name: "bat0".to_string(),
            multicast_group,
            env: SimEnv::new(),
            nodes: std::collections::HashMap::new(),
            network: Network::new(),
        }
    }

    /// Overrides the interface name every node is created with. Must be
    /// called before [`Simulation::add_node`].
    #[must_use]
    pub fn with_interface_name(mut self, name: impl Into<String>) -> Self {
        self.interface_name = name.into();
        self
    }

    /// Advances the shared virtual clock.
    pub fn advance(&mut self, duration: std::time::Duration) {
        self.env.advance(duration);
    }

    /// Adds a node at `ip`, operating in `opmode`, and registers it with the
    /// mesh's multicast group. Every other already-added node's mesh
    /// resolver learns this node's address, and vice versa, so
    /// `announce_master`/`sync_data` work immediately without the test
    /// wiring peer MACs by hand.
    pub fn add_node(&mut self, name: impl Into<String>, ip: IpAddr, opmode: OpMode) -> &mut Node {
        let name = name.into();
        let mac = mac_for(ip);

        let mut ctx: Context<SimEnv> = Context::new(opmode, true, self.multicast_group, self.env.clone());
        ctx.add_interface(InterfaceState::new(self.interface_name.clone(), vec![ip], None));

        let mut resolver = StaticMeshResolver::new();
        for other in self.nodes.values_mut() {
            resolver.insert(&self.interface_name, other.ip, mac_for(other.ip));
            other.resolver.insert(&self.interface_name, ip, mac);
        }

        self.network.register_node(name.clone(), ip);
        self.network.register_multicast_group(self.multicast_group);

        let node = Node {
            name: name.clone(),
            ip,
            interface: self.interface_name.clone(),
            ctx,
            resolver,
            listener: RecordingListener::default(),
            client_finish: RecordingClientFinish::default(),
        };
        self.nodes.entry(name).or_insert(node)
    }

    /// Looks up a node by name.
    ///
    /// # Panics
    ///
    /// Panics if no node named `name` was added via [`Simulation::add_node`].
    #[must_use]
    #[allow(clippy::panic)]
    pub fn node(&self, name: &str) -> &Node {
        self.nodes.get(name).unwrap_or_else(|| panic!("no such node: {name}"))
    }

    /// Looks up a node by name, mutably.
    ///
    /// # Panics
    ///
    /// Panics if no node named `name` was added via [`Simulation::add_node`].
    #[allow(clippy::panic)]
    pub fn node_mut(&mut self, name: &str) -> &mut Node {
        self.nodes.get_mut(name).unwrap_or_else(|| panic!("no such node: {name}"))
    }

    fn transport_for(&mut self, node_name: &str) -> NodeTransport<'_> {
        let ip = self.nodes[node_name].ip;
        NodeTransport { network: &mut self.network, sender_ip: ip }
    }

    /// Runs `alfred_core::announce_master` for `node_name`, routing its
    /// output through the shared network.
    ///
    /// # Panics
    ///
    /// Panics if no node named `node_name` was added via [`Simulation::add_node`].
    #[allow(clippy::expect_used)]
    pub fn announce_master(&mut self, node_name: &str) {
        let mut transport = self.transport_for(node_name);
        let node = self.nodes.get_mut(node_name).expect("node exists");
        alfred_core::announce_master(&mut node.ctx, &mut transport);
    }

    /// Runs `alfred_core::sync_data` for `node_name`.
    ///
    /// # Panics
    ///
    /// Panics if no node named `node_name` was added via [`Simulation::add_node`].
    #[allow(clippy::expect_used)]
    pub fn sync_data(&mut self, node_name: &str) {
        let mut transport = self.transport_for(node_name);
        let node = self.nodes.get_mut(node_name).expect("node exists");
        alfred_core::sync_data(&mut node.ctx, &mut transport);
    }

    /// Runs `alfred_core::push_local_data` for `node_name`.
    ///
    /// # Panics
    ///
    /// Panics if no node named `node_name` was added via [`Simulation::add_node`].
    #[allow(clippy::expect_used)]
    pub fn push_local_data(&mut self, node_name: &str) -> bool {
        let mut transport = self.transport_for(node_name);
        let node = self.nodes.get_mut(node_name).expect("node exists");
        alfred_core::push_local_data(&mut node.ctx, &mut transport)
    }

    /// Injects a raw, already-encoded frame into `node_name`'s inbox as if
    /// `sender_ip` had sent it, without requiring `sender_ip` to belong to a
    /// registered [`Node`].
    pub fn inject(&mut self, node_name: &str, sender_ip: IpAddr, bytes: Vec<u8>) {
        self.network.inject(node_name, sender_ip, bytes);
    }

    /// Drains every node's inbox through `on_frame`, repeatedly, until no
    /// node has pending frames — including ones newly produced by this same
    /// call (e.g. a `REQUEST` answered by a `PUSH_DATA`/`STATUS_TXEND` pair
    /// that another node must still process).
    ///
    /// # Panics
    ///
    /// Panics if the network never quiesces after 10,000 rounds, which would
    /// indicate nodes looping frames back and forth rather than the
    /// harness's network settling.
    pub fn pump(&mut self) {
        let mut rounds = 0;
        loop {
            rounds += 1;
            assert!(rounds < 10_000, "network did not settle; nodes may be echoing frames back and forth");

            let names: Vec<String> = self.nodes.keys().cloned().collect();
            let mut delivered_any = false;

            for name in names {
                let frames = self.network.drain(&name);
                if frames.is_empty() {
                    continue;
                }
                delivered_any = true;

                for frame in frames {
                    // `name` was just read from `self.nodes.keys()` above.
                    #[allow(clippy::expect_used)]
                    let node = self.nodes.get_mut(&name).expect("node exists");
                    let sender_ip = node.ip;
                    let mut transport = NodeTransport { network: &mut self.network, sender_ip };
                    alfred_core::on_frame(
                        &mut node.ctx,
                        &mut transport,
                        &node.resolver,
                        &mut node.listener,
                        &mut node.client_finish,
                        &node.interface,
                        frame.sender_ip,
                        &frame.bytes,
                    );
                }
            }

            if !delivered_any {
                break;
            }
        }
    }
}
