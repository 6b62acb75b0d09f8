//! Concrete UDP multicast socket/transport layer (ambient, §4.8): binds one
//! multicast-joined socket per interface using `socket2` (multicast
//! group-join options a plain `std`/`tokio` socket can't express), then
//! drives each as a non-blocking [`tokio::net::UdpSocket`]. Own-address
//! filtering stays in the dispatcher, not here, so it remains testable
//! without a real socket (§4.8).

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr, SocketAddrV4, SocketAddrV6};
use std::sync::Arc;

use alfred_core::FrameTransport;
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;

use crate::config::InterfaceSpec;
use crate::error::DaemonError;

struct BoundInterface {
    socket: Arc<UdpSocket>,
    scope_id: Option<u32>,
}

/// Production [`FrameTransport`]: one real UDP multicast socket per
/// interface.
///
/// An interface whose send fails with `PermissionDenied` is closed and
/// dropped from `interfaces` rather than retried in place (§7); it sits
/// invalid until [`MulticastTransport::revalidate`] successfully re-binds it,
/// which the scheduler calls on every sweep tick.
pub struct MulticastTransport {
    interfaces: HashMap<String, BoundInterface>,
    specs: HashMap<String, InterfaceSpec>,
    group: IpAddr,
    port: u16,
}

impl MulticastTransport {
    /// Binds a multicast socket for every interface, joining `group` on
    /// each, and wraps it as a non-blocking tokio socket.
    pub fn bind(interfaces: &[InterfaceSpec], group: IpAddr, port: u16) -> Result<Self, DaemonError> {
        let mut bound = HashMap::new();
        let mut specs = HashMap::new();
        for spec in interfaces {
            let tokio_socket = bind_and_wrap(spec, group, port)?;
            bound.insert(
                spec.name.clone(),
                BoundInterface { socket: Arc::new(tokio_socket), scope_id: spec.scope_id },
            );
            specs.insert(spec.name.clone(), spec.clone());
        }
        Ok(Self { interfaces: bound, specs, group, port })
    }

    /// Receive handles for the scheduler's per-interface receive loop:
    /// `(interface name, socket)`. One task per entry reads datagrams and
    /// feeds them to [`alfred_core::on_frame`].
    pub fn receive_handles(&self) -> Vec<(String, Arc<UdpSocket>)> {
        self.interfaces.iter().map(|(name, bound)| (name.clone(), Arc::clone(&bound.socket))).collect()
    }

    /// Attempts to re-bind every interface that was invalidated by a prior
    /// `PermissionDenied` send, per §7 ("the scheduler will re-open on the
    /// next tick"). Returns the interfaces that were successfully re-bound
    /// so the caller can spawn a fresh receive task for each.
    pub fn revalidate(&mut self) -> Vec<(String, Arc<UdpSocket>)> {
        let mut reopened = Vec::new();
        let missing: Vec<String> =
            self.specs.keys().filter(|name| !self.interfaces.contains_key(*name)).cloned().collect();
        for name in missing {
            let spec = &self.specs[&name];
            match bind_and_wrap(spec, self.group, self.port) {
                Ok(tokio_socket) => {
                    let socket = Arc::new(tokio_socket);
                    self.interfaces
                        .insert(name.clone(), BoundInterface { socket: Arc::clone(&socket), scope_id: spec.scope_id });
                    reopened.push((name, socket));
                },
                Err(error) => {
                    tracing::warn!(interface = %name, %error, "revalidate: socket still cannot be bound");
                },
            }
        }
        reopened
    }
}

fn bind_and_wrap(spec: &InterfaceSpec, group: IpAddr, port: u16) -> Result<UdpSocket, DaemonError> {
    let socket = bind_one(spec, group, port)?;
    socket.set_nonblocking(true)?;
    let std_socket: std::net::UdpSocket = socket.into();
    Ok(UdpSocket::from_std(std_socket)?)
}

fn bind_one(spec: &InterfaceSpec, group: IpAddr, port: u16) -> Result<Socket, DaemonError> {
    match (spec.bind_addr, group) {
        (IpAddr::V4(bind_v4), IpAddr::V4(group_v4)) => {
            let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
            socket.set_reuse_address(true)?;
            socket.bind(&SocketAddrV4::new(group_v4, port).into())?;
            socket.join_multicast_v4(&group_v4, &bind_v4)?;
            Ok(socket)
        },
        (IpAddr::V6(_), IpAddr::V6(group_v6)) => {
            let scope_id = spec.scope_id.ok_or_else(|| {
                DaemonError::Config(format!(
                    "interface '{}' needs a scope id for IPv6 multicast (name@addr@scope_id)",
                    spec.name
                ))
            })?;
            let socket = Socket::new(Domain::IPV6, Type::DGRAM, Some(Protocol::UDP))?;
            socket.set_only_v6(true)?;
            socket.set_reuse_address(true)?;
            socket.bind(&SocketAddrV6::new(group_v6, port, 0, scope_id).into())?;
            socket.join_multicast_v6(&group_v6, scope_id)?;
            Ok(socket)
        },
        _ => Err(DaemonError::Config(format!(
            "interface '{}' bind address family does not match the multicast group's",
            spec.name
        ))),
    }
}

impl FrameTransport for MulticastTransport {
    fn send_frame(&mut self, interface: &str, dest: IpAddr, bytes: &[u8]) -> bool {
        let Some(bound) = self.interfaces.get(interface) else {
            tracing::warn!(interface, "send_frame: no socket bound for this interface");
            return false;
        };
        let target = match dest {
            IpAddr::V4(v4) => SocketAddr::V4(SocketAddrV4::new(v4, self.port)),
            IpAddr::V6(v6) => {
                SocketAddr::V6(SocketAddrV6::new(v6, self.port, 0, bound.scope_id.unwrap_or(0)))
            },
        };
        match bound.socket.try_send_to(bytes, target) {
            Ok(_) => true,
            Err(error) if error.kind() == std::io::ErrorKind::PermissionDenied => {
                tracing::warn!(interface, %target, %error, "send permission denied, closing socket for recreation");
                self.interfaces.remove(interface);
                false
            },
            Err(error) => {
                tracing::debug!(interface, %target, %error, "send_frame failed");
                false
            },
        }
    }
}
