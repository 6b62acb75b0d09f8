//! Local client layer (ambient, §4.10): the slave-side pull path a local
//! client (e.g. a CLI query tool) drives through this crate. Binds a
//! [`ClientToken`] to a transaction at request time, then records the
//! finished transaction for retrieval by that token — not a full stream-
//! socket wire protocol, which is out of scope per §1.

use std::collections::HashMap;
use std::net::IpAddr;

use alfred_core::{ClientFinish, ClientToken, Context, Environment, FrameTransport, Transaction};
use alfred_proto::{Body, MacAddr};

/// Binds client tokens to finished transactions. One instance is shared by
/// the scheduler (as the [`ClientFinish`] hook) and local request callers.
#[derive(Debug)]
pub struct ClientRegistry<Instant> {
    next_token: u64,
    finished: HashMap<ClientToken, Transaction<Instant>>,
}

impl<Instant> Default for ClientRegistry<Instant> {
    fn default() -> Self {
        Self { next_token: 0, finished: HashMap::new() }
    }
}

impl<Instant> ClientRegistry<Instant> {
    /// Builds an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn mint_token(&mut self) -> ClientToken {
        let token = ClientToken(self.next_token);
        self.next_token += 1;
        token
    }

    /// Takes the finished transaction bound to `token`, if it has completed.
    pub fn take_finished(&mut self, token: ClientToken) -> Option<Transaction<Instant>> {
        self.finished.remove(&token)
    }
}

impl<Instant> ClientFinish<Instant> for ClientRegistry<Instant> {
    fn client_request_finish(&mut self, transaction: Transaction<Instant>) {
        if let Some(token) = transaction.client_token {
            self.finished.insert(token, transaction);
        }
    }
}

/// Issues a pull request on behalf of a local client: mints a token, binds
/// it to a fresh transaction keyed by `(peer_mac, tx_id)`, and sends the
/// `REQUEST` frame to the peer. The caller polls
/// [`ClientRegistry::take_finished`] with the returned token once the
/// requested data type has been announced via [`ChangeListener`], or after
/// its own timeout.
pub fn request<E: Environment>(
    ctx: &mut Context<E>,
    transport: &mut impl FrameTransport,
    registry: &mut ClientRegistry<E::Instant>,
    interface: &str,
    peer_mac: MacAddr,
    peer_addr: IpAddr,
    requested_type: u8,
) -> ClientToken {
    let tx_id = ctx.env.random_u16();
    let token = registry.mint_token();
    let now = ctx.env.now();
    ctx.transactions.register_client_request(peer_mac, tx_id, i16::from(requested_type), token, now);
    send_request(transport, interface, peer_addr, requested_type, tx_id);
    token
}

fn send_request(transport: &mut impl FrameTransport, interface: &str, destination: IpAddr, requested_type: u8, tx_id: u16) {
    let body = Body::Request { requested_type, tx_id };
    match body.into_frame() {
        Ok(frame) => {
            let mut buf = Vec::with_capacity(alfred_proto::FrameHeader::SIZE + frame.body.len());
            frame.encode(&mut buf);
            if !transport.send_frame(interface, destination, &buf) {
                tracing::warn!(interface, %destination, "send_frame failed for client request");
            }
        },
        Err(error) => {
            tracing::warn!(interface, %destination, %error, "failed to encode client request frame");
        },
    }
}

#[cfg(test)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr};

    use alfred_core::sim::SimEnv;
    use alfred_core::{Context, InterfaceState, OpMode, RecordingTransport};
    use alfred_proto::MacAddr;

    use super::{request, ClientRegistry};

    fn mcast() -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(224, 0, 0, 1))
    }

    #[test]
    fn request_binds_a_token_and_sends_a_frame() {
        let mut ctx: Context<SimEnv> = Context::new(OpMode::Slave, true, mcast(), SimEnv::new());
        ctx.add_interface(InterfaceState::new("bat0", vec![], None));
        let mut transport = RecordingTransport::new();
        let mut registry: ClientRegistry<_> = ClientRegistry::new();
        let peer = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1));

        let token = request(&mut ctx, &mut transport, &mut registry, "bat0", MacAddr::new([1; 6]), peer, 64);

        assert_eq!(transport.sent.len(), 1);
        assert!(registry.take_finished(token).is_none());
        assert_eq!(ctx.transactions.len(), 1);
    }
}
