//! Scheduler (ambient, §4.11, §5): drives `tick_announce`, `tick_sync`,
//! `tick_push_local`, and `tick_sweep` on independent intervals, and
//! dispatches received frames, all against a single [`Context`] owned by
//! one task — the single-threaded cooperative model §5 requires. Per-
//! interface sockets are read by their own tasks, which only forward raw
//! datagrams over a channel; they never touch the context.

use std::net::IpAddr;
use std::sync::Arc;

use alfred_core::{
    announce_master, on_frame, push_local_data, sync_data, ChangeListener, ClientFinish, Context,
    Environment, MeshTableResolver, RetentionTtls,
};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;

use crate::config::TickIntervals;
use crate::transport::MulticastTransport;

/// Receive buffer size: comfortably above `alfred_proto::MAX_PAYLOAD` so a
/// well-formed frame is never truncated by a short read.
const RECV_BUFFER_SIZE: usize = 65_535;

struct Inbound {
    interface: String,
    sender_ip: IpAddr,
    bytes: Vec<u8>,
}

/// Runs the scheduler until every interface's receive task has exited
/// (which normally means the process is shutting down).
#[allow(clippy::too_many_arguments)]
pub async fn run<E, R, L, C>(
    mut ctx: Context<E>,
    mut transport: MulticastTransport,
    resolver: R,
    mut listener: L,
    mut client_finish: C,
    ttls: RetentionTtls,
    tick: TickIntervals,
) where
    E: Environment,
    R: MeshTableResolver,
    L: ChangeListener,
    C: ClientFinish<E::Instant>,
{
    let (tx, mut rx) = mpsc::unbounded_channel::<Inbound>();
    for (interface, socket) in transport.receive_handles() {
        tokio::spawn(receive_loop(interface, socket, tx.clone()));
    }
    drop(tx);

    let mut announce_tick = tokio::time::interval(tick.announce);
    let mut sync_tick = tokio::time::interval(tick.sync);
    let mut push_local_tick = tokio::time::interval(tick.push_local);
    let mut sweep_tick = tokio::time::interval(tick.sweep);

    loop {
        tokio::select! {
            _ = announce_tick.tick() => {
                tracing::debug!("tick_announce");
                announce_master(&mut ctx, &mut transport);
            },
            _ = sync_tick.tick() => {
                tracing::debug!("tick_sync");
                sync_data(&mut ctx, &mut transport);
            },
            _ = push_local_tick.tick() => {
                tracing::debug!("tick_push_local");
                if !push_local_data(&mut ctx, &mut transport) {
                    tracing::trace!("tick_push_local: no best server set, skipping");
                }
            },
            _ = sweep_tick.tick() => {
                tracing::debug!("tick_sweep");
                ctx.sweep(ttls);
                for (interface, socket) in transport.revalidate() {
                    tracing::info!(interface, "socket re-bound after prior permission error");
                    tokio::spawn(receive_loop(interface, socket, tx.clone()));
                }
            },
            inbound = rx.recv() => {
                let Some(inbound) = inbound else {
                    tracing::error!("every interface receive task has ended, stopping scheduler");
                    return;
                };
                on_frame(
                    &mut ctx,
                    &mut transport,
                    &resolver,
                    &mut listener,
                    &mut client_finish,
                    &inbound.interface,
                    inbound.sender_ip,
                    &inbound.bytes,
                );
            },
        }
    }
}

/// Reads datagrams off one interface's socket and forwards them to the
/// scheduler loop. Never touches the context — only the task running
/// [`run`] does.
async fn receive_loop(interface: String, socket: Arc<UdpSocket>, tx: mpsc::UnboundedSender<Inbound>) {
    let mut buf = vec![0u8; RECV_BUFFER_SIZE];
    loop {
        match socket.recv_from(&mut buf).await {
            Ok((len, src)) => {
                let inbound =
                    Inbound { interface: interface.clone(), sender_ip: src.ip(), bytes: buf[..len].to_vec() };
                if tx.send(inbound).is_err() {
                    return;
                }
            },
            Err(error) => {
                tracing::warn!(interface, %error, "recv_from failed");
            },
        }
    }
}
