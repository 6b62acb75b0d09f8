//! Protocol dispatcher: the single entry point for inbound frames (§4.5).

use std::net::IpAddr;

use alfred_proto::{Body, Frame, FrameType, MAX_PAYLOAD};

use crate::context::{ChangeListener, ClientFinish, Context};
use crate::env::Environment;
use crate::error::CoreError;
use crate::provenance::DataSource;
use crate::resolve::{is_eui64_link_local, resolve_mac, MeshTableResolver};
use crate::transaction::{PushOutcome, TxEndOutcome};
use crate::transmit;
use crate::transport::FrameTransport;

/// Runs the sender-address checks of §4.5 rules 1-2, ahead of any decoding.
fn check_sender(ctx: &Context<impl Environment>, sender_ip: IpAddr) -> Result<(), CoreError> {
    if ctx.is_own_address(sender_ip) {
        return Err(CoreError::OwnAddress);
    }
    if let IpAddr::V6(v6) = sender_ip {
        if !is_eui64_link_local(&v6) {
            return Err(CoreError::NotEui64LinkLocal);
        }
    }
    Ok(())
}

/// Decodes a header and body from raw bytes, folding every failure mode into
/// [`CoreError`] so the caller has a single thing to log (§7).
fn decode_frame(bytes: &[u8]) -> Result<(FrameType, Body), CoreError> {
    if bytes.len() > MAX_PAYLOAD {
        return Err(CoreError::OversizedDatagram { size: bytes.len(), max: MAX_PAYLOAD });
    }
    let frame = Frame::decode(bytes)?;
    let frame_type =
        FrameType::from_u8(frame.header.frame_type()).ok_or(CoreError::UnknownFrameType(frame.header.frame_type()))?;
    let body = Body::decode(frame_type, frame.body)?;
    Ok((frame_type, body))
}

/// Receives one datagram's worth of bytes from `interface`, sent by
/// `sender_ip`, and routes it through validation, decoding, and the
/// per-frame-type handler (§4.5).
///
/// Returns `true` if the frame was accepted and processed, `false` if it was
/// dropped at any stage — the core's entire public boundary is this boolean
/// (§7); internal call sites log a precise reason before collapsing to it.
#[allow(clippy::too_many_arguments)]
pub fn on_frame<E: Environment>(
    ctx: &mut Context<E>,
    transport: &mut impl FrameTransport,
    resolver: &dyn MeshTableResolver,
    listener: &mut dyn ChangeListener,
    client_finish: &mut dyn ClientFinish<E::Instant>,
    interface: &str,
    sender_ip: IpAddr,
    bytes: &[u8],
) -> bool {
    if let Err(error) = check_sender(ctx, sender_ip) {
        match error {
            CoreError::OwnAddress => ctx.diagnostics.own_address_filtered += 1,
            _ => ctx.diagnostics.malformed_frames += 1,
        }
        tracing::trace!(interface, %sender_ip, %error, "dropping frame");
        return false;
    }

    let (_frame_type, body) = match decode_frame(bytes) {
        Ok(decoded) => decoded,
        Err(error) => {
            ctx.diagnostics.malformed_frames += 1;
            tracing::trace!(interface, %sender_ip, %error, "dropping frame");
            return false;
        },
    };

    match body {
        Body::AnnounceMaster => handle_announce(ctx, resolver, interface, sender_ip),
        Body::Request { requested_type, tx_id } => {
            handle_request(ctx, transport, interface, sender_ip, requested_type, tx_id)
        },
        Body::PushData { tx_id, seqno, records } => handle_push_data(
            ctx, resolver, listener, client_finish, interface, sender_ip, tx_id, seqno, records,
        ),
        Body::StatusTxEnd { tx_id, seqno } => {
            handle_status_txend(ctx, resolver, listener, client_finish, interface, sender_ip, tx_id, seqno)
        },
        Body::StatusError(_) => {
            ctx.diagnostics.malformed_frames += 1;
            false
        },
    }
}

fn handle_announce<E: Environment>(
    ctx: &mut Context<E>,
    resolver: &dyn MeshTableResolver,
    interface: &str,
    sender_ip: IpAddr,
) -> bool {
    let Some(sender_mac) = resolve_mac(interface, sender_ip, resolver) else {
        ctx.diagnostics.unresolved_mac += 1;
        let error = CoreError::UnresolvedMac;
        tracing::trace!(interface, %sender_ip, %error, "dropping announce");
        return false;
    };
    let now = ctx.env.now();
    let Some(iface) = ctx.interfaces.get_mut(interface) else {
        return false;
    };
    iface.peers.on_announce(sender_mac, sender_ip, now);
    tracing::debug!(interface, %sender_mac, "peer announced master role");
    true
}

fn handle_request<E: Environment>(
    ctx: &mut Context<E>,
    transport: &mut impl FrameTransport,
    interface: &str,
    sender_ip: IpAddr,
    requested_type: u8,
    tx_id: u16,
) -> bool {
    transmit::push(ctx, transport, interface, sender_ip, DataSource::Synced, i16::from(requested_type), tx_id);
    tracing::debug!(interface, %sender_ip, requested_type, tx_id, "served request");
    true
}

#[allow(clippy::too_many_arguments)]
fn handle_push_data<E: Environment>(
    ctx: &mut Context<E>,
    resolver: &dyn MeshTableResolver,
    listener: &mut dyn ChangeListener,
    client_finish: &mut dyn ClientFinish<E::Instant>,
    interface: &str,
    sender_ip: IpAddr,
    tx_id: u16,
    seqno: u16,
    records: Vec<alfred_proto::DatasetRecord>,
) -> bool {
    let Some(peer_mac) = resolve_mac(interface, sender_ip, resolver) else {
        ctx.diagnostics.unresolved_mac += 1;
        let error = CoreError::UnresolvedMac;
        tracing::trace!(interface, %sender_ip, %error, "dropping push_data");
        return false;
    };
    let now = ctx.env.now();
    let (outcome, completed) = ctx.transactions.on_push_data(peer_mac, tx_id, seqno, records, ctx.opmode, now);

    match outcome {
        PushOutcome::RoleViolation => {
            ctx.diagnostics.role_violations += 1;
            let error = CoreError::RoleViolation("push_data for an unknown transaction on a non-master");
            tracing::trace!(interface, %peer_mac, tx_id, %error, "dropping push_data");
            return false;
        },
        PushOutcome::DuplicateSeqno => {
            tracing::trace!(interface, %peer_mac, tx_id, seqno, "dropping duplicate push_data seqno");
        },
        PushOutcome::Buffered => {},
    }

    if let Some(transaction) = completed {
        finish_transaction(ctx, listener, client_finish, peer_mac, transaction);
    }
    true
}

#[allow(clippy::too_many_arguments)]
fn handle_status_txend<E: Environment>(
    ctx: &mut Context<E>,
    resolver: &dyn MeshTableResolver,
    listener: &mut dyn ChangeListener,
    client_finish: &mut dyn ClientFinish<E::Instant>,
    interface: &str,
    sender_ip: IpAddr,
    tx_id: u16,
    seqno: u16,
) -> bool {
    let Some(peer_mac) = resolve_mac(interface, sender_ip, resolver) else {
        ctx.diagnostics.unresolved_mac += 1;
        let error = CoreError::UnresolvedMac;
        tracing::trace!(interface, %sender_ip, %error, "dropping status_txend");
        return false;
    };
    let now = ctx.env.now();
    let (outcome, completed) = ctx.transactions.on_status_txend(peer_mac, tx_id, seqno, ctx.opmode, now);

    match outcome {
        TxEndOutcome::RoleViolation => {
            ctx.diagnostics.role_violations += 1;
            let error = CoreError::RoleViolation("status_txend for an unknown transaction on a non-master");
            tracing::trace!(interface, %peer_mac, tx_id, %error, "dropping status_txend");
            return false;
        },
        TxEndOutcome::UnknownZeroPacket => {
            tracing::trace!(interface, %peer_mac, tx_id, "ignoring zero-packet status_txend for unknown transaction");
            return true;
        },
        TxEndOutcome::Recorded => {},
    }

    if let Some(transaction) = completed {
        finish_transaction(ctx, listener, client_finish, peer_mac, transaction);
    }
    true
}

/// `try_finish`'s apply-and-close step (§4.4): applies every buffered
/// record, in arrival order, to the dataset cache, then notifies the
/// IPC layer if a client was waiting.
fn finish_transaction<E: Environment>(
    ctx: &mut Context<E>,
    listener: &mut dyn ChangeListener,
    client_finish: &mut dyn ClientFinish<E::Instant>,
    peer_mac: alfred_proto::MacAddr,
    transaction: crate::transaction::Transaction<E::Instant>,
) {
    let now = ctx.env.now();
    // Arrival order, not seqno order — preserved intentionally (§5, §9).
    for record in transaction.records_in_arrival_order() {
        let changed = ctx.cache.upsert_remote(
            record.source_mac,
            record.record_type,
            record.version,
            record.payload.clone(),
            peer_mac,
            now,
        );
        if changed {
            listener.changed_data_type(record.record_type);
        }
    }
    tracing::debug!(%peer_mac, tx_id = transaction.tx_id, records = transaction.packets.len(), "transaction complete");

    let has_client = transaction.client_token.is_some();
    if has_client {
        client_finish.client_request_finish(transaction);
    }
}
