//! Transmitters: assemble outbound `PUSH_DATA` streams from the cache with
//! payload-size fragmentation, and emit `ANNOUNCE_MASTER`/`STATUS_TXEND`
//! (§4.6).

use std::net::IpAddr;

use alfred_proto::{Body, DatasetRecord, MAX_PAYLOAD, NO_FILTER};

use crate::context::Context;
use crate::dataset::Dataset;
use crate::env::Environment;
use crate::provenance::DataSource;
use crate::transport::FrameTransport;

/// Bytes of framing overhead a `PUSH_DATA` packet pays beyond its records:
/// the 4-byte frame header plus the 4-byte `tx_id`/`seqno` pair.
const PUSH_HEADER_SIZE: usize = 4 + 4;

fn send(transport: &mut impl FrameTransport, interface: &str, destination: IpAddr, body: Body) {
    match body.into_frame() {
        Ok(frame) => {
            let mut buf = Vec::with_capacity(alfred_proto::FrameHeader::SIZE + frame.body.len());
            frame.encode(&mut buf);
            if !transport.send_frame(interface, destination, &buf) {
                tracing::warn!(interface, %destination, "send_frame failed");
            }
        },
        Err(error) => {
            // Can only happen if a single body's fields overflow a u16
            // length, which the fragmentation loop below prevents.
            tracing::warn!(interface, %destination, %error, "failed to encode outbound frame");
        },
    }
}

/// Builds a multi-packet `PUSH_DATA` stream from the cache and sends it to
/// `destination` on `interface`, followed by a `STATUS_TXEND` terminator
/// where required (§4.6). Returns the number of `PUSH_DATA` packets sent.
pub fn push<E: Environment>(
    ctx: &mut Context<E>,
    transport: &mut impl FrameTransport,
    interface: &str,
    destination: IpAddr,
    max_source_level: DataSource,
    type_filter: i16,
    tx_id: u16,
) -> u16 {
    let mut candidates: Vec<Dataset<E::Instant>> = ctx
        .cache
        .iterate()
        .filter(|entry| entry.data_source <= max_source_level)
        .filter(|entry| type_filter == NO_FILTER || i16::from(entry.record_type) == type_filter)
        .cloned()
        .collect();
    candidates.sort_by_key(|entry| (entry.source_mac, entry.record_type));

    let budget = MAX_PAYLOAD.saturating_sub(PUSH_HEADER_SIZE);
    let mut seqno: u16 = 0;
    let mut current: Vec<DatasetRecord> = Vec::new();
    let mut current_size = 0usize;

    for entry in candidates {
        let record = DatasetRecord {
            source_mac: entry.source_mac,
            record_type: entry.record_type,
            version: entry.version,
            payload: entry.payload,
        };
        let encoded_len = record.encoded_len();

        if encoded_len > budget {
            ctx.diagnostics.oversized_record_skips += 1;
            tracing::warn!(
                source_mac = %record.source_mac,
                record_type = record.record_type,
                len = encoded_len,
                "dataset record too large for any packet, skipping"
            );
            continue;
        }

        if current_size + encoded_len > budget && !current.is_empty() {
            send(transport, interface, destination, Body::PushData { tx_id, seqno, records: std::mem::take(&mut current) });
            seqno += 1;
            current_size = 0;
        }
        current_size += encoded_len;
        current.push(record);
    }

    if !current.is_empty() {
        send(transport, interface, destination, Body::PushData { tx_id, seqno, records: current });
        seqno += 1;
    }

    let total_packets_sent = seqno;
    if total_packets_sent > 0 || type_filter != NO_FILTER {
        send(transport, interface, destination, Body::StatusTxEnd { tx_id, seqno: total_packets_sent });
    }
    total_packets_sent
}

/// Sends one empty `ANNOUNCE_MASTER` frame to the multicast group on every
/// interface (§4.6). Driven periodically by the scheduler, not owned here.
pub fn announce_master<E: Environment>(ctx: &mut Context<E>, transport: &mut impl FrameTransport) {
    let group = ctx.multicast_group;
    let interfaces: Vec<String> = ctx.interfaces.keys().cloned().collect();
    for interface in interfaces {
        send(transport, &interface, group, Body::AnnounceMaster);
    }
}

/// For every known peer on every interface, pushes the full cache (up to
/// `FirstHand` provenance) under a fresh random `tx_id` (§4.6). Random
/// `tx_id`s avoid colliding with concurrent peer-originated transactions.
pub fn sync_data<E: Environment>(ctx: &mut Context<E>, transport: &mut impl FrameTransport) {
    let targets: Vec<(String, IpAddr)> = ctx
        .interfaces
        .iter()
        .flat_map(|(name, iface)| iface.peers.iterate().map(move |peer| (name.clone(), peer.address)))
        .collect();
    for (interface, destination) in targets {
        let tx_id = ctx.env.random_u16();
        push(ctx, transport, &interface, destination, DataSource::FirstHand, NO_FILTER, tx_id);
    }
}

/// Pushes only our LOCAL data to the best known server, on every interface
/// (§4.6). Returns `false` with no effect if no best server is set.
pub fn push_local_data<E: Environment>(ctx: &mut Context<E>, transport: &mut impl FrameTransport) -> bool {
    let Some((server_interface, hwaddr)) = ctx.best_server.clone() else {
        return false;
    };
    let Some(destination) =
        ctx.interfaces.get(&server_interface).and_then(|iface| iface.peers.get(&hwaddr)).map(|peer| peer.address)
    else {
        return false;
    };

    let interfaces: Vec<String> = ctx.interfaces.keys().cloned().collect();
    for interface in interfaces {
        let tx_id = ctx.env.random_u16();
        push(ctx, transport, &interface, destination, DataSource::Local, NO_FILTER, tx_id);
    }
    true
}

/// Decodes a sent frame back into a `(FrameType, Body)` pair; used by tests
/// asserting on transmitter output captured by `RecordingTransport`.
#[cfg(test)]
pub(crate) fn decode_sent(bytes: &[u8]) -> (alfred_proto::FrameType, Body) {
    use alfred_proto::{Frame, FrameType};
    let frame = Frame::decode(bytes).expect("valid frame");
    let frame_type = FrameType::from_u8(frame.header.frame_type()).expect("known type");
    let body = Body::decode(frame_type, frame.body.clone()).expect("decodes");
    (frame_type, body)
}

#[cfg(test)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr};

    use alfred_proto::{Body, MacAddr, FrameType, NO_FILTER};
    use bytes::Bytes;

    use super::{announce_master, push, push_local_data, sync_data, decode_sent};
    use crate::context::{Context, InterfaceState, OpMode};
    use crate::env::sim::SimEnv;
    use crate::env::Environment;
    use crate::provenance::DataSource;
    use crate::transport::RecordingTransport;

    fn mcast() -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(224, 0, 0, 1))
    }

    fn dest() -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2))
    }

    fn ctx_with_one_local_record() -> Context<SimEnv> {
        let env = SimEnv::new();
        let mut ctx: Context<SimEnv> = Context::new(OpMode::Master, true, mcast(), env);
        ctx.add_interface(InterfaceState::new("bat0", vec![], None));
        ctx.cache.upsert_local(MacAddr::new([0xaa; 6]), 64, 1, Bytes::from_static(b"hello"), ctx.env.now());
        ctx
    }

    #[test]
    fn single_record_sync_emits_one_packet_and_txend_with_matching_seqno() {
        let mut ctx = ctx_with_one_local_record();
        let mut transport = RecordingTransport::new();
        let sent = push(&mut ctx, &mut transport, "bat0", dest(), DataSource::Synced, NO_FILTER, 5);
        assert_eq!(sent, 1);
        assert_eq!(transport.sent.len(), 2);

        let (frame_type, body) = decode_sent(&transport.sent[0].2);
        assert_eq!(frame_type, FrameType::PushData);
        assert!(matches!(body, Body::PushData { tx_id: 5, seqno: 0, .. }));

        let (frame_type, body) = decode_sent(&transport.sent[1].2);
        assert_eq!(frame_type, FrameType::StatusTxEnd);
        assert_eq!(body, Body::StatusTxEnd { tx_id: 5, seqno: 1 });
    }

    #[test]
    fn empty_push_without_filter_sends_no_txend() {
        let env = SimEnv::new();
        let mut ctx: Context<SimEnv> = Context::new(OpMode::Master, true, mcast(), env);
        ctx.add_interface(InterfaceState::new("bat0", vec![], None));
        let mut transport = RecordingTransport::new();
        let sent = push(&mut ctx, &mut transport, "bat0", dest(), DataSource::Synced, NO_FILTER, 1);
        assert_eq!(sent, 0);
        assert!(transport.sent.is_empty());
    }

    #[test]
    fn empty_filtered_request_still_sends_a_txend() {
        let env = SimEnv::new();
        let mut ctx: Context<SimEnv> = Context::new(OpMode::Master, true, mcast(), env);
        ctx.add_interface(InterfaceState::new("bat0", vec![], None));
        let mut transport = RecordingTransport::new();
        let sent = push(&mut ctx, &mut transport, "bat0", dest(), DataSource::Synced, 66, 42);
        assert_eq!(sent, 0);
        assert_eq!(transport.sent.len(), 1);
        let (frame_type, body) = decode_sent(&transport.sent[0].2);
        assert_eq!(frame_type, FrameType::StatusTxEnd);
        assert_eq!(body, Body::StatusTxEnd { tx_id: 42, seqno: 0 });
    }

    #[test]
    fn max_source_level_filters_out_less_trusted_entries() {
        let mut ctx = ctx_with_one_local_record();
        // A FIRST_HAND-only filter should still include our own LOCAL data
        // (LOCAL=0 <= FIRST_HAND=1).
        let mut transport = RecordingTransport::new();
        push(&mut ctx, &mut transport, "bat0", dest(), DataSource::FirstHand, NO_FILTER, 1);
        assert_eq!(transport.sent.len(), 2);

        ctx.cache.upsert_remote(
            MacAddr::new([0xbb; 6]),
            64,
            1,
            Bytes::from_static(b"relayed"),
            MacAddr::new([0xcc; 6]),
            ctx.env.now(),
        );
        let mut transport = RecordingTransport::new();
        let sent = push(&mut ctx, &mut transport, "bat0", dest(), DataSource::FirstHand, NO_FILTER, 2);
        // Only the LOCAL record qualifies; the SYNCED one is filtered out.
        assert_eq!(sent, 1);
    }

    #[test]
    fn fragments_across_multiple_packets_when_budget_is_exceeded() {
        let env = SimEnv::new();
        let mut ctx: Context<SimEnv> = Context::new(OpMode::Master, true, mcast(), env);
        ctx.add_interface(InterfaceState::new("bat0", vec![], None));
        let now = ctx.env.now();
        for i in 0..200u16 {
            let mac = [(i >> 8) as u8, i as u8, 0, 0, 0, 0];
            ctx.cache.upsert_local(MacAddr::new(mac), 1, 1, Bytes::from(vec![0u8; 512]), now);
        }
        let mut transport = RecordingTransport::new();
        let sent = push(&mut ctx, &mut transport, "bat0", dest(), DataSource::Local, NO_FILTER, 9);

        let record_size = 10 + 512; // DatasetRecord::HEADER_SIZE + payload
        let budget = alfred_proto::MAX_PAYLOAD - 8;
        let expected_packets = (200 * record_size).div_ceil(budget);
        assert_eq!(sent as usize, expected_packets);
        assert_eq!(transport.sent.len(), expected_packets + 1); // + STATUS_TXEND

        let mut reassembled = std::collections::HashSet::new();
        for (_, _, bytes) in &transport.sent[..expected_packets] {
            let (_, body) = decode_sent(bytes);
            if let Body::PushData { records, .. } = body {
                for record in records {
                    reassembled.insert(record.source_mac);
                }
            }
        }
        assert_eq!(reassembled.len(), 200);
    }

    #[test]
    fn oversized_record_is_skipped_and_counted() {
        let env = SimEnv::new();
        let mut ctx: Context<SimEnv> = Context::new(OpMode::Master, true, mcast(), env);
        ctx.add_interface(InterfaceState::new("bat0", vec![], None));
        let now = ctx.env.now();
        ctx.cache.upsert_local(MacAddr::new([1; 6]), 1, 1, Bytes::from(vec![0u8; 2000]), now);
        let mut transport = RecordingTransport::new();
        let sent = push(&mut ctx, &mut transport, "bat0", dest(), DataSource::Local, NO_FILTER, 1);
        assert_eq!(sent, 0);
        assert_eq!(ctx.diagnostics.oversized_record_skips, 1);
    }

    #[test]
    fn announce_master_sends_one_empty_frame_per_interface() {
        let env = SimEnv::new();
        let mut ctx: Context<SimEnv> = Context::new(OpMode::Master, true, mcast(), env);
        ctx.add_interface(InterfaceState::new("bat0", vec![], None));
        ctx.add_interface(InterfaceState::new("bat1", vec![], None));
        let mut transport = RecordingTransport::new();
        announce_master(&mut ctx, &mut transport);
        assert_eq!(transport.sent.len(), 2);
        for (_, dest, bytes) in &transport.sent {
            assert_eq!(*dest, mcast());
            let (frame_type, body) = decode_sent(bytes);
            assert_eq!(frame_type, FrameType::AnnounceMaster);
            assert_eq!(body, Body::AnnounceMaster);
        }
    }

    #[test]
    fn sync_data_pushes_to_every_known_peer() {
        let mut ctx = ctx_with_one_local_record();
        let peer_mac = MacAddr::new([0x01; 6]);
        ctx.interfaces.get_mut("bat0").unwrap().peers.on_announce(peer_mac, dest(), ctx.env.now());
        let mut transport = RecordingTransport::new();
        sync_data(&mut ctx, &mut transport);
        assert_eq!(transport.sent.len(), 2); // one PUSH_DATA + one STATUS_TXEND
        assert!(transport.sent.iter().all(|(_, d, _)| *d == dest()));
    }

    #[test]
    fn push_local_data_is_a_noop_without_a_best_server() {
        let mut ctx = ctx_with_one_local_record();
        let mut transport = RecordingTransport::new();
        assert!(!push_local_data(&mut ctx, &mut transport));
        assert!(transport.sent.is_empty());
    }

    #[test]
    fn push_local_data_targets_the_best_server() {
        let mut ctx = ctx_with_one_local_record();
        let peer_mac = MacAddr::new([0x02; 6]);
        ctx.interfaces.get_mut("bat0").unwrap().peers.on_announce(peer_mac, dest(), ctx.env.now());
        ctx.best_server = Some(("bat0".to_string(), peer_mac));

        let mut transport = RecordingTransport::new();
        assert!(push_local_data(&mut ctx, &mut transport));
        assert!(!transport.sent.is_empty());
        assert!(transport.sent.iter().all(|(_, d, _)| *d == dest()));
    }
}
