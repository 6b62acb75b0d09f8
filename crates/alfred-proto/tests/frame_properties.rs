//! Property-based tests for Body/Frame encoding and decoding.
//!
//! These verify round-trip correctness across the full range of inputs, not
//! just hand-picked examples.

use alfred_proto::{Body, DatasetRecord, Frame, FrameHeader, MacAddr};
use bytes::Bytes;
use proptest::prelude::*;

fn arbitrary_mac() -> impl Strategy<Value = MacAddr> {
    any::<[u8; 6]>().prop_map(MacAddr::new)
}

fn arbitrary_record() -> impl Strategy<Value = DatasetRecord> {
    (arbitrary_mac(), any::<u8>(), any::<u8>(), prop::collection::vec(any::<u8>(), 0..64)).prop_map(
        |(source_mac, record_type, version, payload)| DatasetRecord {
            source_mac,
            record_type,
            version,
            payload: Bytes::from(payload),
        },
    )
}

fn arbitrary_body() -> impl Strategy<Value = Body> {
    prop_oneof![
        (any::<u16>(), any::<u16>(), prop::collection::vec(arbitrary_record(), 0..8))
            .prop_map(|(tx_id, seqno, records)| Body::PushData { tx_id, seqno, records }),
        Just(Body::AnnounceMaster),
        (any::<u8>(), any::<u16>())
            .prop_map(|(requested_type, tx_id)| Body::Request { requested_type, tx_id }),
        (any::<u16>(), any::<u16>()).prop_map(|(tx_id, seqno)| Body::StatusTxEnd { tx_id, seqno }),
    ]
}

proptest! {
    #[test]
    fn body_round_trip(body in arbitrary_body()) {
        let frame = body.clone().into_frame().expect("generated bodies fit a u16 length");
        let decoded = Body::from_frame(&frame).expect("decodes").expect("known frame type");
        prop_assert_eq!(decoded, body);
    }

    #[test]
    fn frame_encode_decode_preserves_header_and_body(frame_type: u8, body in prop::collection::vec(any::<u8>(), 0..256)) {
        let frame = Frame::new(frame_type, Bytes::from(body)).expect("body under u16::MAX");
        let mut buf = Vec::new();
        frame.encode(&mut buf);
        let decoded = Frame::decode(&buf).expect("well-formed frame");
        prop_assert_eq!(decoded.header, frame.header);
        prop_assert_eq!(decoded.body, frame.body);
    }

    #[test]
    fn encoded_frame_size_matches_header_plus_body(frame_type: u8, body in prop::collection::vec(any::<u8>(), 0..256)) {
        let frame = Frame::new(frame_type, Bytes::from(body)).expect("fits");
        let mut buf = Vec::new();
        frame.encode(&mut buf);
        prop_assert_eq!(buf.len(), FrameHeader::SIZE + frame.body.len());
    }

    #[test]
    fn record_round_trip(record in arbitrary_record()) {
        let mut buf = bytes::BytesMut::new();
        record.encode(&mut buf).expect("generated payload under u16::MAX");
        let decoded = DatasetRecord::decode_all(buf.freeze());
        prop_assert_eq!(decoded, vec![record]);
    }
}
