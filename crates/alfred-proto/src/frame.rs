//! Whole-frame encode/decode: header plus opaque body bytes.
//!
//! [`Frame`] only deals in raw body bytes; interpreting those bytes according
//! to the header's frame type is [`crate::body::Body`]'s job. Keeping the two
//! separate means a caller can reject or route a frame by type before paying
//! for body parsing.

use bytes::{BufMut, Bytes};

use crate::errors::{ProtocolError, Result};
use crate::header::FrameHeader;

/// A decoded header paired with its still-opaque body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// The fixed 4-byte header.
    pub header: FrameHeader,
    /// Body bytes, exactly `header.length()` long.
    pub body: Bytes,
}

impl Frame {
    /// Builds a frame from a frame type and body, computing the header's
    /// length field from the body.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::PayloadTooLarge`] if `body` does not fit in
    /// the 16-bit length field.
    pub fn new(frame_type: u8, body: Bytes) -> Result<Self> {
        let header = FrameHeader::new(frame_type, body.len())?;
        Ok(Self { header, body })
    }

    /// Appends the frame's wire form (header then body) to `dst`.
    pub fn encode(&self, dst: &mut impl BufMut) {
        dst.put_slice(&self.header.to_bytes());
        dst.put_slice(&self.body);
    }

    /// Parses a header and its body from `bytes`.
    ///
    /// # Errors
    ///
    /// Propagates [`ProtocolError::HeaderTruncated`] /
    /// [`ProtocolError::UnsupportedVersion`] from header parsing, and
    /// returns [`ProtocolError::FrameTruncated`] if fewer bytes than the
    /// header's declared length are available.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let header = FrameHeader::parse(bytes)?;
        let body_len = usize::from(header.length());
        let total = FrameHeader::SIZE + body_len;
        let Some(body_bytes) = bytes.get(FrameHeader::SIZE..total) else {
            return Err(ProtocolError::FrameTruncated { expected: total, actual: bytes.len() });
        };
        Ok(Self { header, body: Bytes::copy_from_slice(body_bytes) })
    }
}

#[cfg(test)]
mod tests {
    use bytes::{Bytes, BytesMut};
    use proptest::prelude::*;

    use super::Frame;
    use crate::errors::ProtocolError;
    use crate::header::FrameHeader;

    #[test]
    fn round_trips_empty_body() {
        let frame = Frame::new(1, Bytes::new()).expect("empty body fits");
        let mut buf = BytesMut::new();
        frame.encode(&mut buf);
        assert_eq!(Frame::decode(&buf).expect("valid frame"), frame);
    }

    #[test]
    fn round_trips_nonempty_body() {
        let frame = Frame::new(0, Bytes::from_static(b"abcdef")).expect("fits");
        let mut buf = BytesMut::new();
        frame.encode(&mut buf);
        assert_eq!(Frame::decode(&buf).expect("valid frame"), frame);
    }

    #[test]
    fn rejects_truncated_body() {
        let frame = Frame::new(3, Bytes::from_static(b"0123456789")).expect("fits");
        let mut buf = BytesMut::new();
        frame.encode(&mut buf);
        buf.truncate(buf.len() - 3);
        let err = Frame::decode(&buf).unwrap_err();
        assert_eq!(
            err,
            ProtocolError::FrameTruncated { expected: FrameHeader::SIZE + 10, actual: buf.len() }
        );
    }

    proptest! {
        #[test]
        fn frame_round_trip(frame_type: u8, body in proptest::collection::vec(any::<u8>(), 0..512)) {
            let frame = Frame::new(frame_type, Bytes::from(body)).expect("body under u16::MAX");
            let mut buf = BytesMut::new();
            frame.encode(&mut buf);
            prop_assert_eq!(Frame::decode(&buf).expect("valid frame"), frame);
        }
    }
}
