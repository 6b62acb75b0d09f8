//! Typed interpretation of a frame's body bytes, keyed by [`FrameType`].

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::errors::{ProtocolError, Result};
use crate::frame::Frame;
use crate::opcode::FrameType;
use crate::record::DatasetRecord;

/// Marker for "no type filter" in an internal `push` call (§4.6). Only
/// meaningful to [`crate`]'s own transmitters — the wire `REQUEST` body
/// always carries a concrete `u8` type per §4.1, with no representation for
/// "any type" (a full-cache sync is driven by `sync_data`/`push_local_data`
/// calling `push` directly, never by sending a `REQUEST` to oneself).
pub const NO_FILTER: i16 = -1;

/// A frame body, decoded according to its frame type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    /// `PUSH_DATA`: a transaction id, sequence number, and the records it carries.
    PushData {
        /// Identifies the multi-packet transaction this packet belongs to.
        tx_id: u16,
        /// This packet's position within the transaction.
        seqno: u16,
        /// The dataset records packed into this one wire packet.
        records: Vec<DatasetRecord>,
    },
    /// `ANNOUNCE_MASTER`: always empty.
    AnnounceMaster,
    /// `REQUEST`: ask the receiver to push a given dataset type.
    Request {
        /// Dataset type to request (§4.1: always a concrete `u8`, no wire
        /// representation for "any type").
        requested_type: u8,
        /// Transaction id the requester wants the response tagged with.
        tx_id: u16,
    },
    /// `STATUS_TXEND`: terminates a `PUSH_DATA` stream.
    StatusTxEnd {
        /// Transaction id being terminated.
        tx_id: u16,
        /// Total number of `PUSH_DATA` packets sent under this transaction.
        seqno: u16,
    },
    /// `STATUS_ERROR`: reserved, never emitted by this implementation.
    StatusError(Bytes),
}

impl Body {
    /// The frame type that identifies this body's wire layout.
    #[must_use]
    pub const fn frame_type(&self) -> FrameType {
        match self {
            Self::PushData { .. } => FrameType::PushData,
            Self::AnnounceMaster => FrameType::AnnounceMaster,
            Self::Request { .. } => FrameType::Request,
            Self::StatusTxEnd { .. } => FrameType::StatusTxEnd,
            Self::StatusError(_) => FrameType::StatusError,
        }
    }

    /// Encodes the body to its wire bytes.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::PayloadTooLarge`] if a record or the whole
    /// body does not fit a 16-bit length field.
    pub fn encode(&self, dst: &mut impl BufMut) -> Result<()> {
        match self {
            Self::PushData { tx_id, seqno, records } => {
                dst.put_u16(*tx_id);
                dst.put_u16(*seqno);
                for record in records {
                    record.encode(dst)?;
                }
            },
            Self::AnnounceMaster => {},
            Self::Request { requested_type, tx_id } => {
                dst.put_u8(*requested_type);
                dst.put_u16(*tx_id);
            },
            Self::StatusTxEnd { tx_id, seqno } => {
                dst.put_u16(*tx_id);
                dst.put_u16(*seqno);
            },
            Self::StatusError(bytes) => dst.put_slice(bytes),
        }
        Ok(())
    }

    /// Decodes a body according to `frame_type`.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::BodyTooShort`] if `bytes` is shorter than the
    /// frame type's fixed fields.
    pub fn decode(frame_type: FrameType, bytes: Bytes) -> Result<Self> {
        match frame_type {
            FrameType::PushData => {
                if bytes.len() < 4 {
                    return Err(ProtocolError::BodyTooShort {
                        frame_type: "PUSH_DATA",
                        expected: 4,
                        actual: bytes.len(),
                    });
                }
                let mut header = bytes.slice(0..4);
                let tx_id = header.get_u16();
                let seqno = header.get_u16();
                let records = DatasetRecord::decode_all(bytes.slice(4..));
                Ok(Self::PushData { tx_id, seqno, records })
            },
            FrameType::AnnounceMaster => Ok(Self::AnnounceMaster),
            FrameType::Request => {
                if bytes.len() < 3 {
                    return Err(ProtocolError::BodyTooShort {
                        frame_type: "REQUEST",
                        expected: 3,
                        actual: bytes.len(),
                    });
                }
                let requested_type = bytes[0];
                let tx_id = u16::from_be_bytes([bytes[1], bytes[2]]);
                Ok(Self::Request { requested_type, tx_id })
            },
            FrameType::StatusTxEnd => {
                if bytes.len() < 4 {
                    return Err(ProtocolError::BodyTooShort {
                        frame_type: "STATUS_TXEND",
                        expected: 4,
                        actual: bytes.len(),
                    });
                }
                let tx_id = u16::from_be_bytes([bytes[0], bytes[1]]);
                let seqno = u16::from_be_bytes([bytes[2], bytes[3]]);
                Ok(Self::StatusTxEnd { tx_id, seqno })
            },
            FrameType::StatusError => Ok(Self::StatusError(bytes)),
        }
    }

    /// Encodes this body into a complete [`Frame`].
    ///
    /// # Errors
    ///
    /// See [`Self::encode`].
    pub fn into_frame(self) -> Result<Frame> {
        let mut buf = BytesMut::new();
        self.encode(&mut buf)?;
        Frame::new(self.frame_type() as u8, buf.freeze())
    }

    /// Decodes a body from a frame, given the frame's declared type.
    ///
    /// Frames whose `frame_type` byte does not map to a known [`FrameType`]
    /// are not handled here; per §4.1 those are dropped by the dispatcher,
    /// not rejected by the codec.
    ///
    /// # Errors
    ///
    /// See [`Self::decode`].
    pub fn from_frame(frame: &Frame) -> Result<Option<Self>> {
        let Some(frame_type) = FrameType::from_u8(frame.header.frame_type()) else {
            return Ok(None);
        };
        Self::decode(frame_type, frame.body.clone()).map(Some)
    }
}
