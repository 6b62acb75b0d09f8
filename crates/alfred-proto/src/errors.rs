//! Error types returned by frame and record decoding.

use thiserror::Error;

/// Errors that can occur while decoding or encoding wire frames.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Fewer bytes were supplied than the fixed header requires.
    #[error("frame header truncated: need {expected} bytes, got {actual}")]
    HeaderTruncated {
        /// Bytes required for a complete header.
        expected: usize,
        /// Bytes actually available.
        actual: usize,
    },

    /// The header's `length` field claims more body bytes than were supplied.
    #[error("frame body truncated: header claims {expected} bytes, got {actual}")]
    FrameTruncated {
        /// Bytes required to satisfy the header's declared length.
        expected: usize,
        /// Bytes actually available.
        actual: usize,
    },

    /// The header's `version` byte does not match `ALFRED_VERSION`.
    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(u8),

    /// A frame body, once assembled, would not fit in a `u16` length field.
    #[error("payload too large: {size} bytes exceeds {max}")]
    PayloadTooLarge {
        /// Size of the payload that was rejected.
        size: usize,
        /// Maximum representable payload size.
        max: usize,
    },

    /// A `REQUEST` or `STATUS_TXEND` body was shorter than its fixed fields.
    #[error("frame body too short for {frame_type}: need {expected} bytes, got {actual}")]
    BodyTooShort {
        /// Name of the frame type whose fixed fields didn't fit.
        frame_type: &'static str,
        /// Bytes required.
        expected: usize,
        /// Bytes actually available.
        actual: usize,
    },
}

/// Convenience alias for results returned by this crate.
pub type Result<T> = std::result::Result<T, ProtocolError>;
