//! Internal error type for the protocol engine.
//!
//! §7 specifies that the core's public boundary (the dispatcher entry point
//! and the scheduler hooks) returns simple boolean success/failure — there is
//! no error type hierarchy visible to callers. `CoreError` exists purely so
//! that internal call sites can log a precise, structured reason before
//! collapsing to that boolean outcome.

use thiserror::Error;

/// A reason a core operation declined to proceed.
///
/// Every variant corresponds to a drop/reject path named in §7; none of them
/// are meant to propagate past the dispatcher or transmitter that produced
/// them.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// The frame failed to decode (truncation, length mismatch, bad version).
    #[error("malformed frame: {0}")]
    MalformedFrame(#[from] alfred_proto::ProtocolError),

    /// The sender address belongs to one of our own interfaces.
    #[error("frame from own address ignored")]
    OwnAddress,

    /// An IPv6 sender address is not EUI-64 link-local.
    #[error("ipv6 sender is not eui-64 link-local")]
    NotEui64LinkLocal,

    /// `resolve_mac` could not map the sender's IP to a hardware address.
    #[error("could not resolve hardware address for sender")]
    UnresolvedMac,

    /// A slave received a push/txend for a transaction it never requested.
    #[error("role violation: {0}")]
    RoleViolation(&'static str),

    /// The frame's type byte did not map to any known frame type.
    #[error("unknown frame type {0}")]
    UnknownFrameType(u8),

    /// The datagram exceeded the receiver's `MAX_PAYLOAD` ceiling.
    #[error("datagram of {size} bytes exceeds MAX_PAYLOAD of {max}")]
    OversizedDatagram {
        /// Bytes actually received.
        size: usize,
        /// `alfred_proto::MAX_PAYLOAD`.
        max: usize,
    },
}

/// Convenience alias for results returned internally by this crate.
pub type Result<T> = std::result::Result<T, CoreError>;
