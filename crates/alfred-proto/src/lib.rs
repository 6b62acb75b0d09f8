//! Wire codec for the alfred mesh data-announcement protocol.
//!
//! Every frame shares a 4-byte header (see [`FrameHeader`]); [`Body`]
//! interprets the bytes that follow according to the header's frame type.
//! This crate is pure: no I/O, no allocation beyond the structures it
//! returns, and no dependency on any async runtime.

mod body;
mod errors;
mod frame;
mod header;
mod mac;
mod opcode;
mod record;

pub use body::{Body, NO_FILTER};
pub use errors::{ProtocolError, Result};
pub use frame::Frame;
pub use header::{FrameHeader, ALFRED_VERSION};
pub use mac::MacAddr;
pub use opcode::FrameType;
pub use record::DatasetRecord;

/// Fixed UDP port the protocol listens on (0x4242).
pub const ALFRED_PORT: u16 = 0x4242;

/// Receiver buffer ceiling; frames exceeding it are dropped (§4.1).
pub const MAX_PAYLOAD: usize = 1400;
