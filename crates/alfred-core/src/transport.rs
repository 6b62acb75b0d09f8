//! Core ↔ socket layer boundary (§6): the one interface the transmitters
//! need to emit frames. Binding real multicast sockets, scope-id handling,
//! and own-address filtering are out of scope for the core (§1) and live in
//! the concrete transport crate that implements this trait.

use std::net::IpAddr;

/// Sends already-encoded frame bytes on behalf of the core.
pub trait FrameTransport {
    /// Sends `bytes` on `interface` to `dest`.
    ///
    /// Returns `true` on success. UDP is best-effort (§7): a `false` return
    /// is logged by the caller and otherwise ignored, except that a
    /// permission-denied error is expected to cause the implementation to
    /// close and invalidate the interface's socket so the scheduler can
    /// re-create it on the next tick — that policy lives entirely in the
    /// transport implementation, not here.
    fn send_frame(&mut self, interface: &str, dest: IpAddr, bytes: &[u8]) -> bool;
}

/// An in-memory transport double for tests: records every send instead of
/// touching a socket.
#[derive(Debug, Clone, Default)]
pub struct RecordingTransport {
    /// Every frame handed to `send_frame`, in call order.
    pub sent: Vec<(String, IpAddr, Vec<u8>)>,
}

impl RecordingTransport {
    /// Builds an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl FrameTransport for RecordingTransport {
    fn send_frame(&mut self, interface: &str, dest: IpAddr, bytes: &[u8]) -> bool {
        self.sent.push((interface.to_string(), dest, bytes.to_vec()));
        true
    }
}
