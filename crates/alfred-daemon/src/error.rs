//! Daemon error types.

use thiserror::Error;

/// Errors that can occur in the daemon binary.
#[derive(Debug, Error)]
pub enum DaemonError {
    /// Configuration error (unknown interface, invalid multicast group, bad
    /// opmode string, etc.).
    ///
    /// Fatal: fix configuration and restart.
    #[error("configuration error: {0}")]
    Config(String),

    /// Transport/socket error (bind failure, multicast join failure, I/O
    /// error).
    ///
    /// May be transient or fatal depending on cause; see the message.
    #[error("transport error: {0}")]
    Transport(String),
}

impl From<std::io::Error> for DaemonError {
    fn from(err: std::io::Error) -> Self {
        Self::Transport(err.to_string())
    }
}
