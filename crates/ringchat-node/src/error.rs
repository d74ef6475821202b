//! Errors raised by neighbor links and by the local node API.

use std::time::Duration;

use ringchat_core::wire::{FramingError, ProtocolError, WireError};
use ringchat_core::PeerAddress;

/// Failure on a neighbor link: dial, accept, read, write or timeout.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("failed to dial {addr}: {source}")]
    Dial {
        addr: PeerAddress,
        source: std::io::Error,
    },

    #[error("{what} timed out after {after:?}")]
    Timeout { what: &'static str, after: Duration },

    #[error("link i/o failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("link closed by peer")]
    Closed,

    #[error("bad frame on link: {0}")]
    Protocol(#[from] WireError),
}

impl From<ProtocolError> for ConnectionError {
    fn from(e: ProtocolError) -> Self {
        ConnectionError::Protocol(e.into())
    }
}

impl From<FramingError> for ConnectionError {
    fn from(e: FramingError) -> Self {
        ConnectionError::Protocol(e.into())
    }
}

/// Local misuse of a node.
#[derive(Debug, thiserror::Error)]
pub enum ApplicationError {
    #[error("no ring id has been assigned yet")]
    IdNotAssigned,

    #[error("node is no longer running")]
    NodeStopped,

    #[error("message cannot be framed: {0}")]
    Framing(#[from] FramingError),
}
