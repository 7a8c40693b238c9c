//! Fault types for the wire protocol.
//!
//! [`ConnectionFault`] covers everything that happens to the byte stream;
//! [`ProtocolFault`] covers payloads that arrived intact but cannot be used.

use std::io;

use thiserror::Error;

/// A failure of the underlying TCP stream.
///
/// Every I/O error surfaced by the framing layer ends up here. Callers treat
/// any `ConnectionFault` as "the socket is gone": clear it and reconnect
/// lazily on next use.
#[derive(Debug, Error)]
pub enum ConnectionFault {
    /// No socket is currently established.
    #[error("not connected")]
    NotConnected,

    /// Opening a TCP stream to the endpoint failed.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// The peer reset, aborted, or the pipe broke.
    #[error("connection lost: {0}")]
    Lost(#[source] io::Error),

    /// Any other I/O error on the stream.
    #[error("I/O error on connection: {0}")]
    Io(#[source] io::Error),

    /// The length prefix announced a frame larger than the configured limit.
    #[error("frame of {len} bytes exceeds the {max} byte limit")]
    FrameTooLarge { len: usize, max: usize },
}

impl ConnectionFault {
    /// Whether this fault means the peer went away (as opposed to a local error).
    #[must_use]
    pub const fn is_disconnect(&self) -> bool {
        matches!(self, Self::Lost(_) | Self::NotConnected)
    }
}

impl From<io::Error> for ConnectionFault {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::NotConnected
            | io::ErrorKind::UnexpectedEof => Self::Lost(err),
            _ => Self::Io(err),
        }
    }
}

/// A payload that was framed correctly but is malformed or unusable.
///
/// The offending packet is discarded; the connection stays open.
#[derive(Debug, Error)]
pub enum ProtocolFault {
    /// The payload is not valid JSON for the expected message.
    #[error("malformed payload: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The audio field is not valid base64.
    #[error("invalid audio encoding: {0}")]
    AudioEncoding(#[from] base64::DecodeError),

    /// A chunk id outside `1..=total_chunks`.
    #[error("chunk {chunk_id} is outside 1..={total_chunks}")]
    ChunkOutOfRange { chunk_id: u32, total_chunks: u32 },

    /// A response for a request this side is not tracking.
    #[error("no pending request with id {0}")]
    UnknownRequest(u64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_and_broken_pipe_are_disconnects() {
        for kind in [
            io::ErrorKind::ConnectionReset,
            io::ErrorKind::BrokenPipe,
            io::ErrorKind::ConnectionAborted,
            io::ErrorKind::UnexpectedEof,
        ] {
            let fault = ConnectionFault::from(io::Error::from(kind));
            assert!(fault.is_disconnect(), "{kind:?} should be a disconnect");
        }
    }

    #[test]
    fn other_io_errors_are_not_disconnects() {
        let fault = ConnectionFault::from(io::Error::from(io::ErrorKind::PermissionDenied));
        assert!(!fault.is_disconnect());
        assert!(matches!(fault, ConnectionFault::Io(_)));
    }
}
