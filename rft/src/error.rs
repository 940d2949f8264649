use rft_io::SocketError;
use rft_protocol::{ConnectionId, PacketError};
use std::fmt;
use std::io;
use std::time::Duration;
use thiserror::Error;

/// Stage of a transfer that can time out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Handshake,
    Transfer,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Handshake => f.write_str("handshake"),
            Phase::Transfer => f.write_str("transfer"),
        }
    }
}

/// Sender errors
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("No response from peer during {phase} after {waited:?}")]
    NoResponse { phase: Phase, waited: Duration },

    #[error("Transfer cancelled")]
    Cancelled,

    #[error("Socket error: {0}")]
    Socket(#[from] SocketError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Packet error: {0}")]
    Packet(#[from] PacketError),
}

/// Receiver errors
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Socket error: {0}")]
    Socket(#[from] SocketError),

    #[error("Failed to store file for connection {connection_id}: {source}")]
    Storage {
        connection_id: ConnectionId,
        #[source]
        source: io::Error,
    },

    #[error("Packet error: {0}")]
    Packet(#[from] PacketError),
}
