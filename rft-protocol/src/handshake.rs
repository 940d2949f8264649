//! RFT Handshake Protocol
//!
//! Three-way handshake:
//!
//! ```text
//!  client                                  server
//!    | SYN       seq=12345  ack=0      id=0   |
//!    |--------------------------------------->|  allocate id
//!    | SYN|ACK   seq=4321   ack=12346  id=N   |
//!    |<---------------------------------------|
//!    | ACK       seq=12346  ack=4322   id=N   |
//!    |--------------------------------------->|
//! ```
//!
//! The receiver considers the connection usable as soon as it has replied to
//! the SYN; the final ACK carries no state it needs.

use crate::packet::{ConnectionId, Flags, Packet};
use crate::sequence::SeqNumber;
use thiserror::Error;

/// Initial sequence number used by the receiver
pub const SERVER_ISN: u32 = 4321;

/// Initial sequence number used by the sender
pub const CLIENT_ISN: u32 = 12345;

/// Handshake errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HandshakeError {
    #[error("Expected {expected}, got packet with flags [{actual}]")]
    UnexpectedPacket { expected: &'static str, actual: Flags },

    #[error("SYN already carries connection id {0}")]
    AlreadyAssigned(ConnectionId),

    #[error("Receiver offered unassigned connection id")]
    UnassignedId,

    #[error("Handshake is not in the correct state")]
    InvalidState,
}

/// Sender-side handshake state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    /// Nothing sent yet
    Closed,
    /// SYN sent, waiting for SYN|ACK
    SynSent,
    /// SYN|ACK received and final ACK produced
    Established,
}

/// Initiating side of the handshake
#[derive(Debug, Clone)]
pub struct ClientHandshake {
    isn: SeqNumber,
    state: HandshakeState,
    connection_id: ConnectionId,
}

impl ClientHandshake {
    pub fn new(isn: SeqNumber) -> Self {
        ClientHandshake {
            isn,
            state: HandshakeState::Closed,
            connection_id: ConnectionId::UNASSIGNED,
        }
    }

    pub fn state(&self) -> HandshakeState {
        self.state
    }

    /// Connection id offered by the receiver, once established
    pub fn connection_id(&self) -> Option<ConnectionId> {
        match self.state {
            HandshakeState::Established => Some(self.connection_id),
            _ => None,
        }
    }

    /// Build the SYN (also used for retransmissions)
    pub fn syn(&mut self) -> Packet {
        if self.state == HandshakeState::Closed {
            self.state = HandshakeState::SynSent;
        }
        Packet::control(
            self.isn,
            SeqNumber::default(),
            ConnectionId::UNASSIGNED,
            Flags::SYN,
        )
    }

    /// Process a reply to the SYN
    ///
    /// On a SYN|ACK, records the offered connection id and returns the final
    /// handshake ACK to transmit.
    pub fn process(&mut self, packet: &Packet) -> Result<Packet, HandshakeError> {
        if self.state != HandshakeState::SynSent {
            return Err(HandshakeError::InvalidState);
        }

        if !(packet.is_syn() && packet.is_ack()) {
            return Err(HandshakeError::UnexpectedPacket {
                expected: "SYN|ACK",
                actual: packet.flags(),
            });
        }

        let connection_id = packet.connection_id();
        if !connection_id.is_assigned() {
            return Err(HandshakeError::UnassignedId);
        }

        self.connection_id = connection_id;
        self.state = HandshakeState::Established;

        Ok(Packet::control(
            packet.ack_number(),
            packet.seq_number().next(),
            connection_id,
            Flags::ACK,
        ))
    }
}

/// Receiver's answer to an initial SYN
#[derive(Debug, Clone)]
pub struct SynAccepted {
    /// SYN|ACK to send back
    pub reply: Packet,
    /// First data sequence number the receiver expects
    pub expected: SeqNumber,
}

/// Accept an initial SYN on behalf of the receiver
pub fn accept_syn(syn: &Packet, id: ConnectionId) -> Result<SynAccepted, HandshakeError> {
    if !syn.is_syn() || syn.is_ack() {
        return Err(HandshakeError::UnexpectedPacket {
            expected: "SYN",
            actual: syn.flags(),
        });
    }

    if syn.connection_id().is_assigned() {
        return Err(HandshakeError::AlreadyAssigned(syn.connection_id()));
    }

    let expected = syn.seq_number().next();
    let reply = Packet::control(
        SeqNumber::new(SERVER_ISN),
        expected,
        id,
        Flags::SYN | Flags::ACK,
    );

    Ok(SynAccepted { reply, expected })
}
