//! RFT Protocol Core Implementation
//!
//! This crate implements the core of RFT, a small reliable file transfer
//! protocol over UDP: packet codec, modular sequence numbers, the three-way
//! handshake, the sender's sliding window and the receiver's per-connection
//! state machine, Reno-style congestion control, and the packet trace.
//!
//! Nothing in here touches a socket or a clock.

pub mod congestion;
pub mod connection;
pub mod event;
pub mod handshake;
pub mod packet;
pub mod sequence;

pub use congestion::{CongestionController, CongestionStats, INITIAL_SSTHRESH, MAX_CWND, MIN_CWND};
pub use connection::{
    AckOutcome, Connection, ConnectionStats, ReceiveOutcome, Segment, SendStats, SendWindow,
};
pub use event::{Direction, EventSink, PacketEvent, RecordingSink, TracingSink, WindowSnapshot};
pub use handshake::{
    accept_syn, ClientHandshake, HandshakeError, HandshakeState, SynAccepted, CLIENT_ISN,
    SERVER_ISN,
};
pub use packet::{
    ConnectionId, Flags, Packet, PacketError, PacketHeader, HEADER_SIZE, MAX_PACKET_SIZE,
    MAX_PAYLOAD_SIZE,
};
pub use sequence::{SeqNumber, MAX_SEQ_NUMBER, SEQ_SPACE};
