//! RFT Connection State Machines
//!
//! [`SendWindow`] drives the sending side of a transfer: it carves the file
//! into segments, keeps the unacknowledged range, and reacts to cumulative
//! ACKs and retransmission timeouts through the [`CongestionController`].
//!
//! [`Connection`] is the receiving side: one per connection id, accepting
//! in-order segments and producing the ACK to send for every packet.

use crate::congestion::CongestionController;
use crate::handshake::{self, HandshakeError, SERVER_ISN};
use crate::packet::{ConnectionId, Flags, Packet, PacketHeader, MAX_PAYLOAD_SIZE};
use crate::sequence::SeqNumber;
use bytes::Bytes;
use std::collections::HashSet;

/// A chunk of the file ready to be sent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// Byte offset in the file
    pub offset: u64,
    /// Sequence number on the wire
    pub seq: SeqNumber,
    pub payload: Bytes,
    /// This offset was sent before
    pub retransmission: bool,
}

impl Segment {
    /// Build the data packet for this segment
    pub fn to_packet(&self, connection_id: ConnectionId) -> Packet {
        Packet {
            header: PacketHeader {
                seq: self.seq.as_raw(),
                ack: 0,
                connection_id,
                flags: Flags::NONE,
            },
            payload: self.payload.clone(),
        }
    }
}

/// Result of feeding an ACK to the send window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckOutcome {
    /// The ACK covered outstanding bytes and the window moved forward
    Advanced { acked_bytes: u64 },
    /// Nothing new acknowledged
    Duplicate,
}

/// Sender statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SendStats {
    pub segments_sent: u64,
    pub retransmissions: u64,
    pub bytes_sent: u64,
    pub acks: u64,
    pub duplicate_acks: u64,
    pub timeouts: u64,
}

/// Sending half of a transfer
///
/// Tracks `first_unacked <= first_unsent <= file_len` as byte offsets. The
/// sequence number of offset `o` is `isn + 1 + o` in the modular space.
#[derive(Debug, Clone)]
pub struct SendWindow {
    isn: SeqNumber,
    data: Bytes,
    first_unsent: u64,
    first_unacked: u64,
    /// Highest offset ever put on the wire; survives rewinds
    highest_sent: u64,
    sent_offsets: HashSet<u64>,
    congestion: CongestionController,
    stats: SendStats,
}

impl SendWindow {
    pub fn new(isn: SeqNumber, data: Bytes) -> Self {
        Self::with_controller(isn, data, CongestionController::new())
    }

    pub fn with_controller(isn: SeqNumber, data: Bytes, congestion: CongestionController) -> Self {
        SendWindow {
            isn,
            data,
            first_unsent: 0,
            first_unacked: 0,
            highest_sent: 0,
            sent_offsets: HashSet::new(),
            congestion,
            stats: SendStats::default(),
        }
    }

    pub fn file_len(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn first_unsent(&self) -> u64 {
        self.first_unsent
    }

    pub fn first_unacked(&self) -> u64 {
        self.first_unacked
    }

    /// Bytes sent but not yet acknowledged
    pub fn in_flight(&self) -> u64 {
        self.first_unsent - self.first_unacked
    }

    pub fn has_unacked(&self) -> bool {
        self.first_unacked < self.file_len()
    }

    /// Every byte has been acknowledged
    pub fn is_complete(&self) -> bool {
        !self.has_unacked()
    }

    pub fn congestion(&self) -> &CongestionController {
        &self.congestion
    }

    pub fn stats(&self) -> SendStats {
        self.stats
    }

    /// Sequence number for a byte offset
    pub fn sequence_for(&self, offset: u64) -> SeqNumber {
        self.isn.next().add_offset(offset)
    }

    /// Sequence number the FIN carries once everything is acknowledged
    pub fn fin_sequence(&self) -> SeqNumber {
        self.sequence_for(self.file_len())
    }

    fn chunk_at(&self, offset: u64) -> u64 {
        (self.file_len() - offset).min(MAX_PAYLOAD_SIZE as u64)
    }

    /// Next segment the congestion window allows, if any
    pub fn next_segment(&mut self) -> Option<Segment> {
        if self.first_unsent >= self.file_len() {
            return None;
        }

        let offset = self.first_unsent;
        let len = self.chunk_at(offset);
        if !self.congestion.allows(self.in_flight(), len) {
            return None;
        }

        let start = offset as usize;
        let payload = self.data.slice(start..start + len as usize);
        let retransmission = !self.sent_offsets.insert(offset);

        self.first_unsent += len;
        self.highest_sent = self.highest_sent.max(self.first_unsent);

        self.stats.segments_sent += 1;
        self.stats.bytes_sent += len;
        if retransmission {
            self.stats.retransmissions += 1;
        }

        Some(Segment {
            offset,
            seq: self.sequence_for(offset),
            payload,
            retransmission,
        })
    }

    /// Process a cumulative acknowledgement number
    ///
    /// The ACK is accepted when its forward distance from the oldest
    /// unacknowledged byte covers at least that chunk and no more than the
    /// highest offset ever sent.
    pub fn on_ack(&mut self, ack: SeqNumber) -> AckOutcome {
        let outstanding = self.highest_sent - self.first_unacked;
        if outstanding == 0 {
            self.stats.duplicate_acks += 1;
            return AckOutcome::Duplicate;
        }

        let base = self.sequence_for(self.first_unacked);
        let delta = u64::from(base.distance_to(ack));
        let min_chunk = self.chunk_at(self.first_unacked);

        if delta < min_chunk || delta > outstanding {
            self.stats.duplicate_acks += 1;
            return AckOutcome::Duplicate;
        }

        self.first_unacked += delta;
        self.first_unsent = self.first_unsent.max(self.first_unacked);
        self.congestion.on_successful_ack();
        self.stats.acks += 1;

        AckOutcome::Advanced { acked_bytes: delta }
    }

    /// Retransmission timeout: collapse the window and rewind
    pub fn on_timeout(&mut self) {
        self.congestion.on_timeout();
        self.first_unsent = self.first_unacked;
        self.stats.timeouts += 1;
    }
}

/// What the receiver should do after a packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiveOutcome {
    /// In-order data appended; send the ACK
    Accepted { reply: Packet },
    /// Sequence mismatch; nothing buffered, send the duplicate ACK
    OutOfOrder { reply: Packet },
    /// FIN received; send the ACK|FIN and write the file
    Finished { reply: Packet },
    /// ACK after FIN on a connection holding data; write the file again
    Rewrite,
    /// Nothing to do
    Ignored,
}

/// Receiver statistics for one connection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectionStats {
    pub packets_received: u64,
    pub segments_accepted: u64,
    pub segments_dropped: u64,
    pub bytes_received: u64,
    pub fins: u64,
}

/// Receiving half of one connection
#[derive(Debug, Clone)]
pub struct Connection {
    id: ConnectionId,
    expected: SeqNumber,
    segments: Vec<Bytes>,
    finished: bool,
    stats: ConnectionStats,
}

impl Connection {
    /// Accept an initial SYN, returning the connection and its SYN|ACK
    pub fn accept(id: ConnectionId, syn: &Packet) -> Result<(Self, Packet), HandshakeError> {
        let accepted = handshake::accept_syn(syn, id)?;
        let connection = Connection {
            id,
            expected: accepted.expected,
            segments: Vec::new(),
            finished: false,
            stats: ConnectionStats::default(),
        };
        Ok((connection, accepted.reply))
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn expected_sequence(&self) -> SeqNumber {
        self.expected
    }

    /// Accepted payloads in arrival order
    pub fn segments(&self) -> &[Bytes] {
        &self.segments
    }

    pub fn bytes_received(&self) -> u64 {
        self.stats.bytes_received
    }

    /// A FIN has been seen
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn stats(&self) -> ConnectionStats {
        self.stats
    }

    fn ack(&self, ack: SeqNumber, flags: Flags) -> Packet {
        Packet::control(SeqNumber::new(SERVER_ISN).next(), ack, self.id, flags)
    }

    /// Process a packet addressed to this connection
    ///
    /// ACK is checked before FIN, FIN before data.
    pub fn on_packet(&mut self, packet: &Packet) -> ReceiveOutcome {
        self.stats.packets_received += 1;

        if packet.is_syn() {
            return ReceiveOutcome::Ignored;
        }

        if packet.is_ack() {
            return if self.finished && !self.segments.is_empty() {
                ReceiveOutcome::Rewrite
            } else {
                ReceiveOutcome::Ignored
            };
        }

        if packet.is_fin() {
            self.finished = true;
            self.stats.fins += 1;
            let ack = packet.seq_number() + (packet.payload_len() as u32 + 1);
            return ReceiveOutcome::Finished {
                reply: self.ack(ack, Flags::ACK | Flags::FIN),
            };
        }

        if packet.seq_number() != self.expected {
            self.stats.segments_dropped += 1;
            return ReceiveOutcome::OutOfOrder {
                reply: self.ack(self.expected, Flags::ACK),
            };
        }

        let len = packet.payload_len();
        if len > 0 {
            self.segments.push(packet.payload.clone());
        }
        self.expected = packet.seq_number() + len as u32;
        self.stats.segments_accepted += 1;
        self.stats.bytes_received += len as u64;

        ReceiveOutcome::Accepted {
            reply: self.ack(self.expected, Flags::ACK),
        }
    }
}
