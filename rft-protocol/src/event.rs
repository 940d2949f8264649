//! Packet trace events
//!
//! Every packet a peer sends, receives, or discards is reported as a
//! [`PacketEvent`] through an [`EventSink`]. The trace is observability
//! only; nothing in the protocol reads it back.

use crate::congestion::CongestionController;
use crate::packet::{ConnectionId, Flags, Packet};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

/// Which way a packet went
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Send,
    Receive,
    Drop,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Send => f.write_str("SEND"),
            Direction::Receive => f.write_str("RECV"),
            Direction::Drop => f.write_str("DROP"),
        }
    }
}

/// Sender's congestion state at the time of an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSnapshot {
    pub cwnd: u32,
    pub ssthresh: u32,
}

impl From<&CongestionController> for WindowSnapshot {
    fn from(cc: &CongestionController) -> Self {
        WindowSnapshot {
            cwnd: cc.congestion_window(),
            ssthresh: cc.ssthresh(),
        }
    }
}

/// One line of the packet trace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketEvent {
    pub direction: Direction,
    pub seq: u32,
    pub ack: u32,
    pub connection_id: ConnectionId,
    /// Only the sending role has a congestion window
    pub window: Option<WindowSnapshot>,
    pub flags: Flags,
    pub duplicate: bool,
    pub payload_len: usize,
}

impl PacketEvent {
    pub fn new(direction: Direction, packet: &Packet) -> Self {
        PacketEvent {
            direction,
            seq: packet.header.seq,
            ack: packet.header.ack,
            connection_id: packet.connection_id(),
            window: None,
            flags: packet.flags(),
            duplicate: false,
            payload_len: packet.payload_len(),
        }
    }

    pub fn with_window(mut self, window: impl Into<WindowSnapshot>) -> Self {
        self.window = Some(window.into());
        self
    }

    pub fn duplicate(mut self, duplicate: bool) -> Self {
        self.duplicate = duplicate;
        self
    }
}

/// `SEND <seq> <ack> <id> [<cwnd> <ssthresh>] [ACK] [SYN] [FIN] [DUP]`
impl fmt::Display for PacketEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {}",
            self.direction, self.seq, self.ack, self.connection_id
        )?;
        if let Some(window) = self.window {
            write!(f, " {} {}", window.cwnd, window.ssthresh)?;
        }
        if !self.flags.is_empty() {
            write!(f, " {}", self.flags)?;
        }
        if self.duplicate {
            f.write_str(" DUP")?;
        }
        Ok(())
    }
}

/// Destination for packet trace events
pub trait EventSink: Send + Sync {
    fn record(&self, event: PacketEvent);
}

impl<S: EventSink + ?Sized> EventSink for Arc<S> {
    fn record(&self, event: PacketEvent) {
        (**self).record(event)
    }
}

/// Forwards events to `tracing` at trace level
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn record(&self, event: PacketEvent) {
        tracing::trace!(target: "rft::packet", "{}", event);
    }
}

/// Keeps every event in memory
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<PacketEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all recorded events
    pub fn events(&self) -> Vec<PacketEvent> {
        self.events.lock().clone()
    }

    /// Count events matching a predicate
    pub fn count(&self, predicate: impl Fn(&PacketEvent) -> bool) -> usize {
        self.events.lock().iter().filter(|e| predicate(e)).count()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl EventSink for RecordingSink {
    fn record(&self, event: PacketEvent) {
        self.events.lock().push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequence::SeqNumber;

    fn syn() -> Packet {
        Packet::control(
            SeqNumber::new(12345),
            SeqNumber::new(0),
            ConnectionId::UNASSIGNED,
            Flags::SYN,
        )
    }

    #[test]
    fn test_sender_line_format() {
        let cc = CongestionController::new();
        let event = PacketEvent::new(Direction::Send, &syn())
            .with_window(&cc)
            .duplicate(true);

        assert_eq!(event.to_string(), "SEND 12345 0 0 512 10000 SYN DUP");
    }

    #[test]
    fn test_receiver_line_format() {
        let fin_ack = Packet::control(
            SeqNumber::new(4322),
            SeqNumber::new(13858),
            ConnectionId::new(2),
            Flags::ACK | Flags::FIN,
        );
        let event = PacketEvent::new(Direction::Send, &fin_ack);

        assert_eq!(event.to_string(), "SEND 4322 13858 2 ACK FIN");
        assert_eq!(
            PacketEvent::new(Direction::Drop, &syn()).to_string(),
            "DROP 12345 0 0 SYN"
        );
    }

    #[test]
    fn test_recording_sink() {
        let sink = Arc::new(RecordingSink::new());
        let shared: Arc<dyn EventSink> = sink.clone();

        shared.record(PacketEvent::new(Direction::Send, &syn()));
        shared.record(PacketEvent::new(Direction::Send, &syn()).duplicate(true));

        assert_eq!(sink.events().len(), 2);
        assert_eq!(sink.count(|e| e.duplicate), 1);

        sink.clear();
        assert!(sink.events().is_empty());
    }
}
