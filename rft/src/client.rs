//! Sending role driver
//!
//! A transfer runs in three phases over one [`Transport`]:
//!
//! 1. Handshake: SYN, retransmitted on every empty poll slice until a SYN|ACK
//!    arrives or the handshake deadline passes.
//! 2. Transfer: fill the congestion window, then wait for ACKs. An advancing
//!    ACK goes back to sending; an empty slice collapses the window and
//!    rewinds to the oldest unacknowledged byte.
//! 3. Teardown: FIN, then a fixed drain window in which every FIN from the
//!    peer is acknowledged.

use crate::error::{ClientError, Phase};
use crate::timeouts::Timeouts;
use bytes::Bytes;
use rft_io::{Deadline, StopSignal, Transport};
use rft_protocol::{
    AckOutcome, ClientHandshake, ConnectionId, Direction, EventSink, Flags, Packet, PacketEvent,
    SendWindow, SeqNumber, TracingSink, WindowSnapshot, CLIENT_ISN, MAX_PACKET_SIZE,
};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Summary of a finished transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferReport {
    pub connection_id: ConnectionId,
    pub bytes: u64,
    pub segments_sent: u64,
    pub retransmissions: u64,
    pub duplicate_acks: u64,
    pub timeouts: u64,
    pub final_cwnd: u32,
    pub final_ssthresh: u32,
    /// The peer's FIN was seen during teardown
    pub fin_acknowledged: bool,
    pub elapsed: Duration,
}

enum Received {
    Nothing,
    Malformed,
    Packet(Packet),
}

/// Sends one file to a receiver
pub struct Client<T> {
    transport: T,
    peer: SocketAddr,
    timeouts: Timeouts,
    sink: Arc<dyn EventSink>,
    stop: StopSignal,
}

impl<T: Transport> Client<T> {
    pub fn new(transport: T, peer: SocketAddr) -> Self {
        Client {
            transport,
            peer,
            timeouts: Timeouts::default(),
            sink: Arc::new(TracingSink),
            stop: StopSignal::new(),
        }
    }

    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_stop_signal(mut self, stop: StopSignal) -> Self {
        self.stop = stop;
        self
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Read a file and send it
    pub fn send_file(&mut self, path: impl AsRef<Path>) -> Result<TransferReport, ClientError> {
        let path = path.as_ref();
        let data = std::fs::read(path)?;
        tracing::info!("Sending {} ({} bytes) to {}", path.display(), data.len(), self.peer);
        self.send_bytes(Bytes::from(data))
    }

    /// Send an in-memory buffer as one file
    pub fn send_bytes(&mut self, data: Bytes) -> Result<TransferReport, ClientError> {
        let started = Instant::now();
        let mut window = SendWindow::new(SeqNumber::new(CLIENT_ISN), data);

        let id = self.handshake(&window)?;
        tracing::info!("Connection {} established with {}", id, self.peer);

        self.transfer(&mut window, id)?;
        let fin_acknowledged = self.teardown(&window, id)?;

        let stats = window.stats();
        let congestion = window.congestion();
        Ok(TransferReport {
            connection_id: id,
            bytes: window.file_len(),
            segments_sent: stats.segments_sent,
            retransmissions: stats.retransmissions,
            duplicate_acks: stats.duplicate_acks,
            timeouts: stats.timeouts,
            final_cwnd: congestion.congestion_window(),
            final_ssthresh: congestion.ssthresh(),
            fin_acknowledged,
            elapsed: started.elapsed(),
        })
    }

    fn handshake(&mut self, window: &SendWindow) -> Result<ConnectionId, ClientError> {
        let snapshot = WindowSnapshot::from(window.congestion());
        let mut handshake = ClientHandshake::new(SeqNumber::new(CLIENT_ISN));
        let syn = handshake.syn();
        self.send(&syn, snapshot, false)?;

        let deadline = Deadline::new(self.timeouts.handshake_timeout);
        loop {
            self.check_stop()?;
            if deadline.expired() {
                return Err(ClientError::NoResponse {
                    phase: Phase::Handshake,
                    waited: deadline.elapsed(),
                });
            }

            match self.receive(deadline.slice(self.timeouts.poll_interval))? {
                Received::Nothing => {
                    if !deadline.expired() {
                        tracing::debug!("No SYN|ACK yet, retransmitting SYN");
                        self.send(&syn, snapshot, true)?;
                    }
                }
                Received::Malformed => {}
                Received::Packet(packet) => match handshake.process(&packet) {
                    Ok(ack) => {
                        self.record(Direction::Receive, &packet, snapshot, false);
                        self.send(&ack, snapshot, false)?;
                        return Ok(packet.connection_id());
                    }
                    Err(e) => {
                        tracing::debug!("Ignoring packet during handshake: {}", e);
                        self.record(Direction::Drop, &packet, snapshot, false);
                    }
                },
            }
        }
    }

    fn transfer(&mut self, window: &mut SendWindow, id: ConnectionId) -> Result<(), ClientError> {
        let mut deadline = Deadline::new(self.timeouts.ack_timeout);

        loop {
            while let Some(segment) = window.next_segment() {
                let packet = segment.to_packet(id);
                self.send(&packet, window.congestion().into(), segment.retransmission)?;
            }

            if window.is_complete() {
                return Ok(());
            }

            self.await_ack(window, id, &mut deadline)?;
        }
    }

    /// Wait until an ACK advances the window or a poll slice passes in silence
    fn await_ack(
        &mut self,
        window: &mut SendWindow,
        id: ConnectionId,
        deadline: &mut Deadline,
    ) -> Result<(), ClientError> {
        loop {
            self.check_stop()?;
            if deadline.expired() {
                return Err(ClientError::NoResponse {
                    phase: Phase::Transfer,
                    waited: deadline.elapsed(),
                });
            }

            let packet = match self.receive(deadline.slice(self.timeouts.poll_interval))? {
                Received::Nothing => {
                    if deadline.expired() {
                        continue;
                    }
                    window.on_timeout();
                    tracing::debug!(
                        "Retransmission timeout at offset {}, cwnd {} ssthresh {}",
                        window.first_unacked(),
                        window.congestion().congestion_window(),
                        window.congestion().ssthresh()
                    );
                    return Ok(());
                }
                Received::Malformed => continue,
                Received::Packet(packet) => packet,
            };

            if packet.connection_id() != id || !packet.is_ack() {
                self.record(Direction::Drop, &packet, window.congestion().into(), false);
                continue;
            }

            match window.on_ack(packet.ack_number()) {
                AckOutcome::Advanced { .. } => {
                    self.record(Direction::Receive, &packet, window.congestion().into(), false);
                    deadline.reset();
                    return Ok(());
                }
                AckOutcome::Duplicate => {
                    self.record(Direction::Receive, &packet, window.congestion().into(), true);
                }
            }
        }
    }

    /// Returns whether the peer's FIN was seen
    fn teardown(&mut self, window: &SendWindow, id: ConnectionId) -> Result<bool, ClientError> {
        let snapshot = WindowSnapshot::from(window.congestion());
        let fin = Packet::control(window.fin_sequence(), SeqNumber::default(), id, Flags::FIN);
        self.send(&fin, snapshot, false)?;

        let mut peer_fin_seen = false;
        let drain = Deadline::new(self.timeouts.drain_timeout);
        while !drain.expired() {
            self.check_stop()?;

            match self.receive(drain.slice(self.timeouts.poll_interval))? {
                Received::Nothing => {
                    if !peer_fin_seen && !drain.expired() {
                        self.send(&fin, snapshot, true)?;
                    }
                }
                Received::Malformed => {}
                Received::Packet(packet) if packet.is_fin() && packet.connection_id() == id => {
                    self.record(Direction::Receive, &packet, snapshot, false);
                    let ack = Packet::control(
                        packet.ack_number(),
                        packet.seq_number().next(),
                        id,
                        Flags::ACK,
                    );
                    self.send(&ack, snapshot, peer_fin_seen)?;
                    peer_fin_seen = true;
                }
                Received::Packet(packet) => {
                    self.record(Direction::Drop, &packet, snapshot, false);
                }
            }
        }

        if !peer_fin_seen {
            tracing::warn!("Connection {}: no FIN from peer during teardown", id);
        }
        Ok(peer_fin_seen)
    }

    fn check_stop(&self) -> Result<(), ClientError> {
        if self.stop.is_raised() {
            Err(ClientError::Cancelled)
        } else {
            Ok(())
        }
    }

    fn send(
        &self,
        packet: &Packet,
        window: WindowSnapshot,
        duplicate: bool,
    ) -> Result<(), ClientError> {
        let mut wire = [0u8; MAX_PACKET_SIZE];
        let len = packet.encode_into(&mut wire)?;
        self.transport.send_to(&wire[..len], self.peer)?;
        self.record(Direction::Send, packet, window, duplicate);
        Ok(())
    }

    fn receive(&self, wait: Duration) -> Result<Received, ClientError> {
        // One spare byte exposes oversized datagrams
        let mut buf = [0u8; MAX_PACKET_SIZE + 1];
        let Some((n, from)) = self.transport.recv_timeout(&mut buf, wait)? else {
            return Ok(Received::Nothing);
        };

        match Packet::from_bytes(&buf[..n]) {
            Ok(packet) => Ok(Received::Packet(packet)),
            Err(e) => {
                tracing::warn!("Discarding malformed datagram from {}: {}", from, e);
                Ok(Received::Malformed)
            }
        }
    }

    fn record(&self, direction: Direction, packet: &Packet, window: WindowSnapshot, dup: bool) {
        self.sink.record(
            PacketEvent::new(direction, packet)
                .with_window(window)
                .duplicate(dup),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rft_io::MemoryNetwork;
    use rft_protocol::RecordingSink;

    #[test]
    fn test_handshake_timeout_retransmits_syn() {
        let net = MemoryNetwork::new();
        let endpoint = net.endpoint();
        // Nobody listens here
        let silent = net.endpoint();
        let sink = Arc::new(RecordingSink::new());

        let timeouts = Timeouts::default().scaled_down(50);
        let mut client = Client::new(endpoint, silent.addr())
            .with_timeouts(timeouts)
            .with_event_sink(sink.clone());

        let err = client.send_bytes(Bytes::from_static(b"data")).unwrap_err();
        assert!(matches!(
            err,
            ClientError::NoResponse {
                phase: Phase::Handshake,
                ..
            }
        ));

        let syns = sink.count(|e| e.direction == Direction::Send && e.flags == Flags::SYN);
        let dups = sink.count(|e| e.flags == Flags::SYN && e.duplicate);
        // 200ms deadline at 10ms slices
        assert!(syns >= 5, "only {} SYNs sent", syns);
        assert_eq!(dups, syns - 1);
        assert!(syns <= 21);
    }

    #[test]
    fn test_cancelled_before_handshake_completes() {
        let net = MemoryNetwork::new();
        let endpoint = net.endpoint();
        let silent = net.endpoint();
        let stop = StopSignal::new();
        stop.raise();

        let mut client = Client::new(endpoint, silent.addr())
            .with_timeouts(Timeouts::default().scaled_down(50))
            .with_stop_signal(stop);

        assert!(matches!(
            client.send_bytes(Bytes::new()),
            Err(ClientError::Cancelled)
        ));
    }

    #[test]
    fn test_cancelled_during_teardown() {
        let net = MemoryNetwork::new();
        let endpoint = net.endpoint();
        let peer = net.endpoint();
        let peer_addr = peer.addr();
        let stop = StopSignal::new();

        // Completes the handshake, then raises the stop on FIN without replying
        let raise = stop.clone();
        let responder = std::thread::spawn(move || {
            let mut buf = [0u8; MAX_PACKET_SIZE];
            while let Some((n, from)) = peer
                .recv_timeout(&mut buf, Duration::from_secs(2))
                .unwrap()
            {
                let packet = Packet::from_bytes(&buf[..n]).unwrap();
                if packet.is_syn() {
                    let (_, reply) =
                        rft_protocol::Connection::accept(ConnectionId::new(1), &packet).unwrap();
                    peer.send_to(&reply.to_bytes(), from).unwrap();
                } else if packet.is_fin() {
                    raise.raise();
                    return true;
                }
            }
            false
        });

        let timeouts = Timeouts {
            drain_timeout: Duration::from_secs(5),
            ..Timeouts::default().scaled_down(10)
        };
        let mut client = Client::new(endpoint, peer_addr)
            .with_timeouts(timeouts)
            .with_stop_signal(stop);

        assert!(matches!(
            client.send_bytes(Bytes::new()),
            Err(ClientError::Cancelled)
        ));
        assert!(responder.join().unwrap());
    }

    #[test]
    fn test_missing_file() {
        let net = MemoryNetwork::new();
        let endpoint = net.endpoint();
        let mut client = Client::new(endpoint, "127.0.0.1:9".parse().unwrap());

        let tmp = tempfile::tempdir().unwrap();
        assert!(matches!(
            client.send_file(tmp.path().join("missing")),
            Err(ClientError::Io(_))
        ));
    }
}
