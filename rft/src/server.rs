//! Receiving and multiplexing role driver
//!
//! One [`Server`] owns one transport and any number of connections, keyed by
//! the id it assigned during the handshake. Packets are dispatched in a fixed
//! order: SYN opens a connection, then ACK, FIN and plain data go to the
//! connection they name.

use crate::error::ServerError;
use crate::storage::Storage;
use crate::timeouts::Timeouts;
use rft_io::{StopSignal, Transport};
use rft_protocol::{
    Connection, ConnectionId, Direction, EventSink, Packet, PacketEvent, ReceiveOutcome,
    TracingSink, MAX_PACKET_SIZE,
};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;

/// Receiver configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerOptions {
    /// SYNs beyond this many live connections are dropped
    pub max_connections: usize,
    pub timeouts: Timeouts,
}

impl Default for ServerOptions {
    fn default() -> Self {
        ServerOptions {
            max_connections: 512,
            timeouts: Timeouts::default(),
        }
    }
}

/// Receiver counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServerStats {
    pub packets_received: u64,
    pub packets_dropped: u64,
    pub malformed: u64,
    pub files_written: u64,
    pub rejected_syns: u64,
}

/// What the receiver did before it was stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerOutcome {
    pub connections: usize,
    pub finished: usize,
    pub stats: ServerStats,
}

/// Receives files from many senders on one transport
pub struct Server<T, S> {
    transport: T,
    storage: S,
    options: ServerOptions,
    sink: Arc<dyn EventSink>,
    stop: StopSignal,
    connections: BTreeMap<ConnectionId, Connection>,
    last_id: i16,
    stats: ServerStats,
}

impl<T: Transport, S: Storage> Server<T, S> {
    pub fn new(transport: T, storage: S) -> Self {
        Server {
            transport,
            storage,
            options: ServerOptions::default(),
            sink: Arc::new(TracingSink),
            stop: StopSignal::new(),
            connections: BTreeMap::new(),
            last_id: 0,
            stats: ServerStats::default(),
        }
    }

    pub fn with_options(mut self, options: ServerOptions) -> Self {
        self.options = options;
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

    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.transport.local_addr()?)
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn connection(&self, id: ConnectionId) -> Option<&Connection> {
        self.connections.get(&id)
    }

    pub fn connections(&self) -> impl Iterator<Item = &Connection> {
        self.connections.values()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn stats(&self) -> ServerStats {
        self.stats
    }

    pub fn outcome(&self) -> ServerOutcome {
        ServerOutcome {
            connections: self.connections.len(),
            finished: self.connections.values().filter(|c| c.is_finished()).count(),
            stats: self.stats,
        }
    }

    /// Serve until the stop signal is raised
    pub fn run(&mut self) -> Result<ServerOutcome, ServerError> {
        tracing::info!("Receiving on {}", self.local_addr()?);

        while !self.stop.is_raised() {
            self.poll_once()?;
        }

        let outcome = self.outcome();
        tracing::info!(
            "Stopped after {} connections, {} files written",
            outcome.connections,
            outcome.stats.files_written
        );
        Ok(outcome)
    }

    /// Wait one poll interval for a datagram and handle it
    ///
    /// Returns whether a datagram arrived.
    pub fn poll_once(&mut self) -> Result<bool, ServerError> {
        let mut buf = [0u8; MAX_PACKET_SIZE + 1];
        match self
            .transport
            .recv_timeout(&mut buf, self.options.timeouts.poll_interval)?
        {
            Some((n, from)) => {
                self.handle_datagram(&buf[..n], from)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Process one received datagram
    pub fn handle_datagram(&mut self, datagram: &[u8], from: SocketAddr) -> Result<(), ServerError> {
        let packet = match Packet::from_bytes(datagram) {
            Ok(packet) => packet,
            Err(e) => {
                tracing::warn!("Discarding malformed datagram from {}: {}", from, e);
                self.stats.malformed += 1;
                return Ok(());
            }
        };
        self.stats.packets_received += 1;

        if packet.is_syn() {
            return self.accept(&packet, from);
        }

        let id = packet.connection_id();
        let outcome = match self.connections.get_mut(&id) {
            Some(connection) => connection.on_packet(&packet),
            None => {
                tracing::debug!("Packet for unknown connection {} from {}", id, from);
                self.drop_packet(&packet);
                return Ok(());
            }
        };

        match outcome {
            ReceiveOutcome::Accepted { reply } => {
                self.record(Direction::Receive, &packet, false);
                self.send(&reply, from, false)?;
            }
            ReceiveOutcome::OutOfOrder { reply } => {
                self.drop_packet(&packet);
                self.send(&reply, from, true)?;
            }
            ReceiveOutcome::Finished { reply } => {
                self.record(Direction::Receive, &packet, false);
                self.send(&reply, from, false)?;
                self.store(id)?;
                tracing::info!("Connection {} finished", id);
            }
            ReceiveOutcome::Rewrite => {
                self.record(Direction::Receive, &packet, false);
                self.store(id)?;
            }
            ReceiveOutcome::Ignored => {
                self.record(Direction::Receive, &packet, false);
            }
        }
        Ok(())
    }

    fn accept(&mut self, syn: &Packet, from: SocketAddr) -> Result<(), ServerError> {
        if self.connections.len() >= self.options.max_connections {
            tracing::warn!(
                "Connection limit {} reached, dropping SYN from {}",
                self.options.max_connections,
                from
            );
            self.stats.rejected_syns += 1;
            self.drop_packet(syn);
            return Ok(());
        }

        let Some(next) = self.last_id.checked_add(1) else {
            tracing::warn!("Connection id space exhausted, dropping SYN from {}", from);
            self.stats.rejected_syns += 1;
            self.drop_packet(syn);
            return Ok(());
        };
        let id = ConnectionId::new(next);

        match Connection::accept(id, syn) {
            Ok((connection, reply)) => {
                self.last_id = next;
                self.connections.insert(id, connection);
                self.record(Direction::Receive, syn, false);
                self.send(&reply, from, false)?;
                tracing::info!("Connection {} opened by {}", id, from);
            }
            Err(e) => {
                tracing::debug!("Rejecting SYN from {}: {}", from, e);
                self.drop_packet(syn);
            }
        }
        Ok(())
    }

    fn store(&mut self, id: ConnectionId) -> Result<(), ServerError> {
        let Some(connection) = self.connections.get(&id) else {
            return Ok(());
        };

        self.storage
            .store(id, connection.segments())
            .map_err(|source| ServerError::Storage {
                connection_id: id,
                source,
            })?;
        self.stats.files_written += 1;
        Ok(())
    }

    fn send(&self, packet: &Packet, to: SocketAddr, duplicate: bool) -> Result<(), ServerError> {
        let mut wire = [0u8; MAX_PACKET_SIZE];
        let len = packet.encode_into(&mut wire)?;
        self.transport.send_to(&wire[..len], to)?;
        self.record(Direction::Send, packet, duplicate);
        Ok(())
    }

    fn drop_packet(&mut self, packet: &Packet) {
        self.stats.packets_dropped += 1;
        self.record(Direction::Drop, packet, false);
    }

    fn record(&self, direction: Direction, packet: &Packet, duplicate: bool) {
        self.sink
            .record(PacketEvent::new(direction, packet).duplicate(duplicate));
    }
}
