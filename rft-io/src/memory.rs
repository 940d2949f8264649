//! In-process datagram network
//!
//! A [`MemoryNetwork`] hands out [`MemoryEndpoint`]s with distinct loopback
//! addresses. Datagrams travel over crossbeam channels, so delivery is
//! immediate and ordered unless a drop filter discards them. The filter sees
//! every datagram before delivery, which lets tests lose exactly the packets
//! they care about.

use crate::socket::SocketError;
use crate::transport::Transport;
use bytes::Bytes;
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

/// A datagram in flight
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Datagram {
    pub from: SocketAddr,
    pub to: SocketAddr,
    pub payload: Bytes,
}

type DropFilter = Arc<dyn Fn(&Datagram) -> bool + Send + Sync>;

/// Delivery counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NetworkStats {
    pub delivered: u64,
    /// Discarded by the drop filter
    pub dropped: u64,
    /// No endpoint at the destination
    pub unroutable: u64,
}

#[derive(Default)]
struct NetworkState {
    endpoints: HashMap<SocketAddr, Sender<Datagram>>,
    next_port: u16,
    filter: Option<DropFilter>,
    stats: NetworkStats,
}

/// Shared in-process network
#[derive(Clone, Default)]
pub struct MemoryNetwork {
    state: Arc<Mutex<NetworkState>>,
}

impl fmt::Debug for MemoryNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("MemoryNetwork")
            .field("endpoints", &state.endpoints.len())
            .field("stats", &state.stats)
            .finish()
    }
}

impl MemoryNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach an endpoint on the next free loopback port
    pub fn endpoint(&self) -> MemoryEndpoint {
        let addr = {
            let mut state = self.state.lock();
            loop {
                state.next_port = state.next_port.wrapping_add(1).max(1);
                let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, state.next_port));
                if !state.endpoints.contains_key(&addr) {
                    break addr;
                }
            }
        };
        self.attach(addr)
    }

    fn attach(&self, addr: SocketAddr) -> MemoryEndpoint {
        let (tx, rx) = channel::unbounded();
        self.state.lock().endpoints.insert(addr, tx);
        MemoryEndpoint {
            addr,
            rx,
            network: self.clone(),
        }
    }

    /// Drop every datagram for which `filter` returns true
    pub fn set_drop_filter<F>(&self, filter: F)
    where
        F: Fn(&Datagram) -> bool + Send + Sync + 'static,
    {
        self.state.lock().filter = Some(Arc::new(filter));
    }

    pub fn clear_drop_filter(&self) {
        self.state.lock().filter = None;
    }

    pub fn stats(&self) -> NetworkStats {
        self.state.lock().stats
    }

    fn route(&self, datagram: Datagram) {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        if let Some(filter) = &state.filter {
            if filter(&datagram) {
                state.stats.dropped += 1;
                return;
            }
        }

        let delivered = match state.endpoints.get(&datagram.to) {
            Some(tx) => tx.send(datagram).is_ok(),
            None => false,
        };
        if delivered {
            state.stats.delivered += 1;
        } else {
            state.stats.unroutable += 1;
        }
    }

    fn detach(&self, addr: SocketAddr) {
        self.state.lock().endpoints.remove(&addr);
    }
}

/// One attached endpoint; detaches on drop
pub struct MemoryEndpoint {
    addr: SocketAddr,
    rx: Receiver<Datagram>,
    network: MemoryNetwork,
}

impl fmt::Debug for MemoryEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryEndpoint")
            .field("addr", &self.addr)
            .field("queued", &self.rx.len())
            .finish()
    }
}

impl MemoryEndpoint {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }
}

impl Transport for MemoryEndpoint {
    fn send_to(&self, buf: &[u8], target: SocketAddr) -> Result<usize, SocketError> {
        self.network.route(Datagram {
            from: self.addr,
            to: target,
            payload: Bytes::copy_from_slice(buf),
        });
        Ok(buf.len())
    }

    fn recv_timeout(
        &self,
        buf: &mut [u8],
        timeout: Duration,
    ) -> Result<Option<(usize, SocketAddr)>, SocketError> {
        match self.rx.recv_timeout(timeout) {
            Ok(datagram) => {
                // Truncate like a real socket would
                let n = datagram.payload.len().min(buf.len());
                buf[..n].copy_from_slice(&datagram.payload[..n]);
                Ok(Some((n, datagram.from)))
            }
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(SocketError::Closed),
        }
    }

    fn local_addr(&self) -> Result<SocketAddr, SocketError> {
        Ok(self.addr)
    }
}

impl Drop for MemoryEndpoint {
    fn drop(&mut self) {
        self.network.detach(self.addr);
    }
}
