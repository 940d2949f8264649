//! UDP socket wrapper for RFT
//!
//! Built through socket2 so buffer sizes and address reuse can be set before
//! binding, then driven as a blocking std socket with a per-call read timeout.

use socket2::{Domain, Protocol, SockRef, Socket, Type};
use std::io::{self, ErrorKind};
use std::net::{SocketAddr, UdpSocket};
use std::time::Duration;
use thiserror::Error;

/// Socket errors
#[derive(Error, Debug)]
pub enum SocketError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Endpoint is closed")]
    Closed,
}

/// RFT socket wrapper
#[derive(Debug)]
pub struct RftSocket {
    inner: UdpSocket,
}

impl RftSocket {
    /// Create a new socket bound to the given address
    pub fn bind(addr: SocketAddr) -> Result<Self, SocketError> {
        let domain = if addr.is_ipv4() {
            Domain::IPV4
        } else {
            Domain::IPV6
        };

        let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_reuse_address(true)?;
        socket.bind(&addr.into())?;

        let inner: UdpSocket = socket.into();
        tracing::debug!(local = ?inner.local_addr().ok(), "bound UDP socket");

        Ok(RftSocket { inner })
    }

    /// Bind to an ephemeral port on the unspecified address of a family
    pub fn bind_any(ipv6: bool) -> Result<Self, SocketError> {
        let addr: SocketAddr = if ipv6 {
            (std::net::Ipv6Addr::UNSPECIFIED, 0).into()
        } else {
            (std::net::Ipv4Addr::UNSPECIFIED, 0).into()
        };
        Self::bind(addr)
    }

    /// Bind an ephemeral socket able to reach `peer`
    pub fn for_peer(peer: SocketAddr) -> Result<Self, SocketError> {
        Self::bind_any(peer.is_ipv6())
    }

    /// Set the receive buffer size
    pub fn set_recv_buffer_size(&self, size: usize) -> Result<(), SocketError> {
        SockRef::from(&self.inner).set_recv_buffer_size(size)?;
        Ok(())
    }

    /// Get the receive buffer size
    pub fn recv_buffer_size(&self) -> Result<usize, SocketError> {
        Ok(SockRef::from(&self.inner).recv_buffer_size()?)
    }

    /// Get the local address this socket is bound to
    pub fn local_addr(&self) -> Result<SocketAddr, SocketError> {
        Ok(self.inner.local_addr()?)
    }

    /// Send one datagram
    pub fn send_to(&self, buf: &[u8], target: SocketAddr) -> Result<usize, SocketError> {
        Ok(self.inner.send_to(buf, target)?)
    }

    /// Wait up to `timeout` for one datagram
    ///
    /// Returns `Ok(None)` when nothing arrived in time. A datagram longer
    /// than `buf` is truncated by the OS; size `buf` one byte past the largest
    /// valid datagram to detect that.
    pub fn recv_timeout(
        &self,
        buf: &mut [u8],
        timeout: Duration,
    ) -> Result<Option<(usize, SocketAddr)>, SocketError> {
        // A zero read timeout means "block forever" to the OS
        let timeout = timeout.max(Duration::from_millis(1));
        self.inner.set_read_timeout(Some(timeout))?;

        match self.inner.recv_from(buf) {
            Ok((n, addr)) => Ok(Some((n, addr))),
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => Ok(None),
            // ICMP port unreachable from an earlier send surfaces here on some platforms
            Err(e) if e.kind() == ErrorKind::ConnectionReset => Ok(None),
            Err(e) => Err(SocketError::Io(e)),
        }
    }
}
