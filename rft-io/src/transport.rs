//! Datagram transport abstraction
//!
//! The role drivers only need three things from the network: send one
//! datagram, wait a bounded time for one datagram, and know their own
//! address. [`RftSocket`] provides them over real UDP and
//! [`MemoryEndpoint`](crate::memory::MemoryEndpoint) in-process.

use crate::socket::{RftSocket, SocketError};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

/// An unreliable, unordered datagram transport
pub trait Transport {
    /// Send one datagram to `target`
    fn send_to(&self, buf: &[u8], target: SocketAddr) -> Result<usize, SocketError>;

    /// Wait up to `timeout` for one datagram
    ///
    /// `Ok(None)` means the wait elapsed with nothing received.
    fn recv_timeout(
        &self,
        buf: &mut [u8],
        timeout: Duration,
    ) -> Result<Option<(usize, SocketAddr)>, SocketError>;

    fn local_addr(&self) -> Result<SocketAddr, SocketError>;
}

impl Transport for RftSocket {
    fn send_to(&self, buf: &[u8], target: SocketAddr) -> Result<usize, SocketError> {
        RftSocket::send_to(self, buf, target)
    }

    fn recv_timeout(
        &self,
        buf: &mut [u8],
        timeout: Duration,
    ) -> Result<Option<(usize, SocketAddr)>, SocketError> {
        RftSocket::recv_timeout(self, buf, timeout)
    }

    fn local_addr(&self) -> Result<SocketAddr, SocketError> {
        RftSocket::local_addr(self)
    }
}

impl<T: Transport + ?Sized> Transport for &T {
    fn send_to(&self, buf: &[u8], target: SocketAddr) -> Result<usize, SocketError> {
        (**self).send_to(buf, target)
    }

    fn recv_timeout(
        &self,
        buf: &mut [u8],
        timeout: Duration,
    ) -> Result<Option<(usize, SocketAddr)>, SocketError> {
        (**self).recv_timeout(buf, timeout)
    }

    fn local_addr(&self) -> Result<SocketAddr, SocketError> {
        (**self).local_addr()
    }
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn send_to(&self, buf: &[u8], target: SocketAddr) -> Result<usize, SocketError> {
        (**self).send_to(buf, target)
    }

    fn recv_timeout(
        &self,
        buf: &mut [u8],
        timeout: Duration,
    ) -> Result<Option<(usize, SocketAddr)>, SocketError> {
        (**self).recv_timeout(buf, timeout)
    }

    fn local_addr(&self) -> Result<SocketAddr, SocketError> {
        (**self).local_addr()
    }
}
