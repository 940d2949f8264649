//! RFT I/O and Platform Abstraction
//!
//! This crate provides the datagram plumbing the role drivers run on: a UDP
//! socket with bounded receive polls, the [`Transport`] trait the drivers are
//! generic over, an in-process lossy network for tests and simulations, and
//! deadline and cancellation utilities.

pub mod memory;
pub mod socket;
pub mod time;
pub mod transport;

pub use memory::{Datagram, MemoryEndpoint, MemoryNetwork, NetworkStats};
pub use socket::{RftSocket, SocketError};
pub use time::{Deadline, StopSignal};
pub use transport::Transport;
