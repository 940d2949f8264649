//! RFT - Reliable File Transfer over UDP
//!
//! High-level API: the sending [`Client`] and the multiplexing [`Server`],
//! generic over any [`Transport`](rft_io::Transport).

pub use rft_io as io;
pub use rft_protocol as protocol;

pub mod client;
pub mod error;
pub mod server;
pub mod storage;
pub mod timeouts;

pub use client::{Client, TransferReport};
pub use error::{ClientError, Phase, ServerError};
pub use server::{Server, ServerOptions, ServerOutcome, ServerStats};
pub use storage::{DirectoryStorage, MemoryStorage, Storage};
pub use timeouts::Timeouts;

// Re-export commonly used types
pub use protocol::{ConnectionId, EventSink, Packet, PacketEvent, SeqNumber};
