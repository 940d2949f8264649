//! RFT Packet Structures and Serialization
//!
//! Every datagram is a fixed 12-byte header followed by up to
//! [`MAX_PAYLOAD_SIZE`] bytes of file content. The header carries no length
//! field: the payload length of a received packet is the datagram length
//! minus [`HEADER_SIZE`].
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                        Sequence Number                        |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                     Acknowledgment Number                     |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |         Connection ID         |        Flags          |A|S|F|
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                       Payload (0..512) ...                    |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! All multi-byte fields are in network byte order.

use crate::sequence::SeqNumber;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::fmt;
use thiserror::Error;

/// Size of the RFT packet header in bytes
pub const HEADER_SIZE: usize = 12;

/// Maximum payload carried by one packet (the data unit)
pub const MAX_PAYLOAD_SIZE: usize = 512;

/// Header plus a full payload slot
pub const MAX_PACKET_SIZE: usize = HEADER_SIZE + MAX_PAYLOAD_SIZE;

/// Connection identifier assigned by the receiver
///
/// Zero is reserved for the very first SYN of a connection, before the
/// receiver has assigned an id.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ConnectionId(i16);

impl ConnectionId {
    /// The "not yet assigned" id carried by an initial SYN
    pub const UNASSIGNED: ConnectionId = ConnectionId(0);

    pub fn new(raw: i16) -> Self {
        ConnectionId(raw)
    }

    #[inline]
    pub fn as_raw(self) -> i16 {
        self.0
    }

    #[inline]
    pub fn is_assigned(self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Header flag bits
#[derive(Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct Flags(u16);

impl Flags {
    /// No flags: a plain data packet
    pub const NONE: Flags = Flags(0);
    /// Finish, bit 0
    pub const FIN: Flags = Flags(1 << 0);
    /// Synchronise, bit 1
    pub const SYN: Flags = Flags(1 << 1);
    /// Acknowledgement, bit 2
    pub const ACK: Flags = Flags(1 << 2);

    const KNOWN: u16 = 0b111;

    /// Parse flags from the raw header field
    ///
    /// Unknown bits are ignored.
    pub fn from_bits(raw: u16) -> Self {
        Flags(raw & Self::KNOWN)
    }

    /// Build flags from the three individual bits
    pub fn from_parts(ack: bool, syn: bool, fin: bool) -> Self {
        let mut flags = Flags::NONE;
        if ack {
            flags |= Flags::ACK;
        }
        if syn {
            flags |= Flags::SYN;
        }
        if fin {
            flags |= Flags::FIN;
        }
        flags
    }

    #[inline]
    pub fn bits(self) -> u16 {
        self.0
    }

    #[inline]
    pub fn contains(self, other: Flags) -> bool {
        self.0 & other.0 == other.0
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl std::ops::BitOr for Flags {
    type Output = Flags;

    fn bitor(self, rhs: Flags) -> Flags {
        Flags(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for Flags {
    fn bitor_assign(&mut self, rhs: Flags) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for Flags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Flags({})", self)
    }
}

/// Space-separated flag names in ACK, SYN, FIN order
impl fmt::Display for Flags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (flag, name) in [(Flags::ACK, "ACK"), (Flags::SYN, "SYN"), (Flags::FIN, "FIN")] {
            if self.contains(flag) {
                if !first {
                    f.write_str(" ")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        Ok(())
    }
}

/// Fixed 12-byte packet header
///
/// Sequence and ack fields are kept as received; use
/// [`Packet::seq_number`] and [`Packet::ack_number`] for values reduced into
/// the sequence space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    pub seq: u32,
    pub ack: u32,
    pub connection_id: ConnectionId,
    pub flags: Flags,
}

impl PacketHeader {
    /// Parse header from bytes (network byte order)
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PacketError> {
        if bytes.len() < HEADER_SIZE {
            return Err(PacketError::InsufficientData {
                expected: HEADER_SIZE,
                actual: bytes.len(),
            });
        }

        let mut buf = &bytes[..HEADER_SIZE];
        Ok(PacketHeader {
            seq: buf.get_u32(),
            ack: buf.get_u32(),
            connection_id: ConnectionId(buf.get_i16()),
            flags: Flags::from_bits(buf.get_u16()),
        })
    }

    /// Serialize header to bytes (network byte order)
    pub fn to_bytes(&self, buf: &mut impl BufMut) {
        buf.put_u32(self.seq);
        buf.put_u32(self.ack);
        buf.put_i16(self.connection_id.0);
        buf.put_u16(self.flags.0);
    }
}

/// A decoded RFT packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub header: PacketHeader,
    pub payload: Bytes,
}

impl Packet {
    /// Create a packet, rejecting oversized payloads
    pub fn new(
        seq: SeqNumber,
        ack: SeqNumber,
        connection_id: ConnectionId,
        flags: Flags,
        payload: Bytes,
    ) -> Result<Self, PacketError> {
        if payload.len() > MAX_PAYLOAD_SIZE {
            return Err(PacketError::PayloadTooLarge {
                size: payload.len(),
                max: MAX_PAYLOAD_SIZE,
            });
        }

        Ok(Packet {
            header: PacketHeader {
                seq: seq.as_raw(),
                ack: ack.as_raw(),
                connection_id,
                flags,
            },
            payload,
        })
    }

    /// Create a payload-less control packet
    pub fn control(
        seq: SeqNumber,
        ack: SeqNumber,
        connection_id: ConnectionId,
        flags: Flags,
    ) -> Self {
        Packet {
            header: PacketHeader {
                seq: seq.as_raw(),
                ack: ack.as_raw(),
                connection_id,
                flags,
            },
            payload: Bytes::new(),
        }
    }

    /// Create a data packet (no flags, ack field zero)
    pub fn data(
        seq: SeqNumber,
        connection_id: ConnectionId,
        payload: Bytes,
    ) -> Result<Self, PacketError> {
        Packet::new(seq, SeqNumber::default(), connection_id, Flags::NONE, payload)
    }

    pub fn seq_number(&self) -> SeqNumber {
        SeqNumber::new_unchecked(self.header.seq)
    }

    pub fn ack_number(&self) -> SeqNumber {
        SeqNumber::new_unchecked(self.header.ack)
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.header.connection_id
    }

    pub fn flags(&self) -> Flags {
        self.header.flags
    }

    #[inline]
    pub fn is_ack(&self) -> bool {
        self.header.flags.contains(Flags::ACK)
    }

    #[inline]
    pub fn is_syn(&self) -> bool {
        self.header.flags.contains(Flags::SYN)
    }

    #[inline]
    pub fn is_fin(&self) -> bool {
        self.header.flags.contains(Flags::FIN)
    }

    /// A plain data packet carries no flags at all
    #[inline]
    pub fn is_data(&self) -> bool {
        self.header.flags.is_empty()
    }

    pub fn payload_len(&self) -> usize {
        self.payload.len()
    }

    /// Datagram size on the wire (header + payload)
    pub fn size(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }

    /// Serialize the packet into a datagram (header + payload)
    pub fn to_bytes(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(self.size());
        self.header.to_bytes(&mut buf);
        buf.put_slice(&self.payload);
        buf
    }

    /// Serialize into a fixed-size wire buffer
    ///
    /// The payload slot is zero-filled past the payload. Returns the number
    /// of bytes that make up the datagram.
    pub fn encode_into(&self, buf: &mut [u8; MAX_PACKET_SIZE]) -> Result<usize, PacketError> {
        if self.payload.len() > MAX_PAYLOAD_SIZE {
            return Err(PacketError::PayloadTooLarge {
                size: self.payload.len(),
                max: MAX_PAYLOAD_SIZE,
            });
        }

        buf.fill(0);
        let mut cursor = &mut buf[..];
        self.header.to_bytes(&mut cursor);
        cursor.put_slice(&self.payload);
        Ok(self.size())
    }

    /// Parse a packet from a received datagram
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PacketError> {
        let header = PacketHeader::from_bytes(bytes)?;

        let payload_len = bytes.len() - HEADER_SIZE;
        if payload_len > MAX_PAYLOAD_SIZE {
            return Err(PacketError::PayloadTooLarge {
                size: payload_len,
                max: MAX_PAYLOAD_SIZE,
            });
        }

        let payload = if payload_len > 0 {
            Bytes::copy_from_slice(&bytes[HEADER_SIZE..])
        } else {
            Bytes::new()
        };

        Ok(Packet { header, payload })
    }
}

/// Packet parsing and validation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PacketError {
    #[error("Insufficient data: expected {expected} bytes, got {actual}")]
    InsufficientData { expected: usize, actual: usize },

    #[error("Payload too large: {size} bytes (max {max})")]
    PayloadTooLarge { size: usize, max: usize },
}
