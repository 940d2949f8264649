//! Sequence Number Handling
//!
//! RFT sequence and acknowledgement numbers live in a modular space of
//! `MAX_SEQ_NUMBER + 1` values. The space is not a power of two, so every
//! advancement goes through an explicit modulo instead of a bit mask.

use std::fmt;
use std::ops::{Add, AddAssign, Sub};

/// Largest representable sequence/ack value
pub const MAX_SEQ_NUMBER: u32 = 102_400;

/// Size of the sequence space (`MAX_SEQ_NUMBER + 1`)
pub const SEQ_SPACE: u32 = MAX_SEQ_NUMBER + 1;

/// Sequence number with modular wraparound semantics
///
/// Both byte-offset sequence numbers and cumulative acknowledgement numbers
/// use this type. Ordering between two values is only meaningful as a
/// distance, see [`SeqNumber::distance_to`].
#[derive(Copy, Clone, Eq, PartialEq, Hash, Default)]
pub struct SeqNumber(u32);

impl SeqNumber {
    /// Create a new sequence number
    ///
    /// # Panics
    /// Panics if value exceeds MAX_SEQ_NUMBER
    pub fn new(value: u32) -> Self {
        assert!(
            value <= MAX_SEQ_NUMBER,
            "Sequence number {} exceeds maximum {}",
            value,
            MAX_SEQ_NUMBER
        );
        SeqNumber(value)
    }

    /// Create a sequence number, reducing the value into the sequence space
    #[inline]
    pub fn new_unchecked(value: u32) -> Self {
        SeqNumber(value % SEQ_SPACE)
    }

    /// Get the raw sequence number value
    #[inline]
    pub fn as_raw(self) -> u32 {
        self.0
    }

    /// Get the next sequence number
    #[inline]
    pub fn next(self) -> Self {
        self + 1
    }

    /// Advance by a byte offset of arbitrary size
    ///
    /// File offsets can exceed the sequence space; only the offset modulo the
    /// space matters.
    pub fn add_offset(self, offset: u64) -> Self {
        let reduced = (offset % u64::from(SEQ_SPACE)) as u32;
        self + reduced
    }

    /// Forward distance from this sequence number to `other`
    ///
    /// Always in `0..SEQ_SPACE`: the number of increments needed to reach
    /// `other` starting from `self`.
    pub fn distance_to(self, other: SeqNumber) -> u32 {
        if other.0 >= self.0 {
            other.0 - self.0
        } else {
            SEQ_SPACE - self.0 + other.0
        }
    }
}

impl fmt::Debug for SeqNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SeqNumber({})", self.0)
    }
}

impl fmt::Display for SeqNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for SeqNumber {
    fn from(value: u32) -> Self {
        SeqNumber::new_unchecked(value)
    }
}

impl From<SeqNumber> for u32 {
    fn from(seq: SeqNumber) -> u32 {
        seq.0
    }
}

impl Add<u32> for SeqNumber {
    type Output = SeqNumber;

    fn add(self, rhs: u32) -> SeqNumber {
        let sum = (u64::from(self.0) + u64::from(rhs)) % u64::from(SEQ_SPACE);
        SeqNumber(sum as u32)
    }
}

impl AddAssign<u32> for SeqNumber {
    fn add_assign(&mut self, rhs: u32) {
        *self = *self + rhs;
    }
}

impl Sub for SeqNumber {
    type Output = u32;

    /// Forward distance from `rhs` to `self`
    fn sub(self, rhs: SeqNumber) -> u32 {
        rhs.distance_to(self)
    }
}
