//! Bit-granular lengths and offsets.
//!
//! The bit, not the byte, is the unit of every length in the chunk model so
//! that protocols with sub-byte fields are represented exactly. A `Bits`
//! value can never be negative.

use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub, SubAssign};

use serde::{Deserialize, Serialize};
use static_assertions::assert_eq_size;

/// A non-negative number of bits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Bits(u64);

assert_eq_size!(Bits, u64);

impl Bits {
    pub const ZERO: Bits = Bits(0);

    pub const fn new(bits: u64) -> Self {
        Bits(bits)
    }

    pub const fn from_bytes(bytes: u64) -> Self {
        Bits(bytes * 8)
    }

    pub const fn get(self) -> u64 {
        self.0
    }

    /// Whole bytes contained in this length (rounds down).
    pub const fn bytes(self) -> u64 {
        self.0 / 8
    }

    /// Bytes needed to hold this many bits (rounds up).
    pub const fn byte_len(self) -> usize {
        self.0.div_ceil(8) as usize
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub const fn is_byte_aligned(self) -> bool {
        self.0 % 8 == 0
    }

    pub fn checked_sub(self, other: Bits) -> Option<Bits> {
        self.0.checked_sub(other.0).map(Bits)
    }

    pub fn saturating_sub(self, other: Bits) -> Bits {
        Bits(self.0.saturating_sub(other.0))
    }

    pub(crate) fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Bits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}b", self.0)
    }
}

impl Add for Bits {
    type Output = Bits;

    fn add(self, rhs: Bits) -> Bits {
        Bits(self.0 + rhs.0)
    }
}

impl AddAssign for Bits {
    fn add_assign(&mut self, rhs: Bits) {
        self.0 += rhs.0;
    }
}

impl Sub for Bits {
    type Output = Bits;

    fn sub(self, rhs: Bits) -> Bits {
        Bits(self.0 - rhs.0)
    }
}

impl SubAssign for Bits {
    fn sub_assign(&mut self, rhs: Bits) {
        self.0 -= rhs.0;
    }
}

impl Sum for Bits {
    fn sum<I: Iterator<Item = Bits>>(iter: I) -> Bits {
        iter.fold(Bits::ZERO, |total, length| total + length)
    }
}
