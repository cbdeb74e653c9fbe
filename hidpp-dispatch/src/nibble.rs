//! A very simple u4/nibble implementation.
//!
//! The HID++2.0 header packs the function ID and the software ID into a single
//! byte, one nibble each.

/// Represents an unsigned 4-bit value (nibble) encoded as a byte.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct U4(u8);

impl U4 {
    /// The largest value a nibble can hold.
    pub const MAX: U4 = U4(0x0f);

    /// Constructs a nibble from a value, returning [`None`] if it does not fit
    /// into 4 bits.
    pub fn new(value: u8) -> Option<Self> {
        (value <= Self::MAX.0).then_some(Self(value))
    }

    /// Constructs a nibble from the 4 low/rightmost bits of a byte.
    pub fn from_lo(raw: u8) -> Self {
        Self(raw & 0x0f)
    }

    /// Constructs a nibble from the 4 high/leftmost bits of a byte.
    pub fn from_hi(raw: u8) -> Self {
        Self(raw >> 4)
    }

    /// Returns the plain value of the nibble.
    pub fn value(self) -> u8 {
        self.0
    }

    /// Constructs a byte with the nibble set as the 4 high/leftmost bits.
    pub fn to_hi(self) -> u8 {
        self.0 << 4
    }

    /// Splits a byte into its high and low nibble.
    pub fn split(raw: u8) -> (Self, Self) {
        (Self::from_hi(raw), Self::from_lo(raw))
    }
}

/// Combines two nibbles to a byte, with `hi` being set to the 4 leftmost and
/// `lo` being set to the 4 rightmost bits.
pub fn combine(hi: U4, lo: U4) -> u8 {
    hi.to_hi() | lo.value()
}
