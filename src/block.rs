//! A 128-bit [`Block`], the unit all wire labels are made of.

use std::fmt;
use std::ops::{BitAnd, BitAndAssign, BitOr, BitOrAssign, BitXor, BitXorAssign, Not};

use rand::{
    distributions::{Distribution, Standard},
    Rng,
};
use serde::{Deserialize, Serialize};
use subtle::{Choice, ConditionallySelectable};
use thiserror::Error;

/// A 128-bit block.
///
/// The engine treats blocks as opaque; only the protocol backends look at
/// their bits. On the wire a block is its 16 bytes in little-endian order.
#[derive(Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Block(u128);

impl Block {
    /// All bits set to 0.
    pub const ZERO: Self = Self(0);
    /// Only the least significant bit set.
    pub const ONE: Self = Self(1);
    /// All bits set to 1.
    pub const ONES: Self = Self(u128::MAX);

    /// Number of bytes in a block.
    pub const BYTES: usize = 16;

    /// Creates a block from its 16 little-endian bytes.
    #[inline]
    pub const fn new(bytes: [u8; 16]) -> Self {
        Self(u128::from_le_bytes(bytes))
    }

    /// Packs two `u64` halves into a block, `low` in the low 64 bits.
    #[inline]
    pub const fn pack(low: u64, high: u64) -> Self {
        Self((low as u128) | ((high as u128) << 64))
    }

    /// The 16 bytes of the block in little-endian order.
    #[inline]
    pub const fn to_bytes(self) -> [u8; 16] {
        self.0.to_le_bytes()
    }

    /// Low 64 bits.
    #[inline]
    pub const fn low(self) -> u64 {
        self.0 as u64
    }

    /// High 64 bits.
    #[inline]
    pub const fn high(self) -> u64 {
        (self.0 >> 64) as u64
    }

    /// Least significant bit.
    #[inline]
    pub const fn lsb(self) -> bool {
        self.0 & 1 == 1
    }

    /// Copy of the block with the least significant bit forced to 1.
    #[inline]
    pub const fn with_lsb_set(self) -> Self {
        Self(self.0 | 1)
    }

    /// Computes `self * b` for a boolean `b` in constant time: `self` if
    /// `b` is set, [`Block::ZERO`] otherwise.
    #[inline]
    pub fn const_mul(self, b: bool) -> Self {
        Self::conditional_select(&Self::ZERO, &self, Choice::from(u8::from(b)))
    }
}

impl BitXor for Block {
    type Output = Self;

    #[inline]
    fn bitxor(self, rhs: Self) -> Self {
        Self(self.0 ^ rhs.0)
    }
}

impl BitXorAssign for Block {
    #[inline]
    fn bitxor_assign(&mut self, rhs: Self) {
        self.0 ^= rhs.0;
    }
}

impl BitAnd for Block {
    type Output = Self;

    #[inline]
    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl BitAndAssign for Block {
    #[inline]
    fn bitand_assign(&mut self, rhs: Self) {
        self.0 &= rhs.0;
    }
}

impl BitOr for Block {
    type Output = Self;

    #[inline]
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for Block {
    #[inline]
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl Not for Block {
    type Output = Self;

    #[inline]
    fn not(self) -> Self {
        Self(!self.0)
    }
}

impl ConditionallySelectable for Block {
    #[inline]
    fn conditional_select(a: &Self, b: &Self, choice: Choice) -> Self {
        // choice = 0 -> mask = 0000...0000, choice = 1 -> mask = 1111...1111
        let mask = (-(choice.unwrap_u8() as i128)) as u128;
        Self(a.0 ^ (mask & (a.0 ^ b.0)))
    }
}

impl Distribution<Block> for Standard {
    #[inline]
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Block {
        let mut bytes = [0u8; 16];
        rng.fill_bytes(&mut bytes);
        Block::new(bytes)
    }
}

impl From<u128> for Block {
    #[inline]
    fn from(value: u128) -> Self {
        Self(value)
    }
}

impl From<Block> for u128 {
    #[inline]
    fn from(value: Block) -> Self {
        value.0
    }
}

impl From<[u8; 16]> for Block {
    #[inline]
    fn from(bytes: [u8; 16]) -> Self {
        Self::new(bytes)
    }
}

impl From<Block> for [u8; 16] {
    #[inline]
    fn from(value: Block) -> Self {
        value.to_bytes()
    }
}

/// Raised when converting a slice of the wrong length into a [`Block`].
#[derive(Debug, Error)]
#[error("slice must have length of 16")]
pub struct WrongLength;

impl TryFrom<&[u8]> for Block {
    type Error = WrongLength;

    #[inline]
    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        let arr: [u8; 16] = value.try_into().map_err(|_| WrongLength)?;
        Ok(Self::new(arr))
    }
}

impl fmt::Debug for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Block({:#034x})", self.0)
    }
}

impl fmt::LowerHex for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.0, f)
    }
}

#[cfg(test)]
mod tests {
    use subtle::{Choice, ConditionallySelectable};

    use super::Block;

    #[test]
    fn pack_low_high() {
        let b = Block::pack(42, 123);
        assert_eq!(42, b.low());
        assert_eq!(123, b.high());
    }

    #[test]
    fn byte_round_trip() {
        let b = Block::from(0x0123_4567_89ab_cdef_u128);
        assert_eq!(b, Block::new(b.to_bytes()));
        assert_eq!(1, b.to_bytes()[8]);
    }

    #[test]
    fn lsb_forcing() {
        assert!(!Block::pack(2, 0).lsb());
        assert!(Block::pack(2, 0).with_lsb_set().lsb());
        assert_eq!(Block::ONE, Block::ZERO.with_lsb_set());
    }

    #[test]
    fn conditional_select() {
        let choice = Choice::from(0);
        assert_eq!(
            Block::ZERO,
            Block::conditional_select(&Block::ZERO, &Block::ONES, choice)
        );
        let choice = Choice::from(1);
        assert_eq!(
            Block::ONES,
            Block::conditional_select(&Block::ZERO, &Block::ONES, choice)
        );
    }

    #[test]
    fn const_mul_masks() {
        let b = Block::pack(0xdead, 0xbeef);
        assert_eq!(b, b.const_mul(true));
        assert_eq!(Block::ZERO, b.const_mul(false));
    }
}
