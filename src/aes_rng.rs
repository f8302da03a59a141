//! RNG based on AES-128 in counter mode.
//!
//! Both parties of the half-gates protocol seed an [`AesRng`] with the same
//! block during the handshake and afterwards draw identical label streams
//! without further communication. On platforms with hardware AES this is
//! fast enough to never show up next to the network.

use aes::cipher::{generic_array::GenericArray, BlockEncrypt, KeyInit};
use aes::Aes128;
use rand::{CryptoRng, RngCore, SeedableRng};
use rand_core::block::{BlockRng, BlockRngCore};

/// Number of AES blocks encrypted per counter batch.
const CTR_BATCH: usize = 4;

/// A PRG running AES-128 over an incrementing counter.
#[derive(Clone)]
pub struct AesRng(BlockRng<AesRngCore>);

impl RngCore for AesRng {
    #[inline]
    fn next_u32(&mut self) -> u32 {
        self.0.next_u32()
    }

    #[inline]
    fn next_u64(&mut self) -> u64 {
        self.0.next_u64()
    }

    #[inline]
    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.0.fill_bytes(dest)
    }

    #[inline]
    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.0.try_fill_bytes(dest)
    }
}

impl SeedableRng for AesRng {
    type Seed = [u8; 16];

    #[inline]
    fn from_seed(seed: Self::Seed) -> Self {
        AesRng(BlockRng::<AesRngCore>::from_seed(seed))
    }
}

impl CryptoRng for AesRng {}

impl AesRng {
    /// Creates a generator from a fresh random seed.
    pub fn new() -> Self {
        AesRng::from_seed(rand::random())
    }
}

impl Default for AesRng {
    fn default() -> Self {
        Self::new()
    }
}

/// The counter-mode core driving [`AesRng`].
#[derive(Clone)]
pub struct AesRngCore {
    aes: Aes128,
    state: u128,
}

impl BlockRngCore for AesRngCore {
    type Item = u32;
    type Results = [u32; CTR_BATCH * 4];

    fn generate(&mut self, results: &mut Self::Results) {
        let mut blocks = [GenericArray::default(); CTR_BATCH];
        for block in blocks.iter_mut() {
            *block = GenericArray::from(self.state.to_le_bytes());
            self.state = self.state.wrapping_add(1);
        }
        self.aes.encrypt_blocks(&mut blocks);
        for (words, block) in results.chunks_exact_mut(4).zip(&blocks) {
            for (word, bytes) in words.iter_mut().zip(block.chunks_exact(4)) {
                *word = u32::from_le_bytes(bytes.try_into().expect("chunk is 4 bytes"));
            }
        }
    }
}

impl SeedableRng for AesRngCore {
    type Seed = [u8; 16];

    #[inline]
    fn from_seed(seed: Self::Seed) -> Self {
        AesRngCore {
            aes: Aes128::new(&seed.into()),
            state: 0,
        }
    }
}

impl std::fmt::Debug for AesRngCore {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "AesRngCore {{}}")
    }
}

impl std::fmt::Debug for AesRng {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "AesRng {{}}")
    }
}

#[cfg(test)]
mod tests {
    use rand::Rng;

    use super::*;
    use crate::block::Block;

    #[test]
    fn same_seed_same_stream() {
        let mut a = AesRng::from_seed([7; 16]);
        let mut b = AesRng::from_seed([7; 16]);
        for _ in 0..64 {
            assert_eq!(a.gen::<Block>(), b.gen::<Block>());
        }
    }

    #[test]
    fn different_draws_differ() {
        let mut rng = AesRng::new();
        let a: Block = rng.gen();
        let b: Block = rng.gen();
        assert_ne!(a, b);
    }

    #[test]
    fn uneven_fill() {
        // exercise the non-multiple-of-16 path of the block rng
        let mut rng = AesRng::from_seed([1; 16]);
        let mut buf = [0u8; 37];
        rng.fill_bytes(&mut buf);
        assert_ne!([0u8; 37], buf);
    }
}
