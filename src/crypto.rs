//! Multi-instance tweakable correlation-robust hashing (MiTCCRH).
//!
//! Each AND gate of the half-gates protocol masks its labels with hashes
//! under short-lived AES keys. Both parties derive the same key schedule
//! from a shared start point and the AND-gate counter, so rekeying stays
//! synchronized without any extra messages.

use aes::cipher::{BlockEncrypt, KeyInit};
use aes::Aes128;

use crate::block::Block;

/// Number of scheduled keys per batch. Every AND gate consumes two keys,
/// so both sides renew the schedule every `KS_BATCH_N / 2` gates.
pub(crate) const KS_BATCH_N: usize = 8;

/// Batched tweakable correlation-robust hash.
pub(crate) struct Mitccrh {
    start_point: Block,
    keys: [Aes128; KS_BATCH_N],
    key_used: usize,
}

impl Mitccrh {
    /// Creates a hash instance; the first gate forces a key schedule.
    pub(crate) fn new(start_point: Block) -> Self {
        Self {
            start_point,
            keys: std::array::from_fn(|_| Aes128::new(&[0u8; 16].into())),
            key_used: KS_BATCH_N,
        }
    }

    /// Whether the current batch is exhausted and [`Mitccrh::renew_ks`]
    /// must run before the next hash.
    #[inline]
    pub(crate) fn needs_rekey(&self) -> bool {
        self.key_used == KS_BATCH_N
    }

    /// Derives a fresh key batch from the shared start point and the
    /// AND-gate counter `gid`.
    pub(crate) fn renew_ks(&mut self, gid: u64) {
        for (i, key) in self.keys.iter_mut().enumerate() {
            let tweak = self.start_point ^ Block::pack(gid, i as u64);
            *key = Aes128::new(&tweak.to_bytes().into());
        }
        self.key_used = 0;
    }

    /// Hashes the four garbler inputs, the first two under one key, the
    /// last two under the next.
    pub(crate) fn k2_h4(&mut self, x: [Block; 4]) -> [Block; 4] {
        debug_assert!(!self.needs_rekey());
        let out = [
            cr_hash(&self.keys[self.key_used], x[0]),
            cr_hash(&self.keys[self.key_used], x[1]),
            cr_hash(&self.keys[self.key_used + 1], x[2]),
            cr_hash(&self.keys[self.key_used + 1], x[3]),
        ];
        self.key_used += 2;
        out
    }

    /// Hashes the two evaluator inputs under the same key pair the garbler
    /// used for the corresponding gate.
    pub(crate) fn k2_h2(&mut self, x: [Block; 2]) -> [Block; 2] {
        debug_assert!(!self.needs_rekey());
        let out = [
            cr_hash(&self.keys[self.key_used], x[0]),
            cr_hash(&self.keys[self.key_used + 1], x[1]),
        ];
        self.key_used += 2;
        out
    }
}

/// `π_k(x) ⊕ x`, correlation-robust under the fixed-key AES assumption.
#[inline]
fn cr_hash(aes: &Aes128, x: Block) -> Block {
    let mut bytes = x.to_bytes();
    aes.encrypt_block((&mut bytes).into());
    Block::new(bytes) ^ x
}
