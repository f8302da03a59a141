//! The wire label arena.
//!
//! Wire addresses are virtual indices handed down by the upstream compiler,
//! which has already validated them against the arena size. There is no
//! bounds-check error surface here: an out-of-range address is a program
//! bug and panics.

use std::collections::TryReserveError;

use thiserror::Error;

/// Raised when the arena cannot be reserved up front.
#[derive(Debug, Error)]
#[error("failed to allocate {requested} wire slots")]
pub struct AllocError {
    requested: u64,
    #[source]
    source: TryReserveError,
}

/// Flat arena of `num_pages << page_shift` wire labels, exclusively owned
/// by the engine for its whole lifetime.
pub struct WireMemory<W> {
    wires: Vec<W>,
}

impl<W: Copy + Default> WireMemory<W> {
    /// Reserves the arena in one allocation.
    pub fn allocate(page_shift: u8, num_pages: u64) -> Result<Self, AllocError> {
        let requested = num_pages << page_shift;
        let mut wires = Vec::new();
        wires
            .try_reserve_exact(requested as usize)
            .map_err(|source| AllocError { requested, source })?;
        wires.resize(requested as usize, W::default());
        Ok(Self { wires })
    }

    /// Number of wire slots.
    pub fn len(&self) -> u64 {
        self.wires.len() as u64
    }

    /// Whether the arena has zero slots.
    pub fn is_empty(&self) -> bool {
        self.wires.is_empty()
    }

    /// The label at `addr`.
    #[inline]
    pub fn wire(&self, addr: u64) -> W {
        self.wires[addr as usize]
    }

    /// Stores `wire` at `addr`.
    #[inline]
    pub fn set_wire(&mut self, addr: u64, wire: W) {
        self.wires[addr as usize] = wire;
    }

    /// Mutable span of `width` consecutive labels starting at `addr`.
    #[inline]
    pub fn span_mut(&mut self, addr: u64, width: usize) -> &mut [W] {
        &mut self.wires[addr as usize..addr as usize + width]
    }

    /// Shared span of `width` consecutive labels starting at `addr`.
    #[inline]
    pub fn span(&self, addr: u64, width: usize) -> &[W] {
        &self.wires[addr as usize..addr as usize + width]
    }
}
