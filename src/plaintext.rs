//! Cleartext backend: wires are plain bits.
//!
//! Used for local runs and as the reference semantics the garbled backend
//! is tested against. Input bits come from a bit stream, output bits go
//! straight to another one.

use std::io::{self, Read, Write};

use crate::bitfile::{BitReader, BitWriter};
use crate::protocol::Protocol;

/// The cleartext protocol backend.
pub struct Plaintext<R: Read, W: Write> {
    input: BitReader<R>,
    output: BitWriter<W>,
    failure: Option<io::Error>,
}

impl<R: Read, W: Write> Plaintext<R, W> {
    /// Creates a backend reading input bits from `input` and writing
    /// decoded output bits to `output`.
    pub fn new(input: BitReader<R>, output: BitWriter<W>) -> Self {
        Self {
            input,
            output,
            failure: None,
        }
    }

    fn latch(&mut self, e: io::Error) {
        if self.failure.is_none() {
            self.failure = Some(e);
        }
    }

    /// Flushes the output stream and reports the first failure latched
    /// during execution, returning the output sink on success.
    pub fn finish(mut self) -> io::Result<W> {
        if let Some(e) = self.failure.take() {
            return Err(e);
        }
        self.output.into_inner()
    }
}

impl<R: Read, W: Write> Protocol for Plaintext<R, W> {
    type Wire = bool;

    fn zero(&mut self) -> bool {
        false
    }

    fn one(&mut self) -> bool {
        true
    }

    fn op_copy(&mut self, a: bool) -> bool {
        a
    }

    fn op_not(&mut self, a: bool) -> bool {
        !a
    }

    fn op_xor(&mut self, a: bool, b: bool) -> bool {
        a ^ b
    }

    fn op_xnor(&mut self, a: bool, b: bool) -> bool {
        !(a ^ b)
    }

    fn op_and(&mut self, a: bool, b: bool) -> bool {
        a & b
    }

    fn input(&mut self, data: &mut [bool]) {
        for slot in data {
            *slot = match self.input.read_bit() {
                Ok(bit) => bit,
                Err(e) => {
                    self.latch(e);
                    false
                }
            };
        }
    }

    fn output(&mut self, data: &[bool]) {
        for &bit in data {
            if let Err(e) = self.output.write_bit(bit) {
                self.latch(e);
            }
        }
    }
}
