//! The two-party half-gates garbled circuit backend.
//!
//! Two roles share one reliable ordered byte channel. The garbler owns the
//! global free-XOR offset `delta` and garbles every AND gate into two
//! ciphertext blocks; the evaluator consumes them blindly. Linear gates
//! (XOR, XNOR, NOT, COPY, constants) are free on both sides: the two
//! labels of any wire differ by `delta`, so XOR of labels is XOR of bits.
//!
//! The byte stream is fixed by the program: `start_point` and `input_seed`
//! during the handshake, two table blocks per AND gate in program order,
//! and finally one byte per output wire flowing back from the evaluator.
//! Any deviation means a corrupted stream; failures latch inside the role
//! and surface once from `finish`.

use std::io::{self, Read, Write};

use rand::{Rng, SeedableRng};
use thiserror::Error;
use tracing::debug;

use crate::aes_rng::AesRng;
use crate::bitfile::{BitReader, BitWriter};
use crate::block::Block;
use crate::channel::{self, Channel};
use crate::crypto::Mitccrh;
use crate::protocol::Protocol;

/// Seed of the deterministic PRG both roles draw the public-constant
/// labels from. The value is arbitrary but must match on both sides.
const PUBLIC_LABEL_SEED: [u8; 16] = 0x97cc_1c83_3a28_69e2_8d13_55a7_02f5_60d4_u128.to_le_bytes();

/// A fatal session failure, reported once at teardown.
#[derive(Debug, Error)]
pub enum Error {
    /// The peer channel broke mid-session.
    #[error("peer channel failed: {0}")]
    Channel(#[from] channel::Error),
    /// The input bit stream ended early or failed.
    #[error("input bit stream failed: {0}")]
    InputBits(#[source] io::Error),
    /// The output bit stream could not be written.
    #[error("output bit stream failed: {0}")]
    OutputBits(#[source] io::Error),
}

/// Labels of the public constants 0 and 1, before the garbler folds
/// `delta` into the 1-label. Two fixed-key draws, constant 1 first.
fn public_labels() -> [Block; 2] {
    let mut prg = AesRng::from_seed(PUBLIC_LABEL_SEED);
    let one: Block = prg.gen();
    let zero: Block = prg.gen();
    [zero, one]
}

/// The garbling role.
///
/// Holds the free-XOR offset, garbles AND gates into the channel, records
/// output label LSBs and decodes the evaluator's report into plaintext
/// bits at teardown.
pub struct HalfGatesGarbler<C: Channel, R: Read, W: Write> {
    channel: C,
    input_bits: BitReader<R>,
    output_bits: BitWriter<W>,
    delta: Block,
    public: [Block; 2],
    shared_prg: AesRng,
    mitccrh: Mitccrh,
    global_id: u64,
    output_label_lsbs: Vec<bool>,
    failure: Option<Error>,
}

impl<C: Channel, R: Read, W: Write> HalfGatesGarbler<C, R, W> {
    /// Runs the construction handshake: draws `delta` (LSB forced to 1)
    /// and the public-constant labels, then sends `start_point` and
    /// `input_seed` and flushes so the evaluator can come up.
    pub fn new(
        mut channel: C,
        input_bits: BitReader<R>,
        output_bits: BitWriter<W>,
    ) -> Result<Self, Error> {
        let mut boot = AesRng::new();
        let delta = boot.gen::<Block>().with_lsb_set();
        let mut public = public_labels();
        public[1] ^= delta;

        let start_point: Block = boot.gen();
        let mitccrh = Mitccrh::new(start_point);
        channel.send_block(start_point)?;

        let input_seed: Block = boot.gen();
        channel.send_block(input_seed)?;
        let shared_prg = AesRng::from_seed(input_seed.to_bytes());
        // load-bearing: the evaluator blocks on these blocks before its
        // first gate
        channel.flush()?;
        debug!("garbler handshake complete");

        Ok(Self {
            channel,
            input_bits,
            output_bits,
            delta,
            public,
            shared_prg,
            mitccrh,
            global_id: 0,
            output_label_lsbs: Vec::new(),
            failure: None,
        })
    }

    fn latch(&mut self, e: Error) {
        if self.failure.is_none() {
            self.failure = Some(e);
        }
    }

    fn send_table_block(&mut self, block: Block) {
        if self.failure.is_some() {
            return;
        }
        if let Err(e) = self.channel.send_block(block) {
            self.latch(e.into());
        }
    }

    /// Tears the session down: flushes the gate stream, reads the
    /// evaluator's LSB report and writes the decoded plaintext bits to
    /// the output bit stream, in output declaration order. Returns the
    /// output sink.
    pub fn finish(mut self) -> Result<W, Error> {
        if let Some(e) = self.failure.take() {
            return Err(e);
        }
        // otherwise the evaluator never sees the last gates and both
        // sides deadlock
        self.channel.flush()?;
        for i in 0..self.output_label_lsbs.len() {
            let evaluator_lsb = self.channel.recv_byte()? & 1 == 1;
            let bit = self.output_label_lsbs[i] ^ evaluator_lsb;
            self.output_bits.write_bit(bit).map_err(Error::OutputBits)?;
        }
        debug!(
            output_bits = self.output_label_lsbs.len(),
            and_gates = self.global_id,
            "garbler session complete"
        );
        self.output_bits.into_inner().map_err(Error::OutputBits)
    }
}

impl<C: Channel, R: Read, W: Write> Protocol for HalfGatesGarbler<C, R, W> {
    type Wire = Block;

    fn zero(&mut self) -> Block {
        self.public[0]
    }

    fn one(&mut self) -> Block {
        self.public[1]
    }

    fn op_copy(&mut self, a: Block) -> Block {
        a
    }

    fn op_not(&mut self, a: Block) -> Block {
        a ^ self.public[1]
    }

    fn op_xor(&mut self, a: Block, b: Block) -> Block {
        a ^ b
    }

    fn op_xnor(&mut self, a: Block, b: Block) -> Block {
        a ^ b ^ self.public[1]
    }

    fn op_and(&mut self, a: Block, b: Block) -> Block {
        let pa = a.lsb();
        let pb = b.lsb();
        if self.mitccrh.needs_rekey() {
            self.mitccrh.renew_ks(self.global_id);
        }
        let h = self.mitccrh.k2_h4([a, a ^ self.delta, b, b ^ self.delta]);

        let table0 = h[0] ^ h[1] ^ self.delta.const_mul(pb);
        let mut w0 = h[0] ^ table0.const_mul(pa);
        let tmp = h[2] ^ h[3];
        let table1 = tmp ^ a;
        w0 ^= h[2] ^ tmp.const_mul(pb);

        self.send_table_block(table0);
        self.send_table_block(table1);
        self.global_id += 1;
        w0
    }

    fn input(&mut self, data: &mut [Block]) {
        for slot in data {
            let label: Block = self.shared_prg.gen();
            *slot = match self.input_bits.read_bit() {
                Ok(true) => label ^ self.delta,
                Ok(false) => label,
                Err(e) => {
                    self.latch(Error::InputBits(e));
                    label
                }
            };
        }
    }

    fn output(&mut self, data: &[Block]) {
        self.output_label_lsbs.extend(data.iter().map(|w| w.lsb()));
    }
}

/// The evaluating role.
///
/// Receives the handshake blocks, evaluates AND gates from the garbler's
/// tables and ships the LSB of every output label back.
pub struct HalfGatesEvaluator<C: Channel> {
    channel: C,
    public: [Block; 2],
    shared_prg: AesRng,
    mitccrh: Mitccrh,
    global_id: u64,
    output_bytes: u64,
    failure: Option<Error>,
}

impl<C: Channel> HalfGatesEvaluator<C> {
    /// Mirrors the garbler's handshake: same public-constant draws (no
    /// `delta` on this side), then `start_point` and `input_seed` from
    /// the channel.
    pub fn new(mut channel: C) -> Result<Self, Error> {
        let public = public_labels();
        let start_point = channel.recv_block()?;
        let mitccrh = Mitccrh::new(start_point);
        let input_seed = channel.recv_block()?;
        let shared_prg = AesRng::from_seed(input_seed.to_bytes());
        debug!("evaluator handshake complete");

        Ok(Self {
            channel,
            public,
            shared_prg,
            mitccrh,
            global_id: 0,
            output_bytes: 0,
            failure: None,
        })
    }

    fn latch(&mut self, e: Error) {
        if self.failure.is_none() {
            self.failure = Some(e);
        }
    }

    fn recv_table_block(&mut self) -> Block {
        if self.failure.is_some() {
            return Block::ZERO;
        }
        match self.channel.recv_block() {
            Ok(block) => block,
            Err(e) => {
                self.latch(e.into());
                Block::ZERO
            }
        }
    }

    /// Tears the session down, flushing the buffered output-label LSBs to
    /// the garbler.
    pub fn finish(mut self) -> Result<(), Error> {
        if let Some(e) = self.failure.take() {
            return Err(e);
        }
        self.channel.flush()?;
        debug!(
            output_bits = self.output_bytes,
            and_gates = self.global_id,
            "evaluator session complete"
        );
        Ok(())
    }
}

impl<C: Channel> Protocol for HalfGatesEvaluator<C> {
    type Wire = Block;

    fn zero(&mut self) -> Block {
        self.public[0]
    }

    fn one(&mut self) -> Block {
        self.public[1]
    }

    fn op_copy(&mut self, a: Block) -> Block {
        a
    }

    fn op_not(&mut self, a: Block) -> Block {
        a ^ self.public[1]
    }

    fn op_xor(&mut self, a: Block, b: Block) -> Block {
        a ^ b
    }

    fn op_xnor(&mut self, a: Block, b: Block) -> Block {
        a ^ b ^ self.public[1]
    }

    fn op_and(&mut self, a: Block, b: Block) -> Block {
        if self.mitccrh.needs_rekey() {
            self.mitccrh.renew_ks(self.global_id);
        }
        let table0 = self.recv_table_block();
        let table1 = self.recv_table_block();

        let sa = a.lsb();
        let sb = b.lsb();
        let h = self.mitccrh.k2_h2([a, b]);
        let mut w = h[0] ^ h[1];
        if sa {
            w ^= table0;
        }
        if sb {
            w ^= table1 ^ a;
        }
        self.global_id += 1;
        w
    }

    fn input(&mut self, data: &mut [Block]) {
        // the evaluator's view of the garbler's input: the same labels the
        // garbler drew, without the delta offset
        for slot in data {
            *slot = self.shared_prg.gen();
        }
    }

    fn output(&mut self, data: &[Block]) {
        for wire in data {
            self.output_bytes += 1;
            if self.failure.is_some() {
                continue;
            }
            if let Err(e) = self.channel.send_byte(u8::from(wire.lsb())) {
                self.latch(e.into());
            }
        }
    }
}
