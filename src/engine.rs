//! Opcode dispatch and multi-bit circuit synthesis.
//!
//! The engine walks a packed instruction stream in program order and
//! expands every instruction into a fixed sequence of gate operations on
//! the backend. Bit 0 of every operand is the LSB. Operand spans may
//! overlap the output span; the handlers below perform every wire read at
//! exactly the point the circuit definition reads it, so aliased spans
//! observe the intended sequence of values. In a few places that forces a
//! re-read of a wire that was just written; those spots are marked.

use tracing::debug;

use crate::instruction::{DecodeError, InstrView, OpCode};
use crate::memory::WireMemory;
use crate::protocol::Protocol;

/// Executes packed physical programs against a protocol backend.
pub struct Engine<P: Protocol> {
    protocol: P,
    memory: WireMemory<P::Wire>,
}

impl<P: Protocol> Engine<P> {
    /// Creates an engine owning `memory` for the lifetime of the run.
    pub fn new(protocol: P, memory: WireMemory<P::Wire>) -> Self {
        Self { protocol, memory }
    }

    /// The wire arena.
    pub fn memory(&self) -> &WireMemory<P::Wire> {
        &self.memory
    }

    /// Consumes the engine, handing the backend back for teardown.
    pub fn into_protocol(self) -> P {
        self.protocol
    }

    /// Runs every instruction in `program`, in order, and returns how many
    /// executed. Decode failures are fatal to the run.
    pub fn execute_program(&mut self, program: &[u8]) -> Result<u64, DecodeError> {
        let mut offset = 0;
        let mut executed = 0;
        while offset < program.len() {
            let instr = InstrView::decode(program, offset)?;
            self.execute_instruction(&instr);
            offset += instr.size();
            executed += 1;
        }
        debug!(instructions = executed, "program complete");
        Ok(executed)
    }

    /// Dispatches a single decoded instruction.
    pub fn execute_instruction(&mut self, instr: &InstrView) {
        match instr.opcode() {
            OpCode::Input => self.exec_input(instr),
            OpCode::Output => self.exec_output(instr),
            OpCode::PublicConstant => self.exec_public_constant(instr),
            OpCode::Copy => self.exec_copy(instr),
            OpCode::IntAdd => self.exec_int_add(instr, false),
            OpCode::IntAddWithCarry => self.exec_int_add(instr, true),
            OpCode::IntIncrement => self.exec_int_increment(instr),
            OpCode::IntSub => self.exec_int_sub(instr),
            OpCode::IntDecrement => self.exec_int_decrement(instr),
            OpCode::IntMultiply => self.exec_int_multiply(instr),
            OpCode::IntLess => self.exec_int_less(instr),
            OpCode::Equal => self.exec_equal(instr),
            OpCode::IsZero => self.exec_is_zero(instr),
            OpCode::NonZero => self.exec_non_zero(instr),
            OpCode::BitNot => self.exec_bit_not(instr),
            OpCode::BitAnd => self.exec_bit_and(instr),
            OpCode::BitOr => self.exec_bit_or(instr),
            OpCode::BitXor => self.exec_bit_xor(instr),
            OpCode::ValueSelect => self.exec_value_select(instr),
        }
    }

    #[inline]
    fn wire(&self, addr: u64) -> P::Wire {
        self.memory.wire(addr)
    }

    #[inline]
    fn put(&mut self, addr: u64, wire: P::Wire) {
        self.memory.set_wire(addr, wire);
    }

    fn exec_input(&mut self, instr: &InstrView) {
        let span = self
            .memory
            .span_mut(instr.output(), usize::from(instr.width()));
        self.protocol.input(span);
    }

    fn exec_output(&mut self, instr: &InstrView) {
        let span = self.memory.span(instr.output(), usize::from(instr.width()));
        self.protocol.output(span);
    }

    fn exec_public_constant(&mut self, instr: &InstrView) {
        let out = instr.output();
        let mut constant = instr.constant();
        for i in 0..u64::from(instr.width()) {
            let wire = if constant & 1 == 0 {
                self.protocol.zero()
            } else {
                self.protocol.one()
            };
            self.put(out + i, wire);
            constant >>= 1;
        }
    }

    fn exec_copy(&mut self, instr: &InstrView) {
        let (out, a) = (instr.output(), instr.input1());
        for i in 0..u64::from(instr.width()) {
            let v = self.wire(a + i);
            let w = self.protocol.op_copy(v);
            self.put(out + i, w);
        }
    }

    fn exec_int_add(&mut self, instr: &InstrView, with_carry: bool) {
        let (out, a, b) = (instr.output(), instr.input1(), instr.input2());
        let width = u64::from(instr.width());

        let mut carry = self.protocol.zero();
        let a0 = self.wire(a);
        let mut t1 = self.protocol.op_copy(a0);
        let b0 = self.wire(b);
        let mut t2 = self.protocol.op_copy(b0);
        let w = self.protocol.op_xor(t1, t2);
        self.put(out, w);
        for i in 1..width {
            // carry contribution of bit i-1, from the previous t1/t2
            let t3 = self.protocol.op_and(t1, t2);
            carry = self.protocol.op_xor(carry, t3);

            let ai = self.wire(a + i);
            t1 = self.protocol.op_xor(ai, carry);
            let bi = self.wire(b + i);
            t2 = self.protocol.op_xor(bi, carry);
            let w = self.protocol.op_xor(t1, bi);
            self.put(out + i, w);
        }
        if with_carry {
            let t3 = self.protocol.op_and(t1, t2);
            let w = self.protocol.op_xor(carry, t3);
            self.put(out + width, w);
        }
        // without the carry slot the final carry is discarded: wraparound
    }

    fn exec_int_sub(&mut self, instr: &InstrView) {
        let (out, a, b) = (instr.output(), instr.input1(), instr.input2());
        let width = u64::from(instr.width());

        let mut borrow = self.protocol.zero();
        let a0 = self.wire(a);
        let mut t1 = self.protocol.op_copy(a0);
        let b0 = self.wire(b);
        let mut t2 = self.protocol.op_copy(b0);
        let w = self.protocol.op_xor(t1, t2);
        self.put(out, w);
        for i in 1..width {
            let t3 = self.protocol.op_and(t1, t2);
            borrow = self.protocol.op_xor(borrow, t3);

            let ai = self.wire(a + i);
            let bi = self.wire(b + i);
            t1 = self.protocol.op_xor(ai, bi);
            t2 = self.protocol.op_xor(bi, borrow);
            let w = self.protocol.op_xor(t1, borrow);
            self.put(out + i, w);
        }
    }

    fn exec_int_increment(&mut self, instr: &InstrView) {
        let (out, a) = (instr.output(), instr.input1());
        let width = u64::from(instr.width());

        let a0 = self.wire(a);
        let w = self.protocol.op_not(a0);
        self.put(out, w);
        // re-read: out may alias a, and the write above is visible here
        let a0 = self.wire(a);
        let mut carry = self.protocol.op_copy(a0);
        if width == 1 {
            return;
        }
        for i in 1..width - 1 {
            let ai = self.wire(a + i);
            let w = self.protocol.op_xor(ai, carry);
            self.put(out + i, w);
            let ai = self.wire(a + i);
            carry = self.protocol.op_and(carry, ai);
        }
        let last = self.wire(a + width - 1);
        let w = self.protocol.op_xor(last, carry);
        self.put(out + width - 1, w);
        // the carry out of the top bit is never materialized
    }

    fn exec_int_decrement(&mut self, instr: &InstrView) {
        let (out, a) = (instr.output(), instr.input1());
        let width = u64::from(instr.width());

        let a0 = self.wire(a);
        let mut borrow = self.protocol.op_not(a0);
        let w = self.protocol.op_copy(borrow);
        self.put(out, w);
        if width == 1 {
            return;
        }
        for i in 1..width - 1 {
            let ai = self.wire(a + i);
            let w = self.protocol.op_xor(ai, borrow);
            self.put(out + i, w);
            // reads the wire just written, not a[i]: required when out
            // aliases a
            let oi = self.wire(out + i);
            borrow = self.protocol.op_and(borrow, oi);
        }
        let last = self.wire(a + width - 1);
        let w = self.protocol.op_xor(last, borrow);
        self.put(out + width - 1, w);
    }

    fn exec_int_multiply(&mut self, instr: &InstrView) {
        let (out, a, b) = (instr.output(), instr.input1(), instr.input2());
        let width = u64::from(instr.width());
        if width == 0 {
            return;
        }

        for j in 0..width {
            let aj = self.wire(a + j);
            let b0 = self.wire(b);
            let w = self.protocol.op_and(aj, b0);
            self.put(out + j, w);
        }
        let zero = self.protocol.zero();
        self.put(out + width, zero);

        let mut partial = vec![P::Wire::default(); width as usize];
        for i in 1..width {
            for (j, slot) in partial.iter_mut().enumerate() {
                let aj = self.wire(a + j as u64);
                let bi = self.wire(b + i);
                *slot = self.protocol.op_and(aj, bi);
            }

            // ripple the partial product into out starting at bit i
            let mut carry = self.protocol.zero();
            for (j, &pj) in partial.iter().enumerate() {
                let oij = self.wire(out + i + j as u64);
                let t1 = self.protocol.op_xor(oij, carry);
                let t2 = self.protocol.op_xor(pj, carry);
                let w = self.protocol.op_xor(t1, pj);
                self.put(out + i + j as u64, w);
                let t3 = self.protocol.op_and(t1, t2);
                carry = self.protocol.op_xor(carry, t3);
            }
            let w = self.protocol.op_copy(carry);
            self.put(out + i + width, w);
        }
    }

    fn exec_int_less(&mut self, instr: &InstrView) {
        let (out, a, b) = (instr.output(), instr.input1(), instr.input2());
        let width = u64::from(instr.width());

        let a0 = self.wire(a);
        let b0 = self.wire(b);
        let t1 = self.protocol.op_xor(a0, b0);
        let mut result = self.protocol.op_and(t1, b0);
        for i in 1..width {
            let ai = self.wire(a + i);
            let bi = self.wire(b + i);
            let t1 = self.protocol.op_xor(ai, bi);
            let t2 = self.protocol.op_xor(bi, result);
            let t3 = self.protocol.op_and(t1, t2);
            result = self.protocol.op_xor(result, t3);
        }
        let w = self.protocol.op_copy(result);
        self.put(out, w);
    }

    fn exec_equal(&mut self, instr: &InstrView) {
        let (out, a, b) = (instr.output(), instr.input1(), instr.input2());
        let width = u64::from(instr.width());

        let a0 = self.wire(a);
        let b0 = self.wire(b);
        let mut result = self.protocol.op_xnor(a0, b0);
        for i in 1..width {
            let ai = self.wire(a + i);
            let bi = self.wire(b + i);
            let t = self.protocol.op_xnor(ai, bi);
            result = self.protocol.op_and(result, t);
        }
        let w = self.protocol.op_copy(result);
        self.put(out, w);
    }

    fn fold_is_zero(&mut self, instr: &InstrView) -> P::Wire {
        let a = instr.input1();
        let width = u64::from(instr.width());

        let a0 = self.wire(a);
        let mut result = self.protocol.op_copy(a0);
        // the fold starts at bit 0 even though the accumulator already
        // holds a[0]; kept for gate-count compatibility across backends
        for i in 0..width {
            let ai = self.wire(a + i);
            let t = self.protocol.op_not(ai);
            result = self.protocol.op_and(result, t);
        }
        result
    }

    fn exec_is_zero(&mut self, instr: &InstrView) {
        let result = self.fold_is_zero(instr);
        let w = self.protocol.op_copy(result);
        self.put(instr.output(), w);
    }

    fn exec_non_zero(&mut self, instr: &InstrView) {
        let result = self.fold_is_zero(instr);
        let w = self.protocol.op_not(result);
        self.put(instr.output(), w);
    }

    fn exec_bit_not(&mut self, instr: &InstrView) {
        let (out, a) = (instr.output(), instr.input1());
        for i in 0..u64::from(instr.width()) {
            let ai = self.wire(a + i);
            let w = self.protocol.op_not(ai);
            self.put(out + i, w);
        }
    }

    fn exec_bit_and(&mut self, instr: &InstrView) {
        let (out, a, b) = (instr.output(), instr.input1(), instr.input2());
        for i in 0..u64::from(instr.width()) {
            let ai = self.wire(a + i);
            let bi = self.wire(b + i);
            let w = self.protocol.op_and(ai, bi);
            self.put(out + i, w);
        }
    }

    fn exec_bit_or(&mut self, instr: &InstrView) {
        let (out, a, b) = (instr.output(), instr.input1(), instr.input2());
        // one AND per bit: a | b = (a ^ b) ^ (a & b)
        for i in 0..u64::from(instr.width()) {
            let ai = self.wire(a + i);
            let bi = self.wire(b + i);
            let t1 = self.protocol.op_xor(ai, bi);
            let t2 = self.protocol.op_and(ai, bi);
            let w = self.protocol.op_xor(t1, t2);
            self.put(out + i, w);
        }
    }

    fn exec_bit_xor(&mut self, instr: &InstrView) {
        let (out, a, b) = (instr.output(), instr.input1(), instr.input2());
        for i in 0..u64::from(instr.width()) {
            let ai = self.wire(a + i);
            let bi = self.wire(b + i);
            let w = self.protocol.op_xor(ai, bi);
            self.put(out + i, w);
        }
    }

    fn exec_value_select(&mut self, instr: &InstrView) {
        let (out, a, b, s) = (
            instr.output(),
            instr.input1(),
            instr.input2(),
            instr.input3(),
        );
        let s0 = self.wire(s);
        let selector = self.protocol.op_copy(s0);
        for i in 0..u64::from(instr.width()) {
            let ai = self.wire(a + i);
            let bi = self.wire(b + i);
            let d = self.protocol.op_xor(ai, bi);
            let t = self.protocol.op_and(d, selector);
            let w = self.protocol.op_xor(t, ai);
            self.put(out + i, w);
        }
    }
}
