//! Packed physical instructions and their decoder.
//!
//! A program is a byte stream of variable-footprint records. Every record
//! starts with a fixed header (opcode byte, 64-bit output address) and
//! continues with a tail determined by the opcode's [`Format`]. The stream
//! has byte-level alignment only, so all multi-byte fields are reassembled
//! with little-endian loads; nothing here assumes natural alignment.

use thiserror::Error;

/// Bit-width of a multi-bit operand.
pub type BitWidth = u16;

/// Header footprint: opcode byte plus output address.
pub const HEADER_BYTES: usize = 9;

/// Operation selector of a packed instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OpCode {
    /// Fill a span with labels for the next input bits.
    Input = 0x01,
    /// Register a span of wires for output decoding.
    Output = 0x02,
    /// Assign a public literal, bit by bit.
    PublicConstant = 0x03,
    /// Copy a span.
    Copy = 0x04,
    /// Modular ripple-carry addition.
    IntAdd = 0x05,
    /// Ripple-carry addition keeping the final carry.
    IntAddWithCarry = 0x06,
    /// Modular increment.
    IntIncrement = 0x07,
    /// Modular ripple-borrow subtraction.
    IntSub = 0x08,
    /// Modular decrement.
    IntDecrement = 0x09,
    /// Schoolbook multiplication into a double-width span.
    IntMultiply = 0x0a,
    /// Unsigned less-than, 1-bit output.
    IntLess = 0x0b,
    /// Equality, 1-bit output.
    Equal = 0x0c,
    /// All-bits-zero test, 1-bit output.
    IsZero = 0x0d,
    /// Any-bit-set test, 1-bit output.
    NonZero = 0x0e,
    /// Bitwise NOT.
    BitNot = 0x0f,
    /// Bitwise AND.
    BitAnd = 0x10,
    /// Bitwise OR.
    BitOr = 0x11,
    /// Bitwise XOR.
    BitXor = 0x12,
    /// Two-way multiplexer, selector in the third operand.
    ValueSelect = 0x13,
}

/// Physical layout of an instruction tail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// `width` only.
    NoArgs,
    /// `width`, one input address.
    OneArg,
    /// `width`, two input addresses.
    TwoArgs,
    /// `width`, three input addresses.
    ThreeArgs,
    /// Narrow `width` and a 64-bit literal.
    Constant,
}

impl Format {
    /// Tail footprint in bytes.
    pub const fn tail_bytes(self) -> usize {
        match self {
            Format::NoArgs => 2,
            Format::OneArg => 10,
            Format::TwoArgs => 18,
            Format::ThreeArgs => 26,
            Format::Constant => 9,
        }
    }
}

impl OpCode {
    /// Maps a raw opcode byte, rejecting unknown values.
    pub const fn from_byte(byte: u8) -> Option<OpCode> {
        Some(match byte {
            0x01 => OpCode::Input,
            0x02 => OpCode::Output,
            0x03 => OpCode::PublicConstant,
            0x04 => OpCode::Copy,
            0x05 => OpCode::IntAdd,
            0x06 => OpCode::IntAddWithCarry,
            0x07 => OpCode::IntIncrement,
            0x08 => OpCode::IntSub,
            0x09 => OpCode::IntDecrement,
            0x0a => OpCode::IntMultiply,
            0x0b => OpCode::IntLess,
            0x0c => OpCode::Equal,
            0x0d => OpCode::IsZero,
            0x0e => OpCode::NonZero,
            0x0f => OpCode::BitNot,
            0x10 => OpCode::BitAnd,
            0x11 => OpCode::BitOr,
            0x12 => OpCode::BitXor,
            0x13 => OpCode::ValueSelect,
            _ => return None,
        })
    }

    /// Tail layout of this operation.
    pub const fn format(self) -> Format {
        match self {
            OpCode::Input | OpCode::Output => Format::NoArgs,
            OpCode::PublicConstant => Format::Constant,
            OpCode::Copy
            | OpCode::IntIncrement
            | OpCode::IntDecrement
            | OpCode::IsZero
            | OpCode::NonZero
            | OpCode::BitNot => Format::OneArg,
            OpCode::IntAdd
            | OpCode::IntAddWithCarry
            | OpCode::IntSub
            | OpCode::IntMultiply
            | OpCode::IntLess
            | OpCode::Equal
            | OpCode::BitAnd
            | OpCode::BitOr
            | OpCode::BitXor => Format::TwoArgs,
            OpCode::ValueSelect => Format::ThreeArgs,
        }
    }

    /// Full record footprint in bytes.
    pub const fn size(self) -> usize {
        HEADER_BYTES + self.format().tail_bytes()
    }
}

/// Errors raised while decoding an instruction stream.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    /// The opcode byte does not name an operation.
    #[error("unknown opcode {opcode:#04x} at byte offset {offset}")]
    UnknownOpcode {
        /// The offending byte.
        opcode: u8,
        /// Byte offset of the record in the stream.
        offset: usize,
    },
    /// The stream ends inside a record.
    #[error("truncated instruction at byte offset {offset}: need {needed} bytes, found {available}")]
    Truncated {
        /// Byte offset of the record in the stream.
        offset: usize,
        /// Record footprint implied by the opcode.
        needed: usize,
        /// Bytes remaining in the stream.
        available: usize,
    },
}

/// A borrowed view over one packed instruction.
///
/// `width` sits at the same offset (directly after the header) in every
/// operand-bearing form, so e.g. the width of a three-operand select reads
/// the same bytes whether viewed through the two- or three-operand layout.
#[derive(Debug, Clone, Copy)]
pub struct InstrView<'a> {
    op: OpCode,
    rec: &'a [u8],
}

#[inline]
fn load_u64(bytes: &[u8]) -> u64 {
    u64::from_le_bytes(bytes.try_into().expect("slice is 8 bytes"))
}

impl<'a> InstrView<'a> {
    /// Decodes the record starting at `offset` in `stream`.
    pub fn decode(stream: &'a [u8], offset: usize) -> Result<Self, DecodeError> {
        let rest = &stream[offset..];
        let Some(&opcode) = rest.first() else {
            return Err(DecodeError::Truncated {
                offset,
                needed: HEADER_BYTES,
                available: 0,
            });
        };
        let Some(op) = OpCode::from_byte(opcode) else {
            return Err(DecodeError::UnknownOpcode { opcode, offset });
        };
        let needed = op.size();
        if rest.len() < needed {
            return Err(DecodeError::Truncated {
                offset,
                needed,
                available: rest.len(),
            });
        }
        Ok(Self {
            op,
            rec: &rest[..needed],
        })
    }

    /// The operation.
    #[inline]
    pub fn opcode(&self) -> OpCode {
        self.op
    }

    /// Record footprint in bytes, for advancing the stream cursor.
    #[inline]
    pub fn size(&self) -> usize {
        self.rec.len()
    }

    /// Output base address.
    #[inline]
    pub fn output(&self) -> u64 {
        load_u64(&self.rec[1..9])
    }

    /// Operand bit-width.
    #[inline]
    pub fn width(&self) -> BitWidth {
        match self.op.format() {
            Format::Constant => u16::from(self.rec[9]),
            _ => u16::from_le_bytes([self.rec[9], self.rec[10]]),
        }
    }

    /// First input address.
    #[inline]
    pub fn input1(&self) -> u64 {
        load_u64(&self.rec[11..19])
    }

    /// Second input address.
    #[inline]
    pub fn input2(&self) -> u64 {
        load_u64(&self.rec[19..27])
    }

    /// Third input address.
    #[inline]
    pub fn input3(&self) -> u64 {
        load_u64(&self.rec[27..35])
    }

    /// Public literal of a `Constant`-form record.
    #[inline]
    pub fn constant(&self) -> u64 {
        load_u64(&self.rec[10..18])
    }
}

/// An unpacked instruction, used to assemble packed programs.
#[derive(Debug, Clone, Copy)]
pub struct Instr {
    /// The operation.
    pub op: OpCode,
    /// Output base address.
    pub output: u64,
    /// Operand bit-width.
    pub width: BitWidth,
    /// Input addresses; unused slots stay zero.
    pub inputs: [u64; 3],
    /// Public literal for `Constant`-form operations.
    pub constant: u64,
}

impl Instr {
    /// An `Input` instruction filling `width` wires at `addr`.
    pub fn input(addr: u64, width: BitWidth) -> Self {
        Self::no_args(OpCode::Input, addr, width)
    }

    /// An `Output` instruction registering `width` wires at `addr`.
    pub fn output(addr: u64, width: BitWidth) -> Self {
        Self::no_args(OpCode::Output, addr, width)
    }

    /// A `PublicConstant` instruction; the low `width` bits of `constant`
    /// are the literal, LSB first.
    pub fn public_constant(output: u64, constant: u64, width: u8) -> Self {
        Self {
            op: OpCode::PublicConstant,
            output,
            width: u16::from(width),
            inputs: [0; 3],
            constant,
        }
    }

    /// A zero-operand instruction.
    pub fn no_args(op: OpCode, output: u64, width: BitWidth) -> Self {
        debug_assert_eq!(Format::NoArgs, op.format());
        Self {
            op,
            output,
            width,
            inputs: [0; 3],
            constant: 0,
        }
    }

    /// A one-operand instruction.
    pub fn one_arg(op: OpCode, output: u64, input1: u64, width: BitWidth) -> Self {
        debug_assert_eq!(Format::OneArg, op.format());
        Self {
            op,
            output,
            width,
            inputs: [input1, 0, 0],
            constant: 0,
        }
    }

    /// A two-operand instruction.
    pub fn two_args(op: OpCode, output: u64, input1: u64, input2: u64, width: BitWidth) -> Self {
        debug_assert_eq!(Format::TwoArgs, op.format());
        Self {
            op,
            output,
            width,
            inputs: [input1, input2, 0],
            constant: 0,
        }
    }

    /// A `ValueSelect`: `output = selector ? b : a`.
    pub fn value_select(output: u64, a: u64, b: u64, selector: u64, width: BitWidth) -> Self {
        Self {
            op: OpCode::ValueSelect,
            output,
            width,
            inputs: [a, b, selector],
            constant: 0,
        }
    }

    /// Appends the packed record to `out`.
    pub fn encode_into(&self, out: &mut Vec<u8>) {
        out.push(self.op as u8);
        out.extend_from_slice(&self.output.to_le_bytes());
        match self.op.format() {
            Format::NoArgs => {
                out.extend_from_slice(&self.width.to_le_bytes());
            }
            Format::OneArg => {
                out.extend_from_slice(&self.width.to_le_bytes());
                out.extend_from_slice(&self.inputs[0].to_le_bytes());
            }
            Format::TwoArgs => {
                out.extend_from_slice(&self.width.to_le_bytes());
                out.extend_from_slice(&self.inputs[0].to_le_bytes());
                out.extend_from_slice(&self.inputs[1].to_le_bytes());
            }
            Format::ThreeArgs => {
                out.extend_from_slice(&self.width.to_le_bytes());
                out.extend_from_slice(&self.inputs[0].to_le_bytes());
                out.extend_from_slice(&self.inputs[1].to_le_bytes());
                out.extend_from_slice(&self.inputs[2].to_le_bytes());
            }
            Format::Constant => {
                out.push(self.width as u8);
                out.extend_from_slice(&self.constant.to_le_bytes());
            }
        }
    }
}

/// Packs a whole program into one byte stream.
pub fn assemble(instrs: &[Instr]) -> Vec<u8> {
    let mut out = Vec::new();
    for instr in instrs {
        instr.encode_into(&mut out);
    }
    out
}
