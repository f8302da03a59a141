//! Engine circuit semantics against the cleartext backend.

use std::io::Cursor;

use proptest::prelude::*;

use gatevm::bitfile::{BitReader, BitWriter};
use gatevm::engine::Engine;
use gatevm::instruction::{assemble, Instr, OpCode};
use gatevm::memory::WireMemory;
use gatevm::plaintext::Plaintext;

fn run(program: &[Instr], input_bits: &[bool]) -> Vec<u8> {
    let bits: Vec<u8> = input_bits.iter().map(|&b| u8::from(b)).collect();
    let backend = Plaintext::new(
        BitReader::new(Cursor::new(bits)),
        BitWriter::new(Vec::new()),
    );
    let mut engine = Engine::new(backend, WireMemory::allocate(8, 4).unwrap());
    engine.execute_program(&assemble(program)).unwrap();
    engine.into_protocol().finish().unwrap()
}

fn to_bits(value: u64, width: u16) -> Vec<bool> {
    (0..width).map(|i| value >> i & 1 == 1).collect()
}

fn from_bits(bytes: &[u8]) -> u128 {
    bytes
        .iter()
        .enumerate()
        .fold(0, |acc, (i, &b)| acc | (u128::from(b & 1) << i))
}

fn mask(width: u16, value: u64) -> u64 {
    if width == 64 {
        value
    } else {
        value & ((1 << width) - 1)
    }
}

fn run_binop(op: OpCode, width: u16, a: u64, b: u64, out_width: u16) -> u128 {
    let program = [
        Instr::input(0, width),
        Instr::input(64, width),
        Instr::two_args(op, 128, 0, 64, width),
        Instr::output(128, out_width),
    ];
    let mut bits = to_bits(a, width);
    bits.extend(to_bits(b, width));
    from_bits(&run(&program, &bits))
}

fn run_unop(op: OpCode, width: u16, a: u64, out_width: u16) -> u128 {
    let program = [
        Instr::input(0, width),
        Instr::one_arg(op, 64, 0, width),
        Instr::output(64, out_width),
    ];
    from_bits(&run(&program, &to_bits(a, width)))
}

fn run_mux(width: u16, a: u64, b: u64, s: u64) -> u128 {
    let program = [
        Instr::input(0, width),
        Instr::input(64, width),
        Instr::input(128, width),
        Instr::value_select(192, 0, 64, 128, width),
        Instr::output(192, width),
    ];
    let mut bits = to_bits(a, width);
    bits.extend(to_bits(b, width));
    bits.extend(to_bits(s, width));
    from_bits(&run(&program, &bits))
}

fn widths() -> impl Strategy<Value = u16> {
    prop::sample::select(vec![1u16, 8, 16, 32, 64])
}

proptest! {
    #[test]
    fn int_add_is_modular(width in widths(), a in any::<u64>(), b in any::<u64>()) {
        let (a, b) = (mask(width, a), mask(width, b));
        let expected = u128::from(mask(width, a.wrapping_add(b)));
        prop_assert_eq!(expected, run_binop(OpCode::IntAdd, width, a, b, width));
    }

    #[test]
    fn int_add_with_carry_is_exact(width in widths(), a in any::<u64>(), b in any::<u64>()) {
        let (a, b) = (mask(width, a), mask(width, b));
        let expected = u128::from(a) + u128::from(b);
        prop_assert_eq!(expected, run_binop(OpCode::IntAddWithCarry, width, a, b, width + 1));
    }

    #[test]
    fn int_sub_is_modular(width in widths(), a in any::<u64>(), b in any::<u64>()) {
        let (a, b) = (mask(width, a), mask(width, b));
        let expected = u128::from(mask(width, a.wrapping_sub(b)));
        prop_assert_eq!(expected, run_binop(OpCode::IntSub, width, a, b, width));
    }

    #[test]
    fn int_multiply_is_exact(width in widths(), a in any::<u64>(), b in any::<u64>()) {
        let (a, b) = (mask(width, a), mask(width, b));
        let expected = u128::from(a) * u128::from(b);
        prop_assert_eq!(expected, run_binop(OpCode::IntMultiply, width, a, b, 2 * width));
    }

    #[test]
    fn int_increment_is_modular(width in widths(), a in any::<u64>()) {
        let a = mask(width, a);
        let expected = u128::from(mask(width, a.wrapping_add(1)));
        prop_assert_eq!(expected, run_unop(OpCode::IntIncrement, width, a, width));
    }

    #[test]
    fn int_decrement_is_modular(width in widths(), a in any::<u64>()) {
        let a = mask(width, a);
        let expected = u128::from(mask(width, a.wrapping_sub(1)));
        prop_assert_eq!(expected, run_unop(OpCode::IntDecrement, width, a, width));
    }

    #[test]
    fn int_less_is_unsigned(width in widths(), a in any::<u64>(), b in any::<u64>()) {
        let (a, b) = (mask(width, a), mask(width, b));
        prop_assert_eq!(u128::from(a < b), run_binop(OpCode::IntLess, width, a, b, 1));
    }

    #[test]
    fn equal_matches(width in widths(), a in any::<u64>(), b in any::<u64>()) {
        let (a, b) = (mask(width, a), mask(width, b));
        prop_assert_eq!(u128::from(a == b), run_binop(OpCode::Equal, width, a, b, 1));
        prop_assert_eq!(1, run_binop(OpCode::Equal, width, a, a, 1));
    }

    #[test]
    fn zero_tests_agree(width in widths(), a in any::<u64>()) {
        let a = mask(width, a);
        prop_assert_eq!(u128::from(a == 0), run_unop(OpCode::IsZero, width, a, 1));
        prop_assert_eq!(u128::from(a != 0), run_unop(OpCode::NonZero, width, a, 1));
    }

    #[test]
    fn bitwise_ops_match_scalars(width in widths(), a in any::<u64>(), b in any::<u64>()) {
        let (a, b) = (mask(width, a), mask(width, b));
        prop_assert_eq!(u128::from(a & b), run_binop(OpCode::BitAnd, width, a, b, width));
        prop_assert_eq!(u128::from(a | b), run_binop(OpCode::BitOr, width, a, b, width));
        prop_assert_eq!(u128::from(a ^ b), run_binop(OpCode::BitXor, width, a, b, width));
        prop_assert_eq!(u128::from(mask(width, !a)), run_unop(OpCode::BitNot, width, a, width));
    }

    #[test]
    fn value_select_picks_componentwise(width in widths(), a in any::<u64>(), b in any::<u64>(), s in any::<u64>()) {
        let (a, b, s) = (mask(width, a), mask(width, b), mask(width, s));
        let expected = u128::from(if s & 1 == 1 { b } else { a });
        prop_assert_eq!(expected, run_mux(width, a, b, s));
    }
}

#[test]
fn width_eight_reference_values() {
    // a = 200, b = 100
    assert_eq!(44, run_binop(OpCode::IntAdd, 8, 200, 100, 8));
    assert_eq!(100, run_binop(OpCode::IntSub, 8, 200, 100, 8));
    assert_eq!(0, run_binop(OpCode::IntLess, 8, 200, 100, 1));
    assert_eq!(0, run_binop(OpCode::Equal, 8, 200, 100, 1));
}

#[test]
fn single_bit_wraparound() {
    assert_eq!(0, run_unop(OpCode::IntIncrement, 1, 1, 1));
    assert_eq!(0, run_unop(OpCode::IntDecrement, 1, 1, 1));
}

#[test]
fn width_sixteen_reference_values() {
    assert_eq!(0x0FFF, run_binop(OpCode::BitOr, 16, 0x00FF, 0x0F0F, 16));
    assert_eq!(0x0FF0, run_binop(OpCode::BitXor, 16, 0x00FF, 0x0F0F, 16));
    assert_eq!(0x0F0F, run_mux(16, 0x00FF, 0x0F0F, 1));
}

#[test]
fn zero_tests_on_zero() {
    assert_eq!(1, run_unop(OpCode::IsZero, 32, 0, 1));
    assert_eq!(0, run_unop(OpCode::NonZero, 32, 0, 1));
}

#[test]
fn in_place_decrement_handles_aliasing() {
    // output span aliases the input span exactly; the borrow fold must
    // read the freshly written wires
    let program = [
        Instr::input(0, 8),
        Instr::one_arg(OpCode::IntDecrement, 0, 0, 8),
        Instr::output(0, 8),
    ];
    let out = from_bits(&run(&program, &to_bits(0x80, 8)));
    assert_eq!(0x7F, out);
}

#[test]
fn in_place_increment_handles_aliasing() {
    let program = [
        Instr::input(0, 8),
        Instr::one_arg(OpCode::IntIncrement, 0, 0, 8),
        Instr::output(0, 8),
    ];
    let out = from_bits(&run(&program, &to_bits(0x7F, 8)));
    assert_eq!(0x80, out);
}

#[test]
fn in_place_add_handles_aliasing() {
    // out == a
    let program = [
        Instr::input(0, 8),
        Instr::input(8, 8),
        Instr::two_args(OpCode::IntAdd, 0, 0, 8, 8),
        Instr::output(0, 8),
    ];
    let mut bits = to_bits(200, 8);
    bits.extend(to_bits(100, 8));
    assert_eq!(44, from_bits(&run(&program, &bits)));
}

#[test]
fn or_decomposes_into_xor_and_and() {
    // BitOr(a, b) == BitXor(BitXor(a, b), BitAnd(a, b))
    let program = [
        Instr::input(0, 8),
        Instr::input(8, 8),
        Instr::two_args(OpCode::BitXor, 16, 0, 8, 8),
        Instr::two_args(OpCode::BitAnd, 24, 0, 8, 8),
        Instr::two_args(OpCode::BitXor, 32, 16, 24, 8),
        Instr::two_args(OpCode::BitOr, 40, 0, 8, 8),
        Instr::output(32, 8),
        Instr::output(40, 8),
    ];
    let mut bits = to_bits(0b1100_1010, 8);
    bits.extend(to_bits(0b1010_0110, 8));
    let out = run(&program, &bits);
    assert_eq!(out[..8], out[8..]);
}
