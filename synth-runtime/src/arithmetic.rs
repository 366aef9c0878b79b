//! # Operation Dispatch Table
//!
//! Pure functions over 256-bit words and the fixed table mapping every
//! [`ArithmeticOp`] to one of them. Unsigned arithmetic wraps modulo 2^256;
//! signed operations go through two's complement; division and modulo by zero
//! return 0.

use evm_synth_spec::value::{self, from_signed, to_signed, word_mask, wrap_word};
use evm_synth_spec::{ArithmeticOp, SpecError, Validator, WORD_BITS};
use num_bigint::BigUint;
use num_traits::{One, ToPrimitive, Zero};

use crate::error::{Result, RuntimeError};

/// Handler signature: operand values in, output values out
pub type ArithFn = fn(&[BigUint]) -> Result<Vec<BigUint>>;

// ============================================================================
// Arithmetic
// ============================================================================

pub fn add(a: &BigUint, b: &BigUint) -> BigUint {
    wrap_word(a + b)
}

pub fn mul(a: &BigUint, b: &BigUint) -> BigUint {
    wrap_word(a * b)
}

pub fn sub(a: &BigUint, b: &BigUint) -> BigUint {
    wrap_word(a + (value::modulus(WORD_BITS) - wrap_word(b.clone())))
}

pub fn div(a: &BigUint, b: &BigUint) -> BigUint {
    if b.is_zero() {
        BigUint::zero()
    } else {
        a / b
    }
}

pub fn sdiv(a: &BigUint, b: &BigUint) -> BigUint {
    if b.is_zero() {
        return BigUint::zero();
    }
    from_signed(&(to_signed(a) / to_signed(b)))
}

pub fn modulo(a: &BigUint, b: &BigUint) -> BigUint {
    if b.is_zero() {
        BigUint::zero()
    } else {
        a % b
    }
}

/// Signed remainder; the sign follows the dividend
pub fn smod(a: &BigUint, b: &BigUint) -> BigUint {
    if b.is_zero() {
        return BigUint::zero();
    }
    from_signed(&(to_signed(a) % to_signed(b)))
}

pub fn addmod(a: &BigUint, b: &BigUint, n: &BigUint) -> BigUint {
    if n.is_zero() {
        BigUint::zero()
    } else {
        (a + b) % n
    }
}

pub fn mulmod(a: &BigUint, b: &BigUint, n: &BigUint) -> BigUint {
    if n.is_zero() {
        BigUint::zero()
    } else {
        (a * b) % n
    }
}

/// Square-and-multiply exponentiation modulo `modulus`
///
/// A zero modulus yields 0.
pub fn pow_mod(base: &BigUint, exponent: &BigUint, modulus: &BigUint) -> BigUint {
    if modulus.is_zero() {
        return BigUint::zero();
    }
    let mut result = BigUint::one() % modulus;
    let mut square = base % modulus;
    for i in 0..exponent.bits() {
        if exponent.bit(i) {
            result = (&result * &square) % modulus;
        }
        square = (&square * &square) % modulus;
    }
    result
}

pub fn exp(base: &BigUint, exponent: &BigUint) -> BigUint {
    pow_mod(base, exponent, &value::modulus(WORD_BITS))
}

pub fn signextend(k: &BigUint, x: &BigUint) -> BigUint {
    if k > &BigUint::from(30u32) {
        return x.clone();
    }
    let k = k.to_u32().unwrap_or(0);
    let sign_bit = (k + 1) * 8 - 1;
    if x.bit(u64::from(sign_bit)) {
        x | (word_mask() ^ value::bit_mask(sign_bit + 1))
    } else {
        x & value::bit_mask(sign_bit + 1)
    }
}

// ============================================================================
// Comparison
// ============================================================================

fn flag(condition: bool) -> BigUint {
    if condition {
        BigUint::one()
    } else {
        BigUint::zero()
    }
}

pub fn lt(a: &BigUint, b: &BigUint) -> BigUint {
    flag(a < b)
}

pub fn gt(a: &BigUint, b: &BigUint) -> BigUint {
    flag(a > b)
}

pub fn slt(a: &BigUint, b: &BigUint) -> BigUint {
    flag(to_signed(a) < to_signed(b))
}

pub fn sgt(a: &BigUint, b: &BigUint) -> BigUint {
    flag(to_signed(a) > to_signed(b))
}

pub fn eq(a: &BigUint, b: &BigUint) -> BigUint {
    flag(a == b)
}

pub fn iszero(a: &BigUint) -> BigUint {
    flag(a.is_zero())
}

// ============================================================================
// Bitwise
// ============================================================================

pub fn and(a: &BigUint, b: &BigUint) -> BigUint {
    a & b
}

pub fn or(a: &BigUint, b: &BigUint) -> BigUint {
    a | b
}

pub fn xor(a: &BigUint, b: &BigUint) -> BigUint {
    a ^ b
}

pub fn not(a: &BigUint) -> BigUint {
    word_mask() ^ a
}

/// Byte `index` of `x`, counting from the most significant byte
pub fn byte(index: &BigUint, x: &BigUint) -> BigUint {
    if index >= &BigUint::from(32u32) {
        return BigUint::zero();
    }
    let index = index.to_u32().unwrap_or(0);
    (x >> ((31 - index) * 8)) & BigUint::from(0xffu32)
}

// ============================================================================
// Shift
// ============================================================================

fn shift_amount(shift: &BigUint) -> Option<u32> {
    if shift >= &BigUint::from(WORD_BITS) {
        None
    } else {
        Some(shift.to_u32().unwrap_or(0))
    }
}

pub fn shl(shift: &BigUint, x: &BigUint) -> BigUint {
    match shift_amount(shift) {
        Some(s) => wrap_word(x << s),
        None => BigUint::zero(),
    }
}

pub fn shr(shift: &BigUint, x: &BigUint) -> BigUint {
    match shift_amount(shift) {
        Some(s) => x >> s,
        None => BigUint::zero(),
    }
}

/// Arithmetic right shift: vacated bits take the sign bit
pub fn sar(shift: &BigUint, x: &BigUint) -> BigUint {
    let negative = x.bit(u64::from(WORD_BITS - 1));
    match shift_amount(shift) {
        Some(0) => x.clone(),
        Some(s) if negative => (x >> s) | (word_mask() ^ value::bit_mask(WORD_BITS - s)),
        Some(s) => x >> s,
        None if negative => word_mask(),
        None => BigUint::zero(),
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// 256 bits of `x`, most significant first
pub fn dec_to_bit(x: &BigUint) -> Vec<BigUint> {
    (0..u64::from(WORD_BITS)).rev().map(|i| flag(x.bit(i))).collect()
}

/// One square-and-multiply step
///
/// Returns `(c * (bit ? a : 1), a * a)`, both modulo 2^256. `bit` must be 0 or 1.
pub fn sub_exp(c: &BigUint, a: &BigUint, bit: &BigUint) -> Result<(BigUint, BigUint)> {
    Validator::validate_value(bit, 1)?;
    let a_out = mul(a, a);
    let c_out = if bit.is_one() { mul(c, a) } else { c.clone() };
    Ok((c_out, a_out))
}

/// Sum of all inputs modulo 2^256
pub fn accumulator(values: &[BigUint]) -> BigUint {
    wrap_word(values.iter().sum())
}

// ============================================================================
// Handler table
// ============================================================================

fn operands<'a, const N: usize>(op: ArithmeticOp, values: &'a [BigUint]) -> Result<&'a [BigUint; N]> {
    values.try_into().map_err(|_| {
        RuntimeError::from(SpecError::InputArity {
            name: op.name().to_string(),
            expected: N,
            actual: values.len(),
        })
    })
}

fn unary(op: ArithmeticOp, values: &[BigUint], f: fn(&BigUint) -> BigUint) -> Result<Vec<BigUint>> {
    let [a] = operands::<1>(op, values)?;
    Ok(vec![f(a)])
}

fn binary(op: ArithmeticOp, values: &[BigUint], f: fn(&BigUint, &BigUint) -> BigUint) -> Result<Vec<BigUint>> {
    let [a, b] = operands::<2>(op, values)?;
    Ok(vec![f(a, b)])
}

fn ternary(
    op: ArithmeticOp,
    values: &[BigUint],
    f: fn(&BigUint, &BigUint, &BigUint) -> BigUint,
) -> Result<Vec<BigUint>> {
    let [a, b, c] = operands::<3>(op, values)?;
    Ok(vec![f(a, b, c)])
}

fn h_add(v: &[BigUint]) -> Result<Vec<BigUint>> {
    binary(ArithmeticOp::Add, v, add)
}
fn h_mul(v: &[BigUint]) -> Result<Vec<BigUint>> {
    binary(ArithmeticOp::Mul, v, mul)
}
fn h_sub(v: &[BigUint]) -> Result<Vec<BigUint>> {
    binary(ArithmeticOp::Sub, v, sub)
}
fn h_div(v: &[BigUint]) -> Result<Vec<BigUint>> {
    binary(ArithmeticOp::Div, v, div)
}
fn h_sdiv(v: &[BigUint]) -> Result<Vec<BigUint>> {
    binary(ArithmeticOp::SDiv, v, sdiv)
}
fn h_mod(v: &[BigUint]) -> Result<Vec<BigUint>> {
    binary(ArithmeticOp::Mod, v, modulo)
}
fn h_smod(v: &[BigUint]) -> Result<Vec<BigUint>> {
    binary(ArithmeticOp::SMod, v, smod)
}
fn h_addmod(v: &[BigUint]) -> Result<Vec<BigUint>> {
    ternary(ArithmeticOp::AddMod, v, addmod)
}
fn h_mulmod(v: &[BigUint]) -> Result<Vec<BigUint>> {
    ternary(ArithmeticOp::MulMod, v, mulmod)
}
fn h_exp(v: &[BigUint]) -> Result<Vec<BigUint>> {
    binary(ArithmeticOp::Exp, v, exp)
}
fn h_signextend(v: &[BigUint]) -> Result<Vec<BigUint>> {
    binary(ArithmeticOp::SignExtend, v, signextend)
}
fn h_lt(v: &[BigUint]) -> Result<Vec<BigUint>> {
    binary(ArithmeticOp::Lt, v, lt)
}
fn h_gt(v: &[BigUint]) -> Result<Vec<BigUint>> {
    binary(ArithmeticOp::Gt, v, gt)
}
fn h_slt(v: &[BigUint]) -> Result<Vec<BigUint>> {
    binary(ArithmeticOp::Slt, v, slt)
}
fn h_sgt(v: &[BigUint]) -> Result<Vec<BigUint>> {
    binary(ArithmeticOp::Sgt, v, sgt)
}
fn h_eq(v: &[BigUint]) -> Result<Vec<BigUint>> {
    binary(ArithmeticOp::Eq, v, eq)
}
fn h_iszero(v: &[BigUint]) -> Result<Vec<BigUint>> {
    unary(ArithmeticOp::IsZero, v, iszero)
}
fn h_and(v: &[BigUint]) -> Result<Vec<BigUint>> {
    binary(ArithmeticOp::And, v, and)
}
fn h_or(v: &[BigUint]) -> Result<Vec<BigUint>> {
    binary(ArithmeticOp::Or, v, or)
}
fn h_xor(v: &[BigUint]) -> Result<Vec<BigUint>> {
    binary(ArithmeticOp::Xor, v, xor)
}
fn h_not(v: &[BigUint]) -> Result<Vec<BigUint>> {
    unary(ArithmeticOp::Not, v, not)
}
fn h_byte(v: &[BigUint]) -> Result<Vec<BigUint>> {
    binary(ArithmeticOp::Byte, v, byte)
}
fn h_shl(v: &[BigUint]) -> Result<Vec<BigUint>> {
    binary(ArithmeticOp::Shl, v, shl)
}
fn h_shr(v: &[BigUint]) -> Result<Vec<BigUint>> {
    binary(ArithmeticOp::Shr, v, shr)
}
fn h_sar(v: &[BigUint]) -> Result<Vec<BigUint>> {
    binary(ArithmeticOp::Sar, v, sar)
}
fn h_dec_to_bit(v: &[BigUint]) -> Result<Vec<BigUint>> {
    let [x] = operands::<1>(ArithmeticOp::DecToBit, v)?;
    Ok(dec_to_bit(x))
}
fn h_sub_exp(v: &[BigUint]) -> Result<Vec<BigUint>> {
    let [c, a, bit] = operands::<3>(ArithmeticOp::SubExp, v)?;
    let (c_out, a_out) = sub_exp(c, a, bit)?;
    Ok(vec![c_out, a_out])
}
fn h_accumulator(v: &[BigUint]) -> Result<Vec<BigUint>> {
    Ok(vec![accumulator(v)])
}

const HANDLERS: [(ArithmeticOp, ArithFn); 28] = [
    (ArithmeticOp::Add, h_add),
    (ArithmeticOp::Mul, h_mul),
    (ArithmeticOp::Sub, h_sub),
    (ArithmeticOp::Div, h_div),
    (ArithmeticOp::SDiv, h_sdiv),
    (ArithmeticOp::Mod, h_mod),
    (ArithmeticOp::SMod, h_smod),
    (ArithmeticOp::AddMod, h_addmod),
    (ArithmeticOp::MulMod, h_mulmod),
    (ArithmeticOp::Exp, h_exp),
    (ArithmeticOp::SignExtend, h_signextend),
    (ArithmeticOp::Lt, h_lt),
    (ArithmeticOp::Gt, h_gt),
    (ArithmeticOp::Slt, h_slt),
    (ArithmeticOp::Sgt, h_sgt),
    (ArithmeticOp::Eq, h_eq),
    (ArithmeticOp::IsZero, h_iszero),
    (ArithmeticOp::And, h_and),
    (ArithmeticOp::Or, h_or),
    (ArithmeticOp::Xor, h_xor),
    (ArithmeticOp::Not, h_not),
    (ArithmeticOp::Byte, h_byte),
    (ArithmeticOp::Shl, h_shl),
    (ArithmeticOp::Shr, h_shr),
    (ArithmeticOp::Sar, h_sar),
    (ArithmeticOp::DecToBit, h_dec_to_bit),
    (ArithmeticOp::SubExp, h_sub_exp),
    (ArithmeticOp::Accumulator, h_accumulator),
];

/// Fixed mapping from operation tag to handler
#[derive(Debug, Clone)]
pub struct OperationTable {
    handlers: Vec<ArithFn>,
}

impl OperationTable {
    /// Build the table, checking that every operation has exactly one handler
    pub fn new() -> Result<Self> {
        Self::from_entries(&HANDLERS)
    }

    fn from_entries(entries: &[(ArithmeticOp, ArithFn)]) -> Result<Self> {
        let mut slots: Vec<Option<ArithFn>> = vec![None; ArithmeticOp::ALL.len()];
        for &(op, handler) in entries {
            let slot = &mut slots[op as usize];
            if slot.is_some() {
                return Err(RuntimeError::MissingHandler(format!("{op} registered twice")));
            }
            *slot = Some(handler);
        }
        let handlers = ArithmeticOp::ALL
            .iter()
            .zip(slots)
            .map(|(op, slot)| slot.ok_or_else(|| RuntimeError::MissingHandler(op.name().to_string())))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { handlers })
    }

    /// Evaluate an operation on operand values
    pub fn evaluate(&self, op: ArithmeticOp, values: &[BigUint]) -> Result<Vec<BigUint>> {
        if values.is_empty() {
            return Err(SpecError::EmptyOperand {
                name: op.name().to_string(),
            }
            .into());
        }
        Validator::validate_arity(op, values.len())?;
        (self.handlers[op as usize])(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn n(v: u64) -> BigUint {
        BigUint::from(v)
    }

    fn neg(v: u64) -> BigUint {
        from_signed(&-num_bigint::BigInt::from(v))
    }

    #[test]
    fn test_add_wraps() {
        assert_eq!(add(&n(2), &n(3)), n(5));
        assert_eq!(add(&word_mask(), &n(1)), n(0));
    }

    #[test]
    fn test_sub_wraps() {
        assert_eq!(sub(&n(5), &n(3)), n(2));
        assert_eq!(sub(&n(0), &n(1)), word_mask());
    }

    #[test]
    fn test_division_by_zero_is_zero() {
        assert_eq!(div(&n(7), &n(0)), n(0));
        assert_eq!(sdiv(&n(7), &n(0)), n(0));
        assert_eq!(modulo(&n(7), &n(0)), n(0));
        assert_eq!(smod(&n(7), &n(0)), n(0));
        assert_eq!(addmod(&n(7), &n(1), &n(0)), n(0));
        assert_eq!(mulmod(&n(7), &n(1), &n(0)), n(0));
    }

    #[test]
    fn test_signed_division() {
        assert_eq!(sdiv(&neg(8), &n(2)), neg(4));
        assert_eq!(sdiv(&neg(7), &n(2)), neg(3));
        assert_eq!(smod(&neg(7), &n(3)), neg(1));
        assert_eq!(smod(&n(7), &neg(3)), n(1));
    }

    #[test]
    fn test_sdiv_overflow() {
        let min = value::modulus(255);
        assert_eq!(sdiv(&min, &word_mask()), min);
    }

    #[test]
    fn test_addmod_mulmod_use_full_width() {
        let max = word_mask();
        assert_eq!(addmod(&max, &n(2), &n(3)), (max.clone() + 2u32) % 3u32);
        assert_eq!(mulmod(&max, &max, &n(12)), (&max * &max) % 12u32);
    }

    #[test]
    fn test_exp() {
        assert_eq!(exp(&n(2), &n(10)), n(1024));
        assert_eq!(exp(&n(0), &n(0)), n(1));
        assert_eq!(exp(&n(2), &n(256)), n(0));
        assert_eq!(exp(&n(3), &n(1)), n(3));
    }

    #[test]
    fn test_pow_mod_keyed() {
        assert_eq!(pow_mod(&n(4), &n(13), &n(497)), n(445));
        assert_eq!(pow_mod(&n(5), &n(0), &n(1)), n(0));
        assert_eq!(pow_mod(&n(5), &n(3), &n(0)), n(0));
    }

    #[test]
    fn test_signextend() {
        assert_eq!(signextend(&n(0), &n(0xff)), word_mask());
        assert_eq!(signextend(&n(0), &n(0x7f)), n(0x7f));
        assert_eq!(signextend(&n(1), &n(0x1_80ff)), word_mask() ^ n(0x7f00));
        assert_eq!(signextend(&n(31), &n(0xff)), n(0xff));
    }

    #[test]
    fn test_comparisons() {
        assert_eq!(lt(&n(1), &n(2)), n(1));
        assert_eq!(gt(&n(1), &n(2)), n(0));
        assert_eq!(slt(&neg(1), &n(0)), n(1));
        assert_eq!(sgt(&neg(1), &n(0)), n(0));
        assert_eq!(eq(&n(4), &n(4)), n(1));
        assert_eq!(iszero(&n(0)), n(1));
    }

    #[test]
    fn test_bitwise() {
        assert_eq!(and(&n(0b1100), &n(0b1010)), n(0b1000));
        assert_eq!(or(&n(0b1100), &n(0b1010)), n(0b1110));
        assert_eq!(xor(&n(0b1100), &n(0b1010)), n(0b0110));
        assert_eq!(not(&n(0)), word_mask());
        assert_eq!(not(&word_mask()), n(0));
    }

    #[test]
    fn test_byte() {
        assert_eq!(byte(&n(31), &n(0xab)), n(0xab));
        assert_eq!(byte(&n(30), &n(0xab00)), n(0xab));
        assert_eq!(byte(&n(32), &word_mask()), n(0));
        assert_eq!(byte(&n(0), &(n(0x12) << 248u32)), n(0x12));
    }

    #[test]
    fn test_shifts() {
        assert_eq!(shl(&n(4), &n(1)), n(16));
        assert_eq!(shl(&n(256), &n(1)), n(0));
        assert_eq!(shl(&n(255), &n(2)), n(0));
        assert_eq!(shr(&n(4), &n(16)), n(1));
        assert_eq!(shr(&n(300), &n(16)), n(0));
    }

    #[test]
    fn test_sar() {
        assert_eq!(sar(&n(1), &neg(4)), neg(2));
        assert_eq!(sar(&n(4), &n(32)), n(2));
        assert_eq!(sar(&n(300), &neg(1)), word_mask());
        assert_eq!(sar(&n(300), &n(1)), n(0));
        assert_eq!(sar(&n(0), &neg(9)), neg(9));
        assert_eq!(sar(&n(255), &neg(1)), word_mask());
    }

    #[test]
    fn test_dec_to_bit() {
        let bits = dec_to_bit(&n(5));
        assert_eq!(bits.len(), 256);
        assert_eq!(bits[255], n(1));
        assert_eq!(bits[254], n(0));
        assert_eq!(bits[253], n(1));
        assert!(bits[..253].iter().all(|b| b.is_zero()));
    }

    #[test]
    fn test_sub_exp() {
        let (c, a) = sub_exp(&n(1), &n(3), &n(1)).unwrap();
        assert_eq!((c, a), (n(3), n(9)));
        let (c, a) = sub_exp(&n(3), &n(9), &n(0)).unwrap();
        assert_eq!((c, a), (n(3), n(81)));
        assert!(sub_exp(&n(1), &n(3), &n(2)).is_err());
    }

    #[test]
    fn test_accumulator_wraps() {
        assert_eq!(accumulator(&[n(1), n(2), n(3)]), n(6));
        assert_eq!(accumulator(&[word_mask(), n(2)]), n(1));
    }

    #[test]
    fn test_table_is_exhaustive() {
        let table = OperationTable::new().unwrap();
        assert_eq!(table.handlers.len(), ArithmeticOp::ALL.len());
    }

    #[test]
    fn test_table_rejects_missing_handler() {
        let err = OperationTable::from_entries(&HANDLERS[..27]).unwrap_err();
        assert!(matches!(err, RuntimeError::MissingHandler(ref name) if name == "Accumulator"));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_table_rejects_duplicate_handler() {
        let mut entries = HANDLERS.to_vec();
        entries.push((ArithmeticOp::Add, h_add));
        assert!(OperationTable::from_entries(&entries).is_err());
    }

    #[test]
    fn test_evaluate() {
        let table = OperationTable::new().unwrap();
        assert_eq!(table.evaluate(ArithmeticOp::Add, &[n(2), n(3)]).unwrap(), vec![n(5)]);
        assert_eq!(table.evaluate(ArithmeticOp::Div, &[n(7), n(0)]).unwrap(), vec![n(0)]);
        assert_eq!(table.evaluate(ArithmeticOp::SubExp, &[n(1), n(2), n(1)]).unwrap(), vec![n(2), n(4)]);
    }

    #[test]
    fn test_evaluate_arity_errors() {
        let table = OperationTable::new().unwrap();
        let err = table.evaluate(ArithmeticOp::Add, &[n(1)]).unwrap_err();
        assert!(matches!(err, RuntimeError::SpecError(SpecError::InputArity { expected: 2, actual: 1, .. })));
        let err = table.evaluate(ArithmeticOp::Accumulator, &[]).unwrap_err();
        assert!(matches!(err, RuntimeError::SpecError(SpecError::EmptyOperand { .. })));
    }
}
