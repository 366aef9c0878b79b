//! 256-bit word helpers over arbitrary-precision integers.

use num_bigint::{BigInt, BigUint, Sign};
use num_traits::{One, Zero};

use crate::{LIMB_BITS, WORD_BITS};

/// `2^bits`
pub fn modulus(bits: u32) -> BigUint {
    BigUint::one() << bits
}

/// All-ones mask of `bits` width
pub fn bit_mask(bits: u32) -> BigUint {
    modulus(bits) - 1u32
}

/// `2^256 - 1`
pub fn word_mask() -> BigUint {
    bit_mask(WORD_BITS)
}

/// Check `value < 2^bits`
#[inline]
pub fn fits_in(value: &BigUint, bits: u32) -> bool {
    value.bits() <= u64::from(bits)
}

/// Reduce a value modulo `2^256`
pub fn wrap_word(value: BigUint) -> BigUint {
    if fits_in(&value, WORD_BITS) {
        value
    } else {
        value & word_mask()
    }
}

/// Interpret a 256-bit word as a two's complement signed integer
pub fn to_signed(value: &BigUint) -> BigInt {
    let unsigned = BigInt::from_biguint(Sign::Plus, value.clone());
    if value.bit(u64::from(WORD_BITS - 1)) {
        unsigned - BigInt::from_biguint(Sign::Plus, modulus(WORD_BITS))
    } else {
        unsigned
    }
}

/// Map a signed integer back to its 256-bit two's complement word
pub fn from_signed(value: &BigInt) -> BigUint {
    let m = BigInt::from_biguint(Sign::Plus, modulus(WORD_BITS));
    let reduced = ((value % &m) + &m) % &m;
    reduced.magnitude().clone()
}

/// Number of bytes needed to hold `bit_size` bits
#[inline]
pub const fn byte_len(bit_size: u32) -> usize {
    ((bit_size as usize) + 7) / 8
}

/// `0x`-prefixed lower-case hex, zero padded to the byte width of `bit_size`
pub fn to_hex(value: &BigUint, bit_size: u32) -> String {
    let digits = format!("{:x}", value);
    let width = (byte_len(bit_size) * 2).max(1);
    if digits.len() >= width {
        format!("0x{digits}")
    } else {
        format!("0x{}{}", "0".repeat(width - digits.len()), digits)
    }
}

/// Parse a `0x`-prefixed (or bare) hex string
pub fn from_hex(text: &str) -> Option<BigUint> {
    let digits = text.strip_prefix("0x").unwrap_or(text);
    if digits.is_empty() {
        return Some(BigUint::zero());
    }
    BigUint::parse_bytes(digits.as_bytes(), 16)
}

/// Split a word into its low and high 128-bit halves
pub fn split_limbs(value: &BigUint) -> (BigUint, BigUint) {
    let low = value & bit_mask(LIMB_BITS);
    let high = value >> LIMB_BITS;
    (low, high)
}

/// Big-endian byte encoding left-padded to exactly `width` bytes
///
/// Returns `None` when the value needs more than `width` bytes.
pub fn to_be_bytes_padded(value: &BigUint, width: usize) -> Option<Vec<u8>> {
    if value.is_zero() {
        return Some(vec![0u8; width]);
    }
    let bytes = value.to_bytes_be();
    if bytes.len() > width {
        return None;
    }
    let mut out = vec![0u8; width - bytes.len()];
    out.extend_from_slice(&bytes);
    Some(out)
}
