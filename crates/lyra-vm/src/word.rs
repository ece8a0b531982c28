//! 256-bit word helpers shared by the instruction set
//!
//! Words are unsigned `U256` values; signed operations reinterpret the high
//! bit as the two's-complement sign.

use crate::error::{VmError, VmResult};
use lyra_primitives::{U256, U512};

/// Whether the word is negative under two's-complement interpretation
pub fn is_negative(x: U256) -> bool {
    x.bit(255)
}

/// Two's-complement negation, wrapping at 2^256
pub fn neg(x: U256) -> U256 {
    (!x).overflowing_add(U256::one()).0
}

/// Two's-complement absolute value. The most negative value maps to itself.
pub fn abs(x: U256) -> U256 {
    if is_negative(x) {
        neg(x)
    } else {
        x
    }
}

/// Signed division. Division by zero yields zero; the most negative value
/// divided by minus one wraps to itself.
pub fn sdiv(x: U256, y: U256) -> U256 {
    if x.is_zero() || y.is_zero() {
        return U256::zero();
    }
    let q = abs(x) / abs(y);
    if is_negative(x) != is_negative(y) {
        neg(q)
    } else {
        q
    }
}

/// Signed modulus. The result takes the sign of the dividend; modulus by
/// zero yields zero.
pub fn smod(x: U256, y: U256) -> U256 {
    if y.is_zero() {
        return U256::zero();
    }
    let r = abs(x) % abs(y);
    if is_negative(x) {
        neg(r)
    } else {
        r
    }
}

/// Signed less-than
pub fn slt(x: U256, y: U256) -> bool {
    match (is_negative(x), is_negative(y)) {
        (true, false) => true,
        (false, true) => false,
        _ => x < y,
    }
}

/// Signed greater-than
pub fn sgt(x: U256, y: U256) -> bool {
    match (is_negative(x), is_negative(y)) {
        (true, false) => false,
        (false, true) => true,
        _ => x > y,
    }
}

/// Sign-extend `x` from byte position `k` (0-indexed from the least
/// significant byte). `k >= 31` returns `x` unchanged.
pub fn sign_extend(k: U256, x: U256) -> U256 {
    if k >= U256::from(31u64) {
        return x;
    }
    let bit = (k.low_u64() as usize) * 8 + 7;
    let mask = (U256::one() << bit) - U256::one();
    if x.bit(bit) {
        x | !mask
    } else {
        x & mask
    }
}

/// Arithmetic right shift. Shifts of 256 or more yield zero for
/// non-negative values and all-ones otherwise.
pub fn sar(shift: U256, value: U256) -> U256 {
    if shift >= U256::from(256u64) {
        return if is_negative(value) {
            U256::max_value()
        } else {
            U256::zero()
        };
    }
    let s = shift.low_u64() as usize;
    let r = value >> s;
    if is_negative(value) && s > 0 {
        r | !(U256::max_value() >> s)
    } else {
        r
    }
}

/// `(x + y) % z` computed in a 512-bit intermediate; zero if `z` is zero
pub fn addmod(x: U256, y: U256, z: U256) -> U256 {
    if z.is_zero() {
        return U256::zero();
    }
    let r = (U512::from(x) + U512::from(y)) % U512::from(z);
    u512_low(r)
}

/// `(x * y) % z` computed in a 512-bit intermediate; zero if `z` is zero
pub fn mulmod(x: U256, y: U256, z: U256) -> U256 {
    if z.is_zero() {
        return U256::zero();
    }
    let r = x.full_mul(y) % U512::from(z);
    u512_low(r)
}

// The argument is always a value already reduced below 2^256.
fn u512_low(v: U512) -> U256 {
    match U256::try_from(v) {
        Ok(x) => x,
        Err(_) => U256::zero(),
    }
}

/// Convert a word to u64, failing with a gas overflow if it does not fit
pub(crate) fn u256_to_u64(v: U256) -> VmResult<u64> {
    if v > U256::from(u64::MAX) {
        return Err(VmError::GasUintOverflow);
    }
    Ok(v.low_u64())
}

/// Round a byte size up to a count of 32-byte words
pub(crate) fn to_word_size(size: u64) -> u64 {
    if size > u64::MAX - 31 {
        return u64::MAX / 32 + 1;
    }
    (size + 31) / 32
}

/// Peak memory size touched by an `(offset, length)` pair; zero length
/// touches nothing regardless of offset
pub(crate) fn calc_mem_size(offset: U256, length: U256) -> VmResult<U256> {
    if length.is_zero() {
        return Ok(U256::zero());
    }
    offset.checked_add(length).ok_or(VmError::GasUintOverflow)
}

/// Copy `size` bytes of `data` starting at `offset`, zero-padded past the
/// end of `data`
pub(crate) fn get_data(data: &[u8], offset: U256, size: u64) -> Vec<u8> {
    let len = U256::from(data.len());
    let start = offset.min(len).low_u64() as usize;
    let end = offset
        .saturating_add(U256::from(size))
        .min(len)
        .low_u64() as usize;
    right_pad(&data[start..end], size as usize)
}

/// Zero-pad a slice on the right to the requested length
pub(crate) fn right_pad(data: &[u8], size: usize) -> Vec<u8> {
    let mut padded = vec![0u8; size];
    let n = data.len().min(size);
    padded[..n].copy_from_slice(&data[..n]);
    padded
}
