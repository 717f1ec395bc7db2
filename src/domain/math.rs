//! Wide-integer helpers for reserve and share arithmetic.
//!
//! Reserves are bounded to 112 bits, so products of two reserves and the
//! fee-adjusted invariant terms need up to 256 bits of headroom. All
//! multiply-then-divide paths go through [`U256`] and truncate (floor) on
//! division, matching the integer semantics of the pool formulas.

use crate::domain::types::{AmmError, AmmResult};
use uint::construct_uint;

construct_uint! {
    /// 256-bit unsigned integer for intermediate pool arithmetic
    pub struct U256(4);
}

/// Converts a `U256` back to `u128`, failing if it does not fit
pub fn to_u128(value: U256) -> AmmResult<u128> {
    if value > U256::from(u128::MAX) {
        return Err(AmmError::MathOverflow);
    }
    Ok(value.as_u128())
}

/// Computes `a * b / denominator` with a 256-bit intermediate, flooring
pub fn mul_div(a: u128, b: u128, denominator: u128) -> AmmResult<u128> {
    if denominator == 0 {
        return Err(AmmError::MathOverflow);
    }
    let product = U256::from(a) * U256::from(b);
    to_u128(product / U256::from(denominator))
}

/// Product of two reserves as a 256-bit value (the pool invariant `k`)
pub fn reserve_product(a: u128, b: u128) -> U256 {
    U256::from(a) * U256::from(b)
}

/// Integer square root by Babylonian iteration, flooring
pub fn integer_sqrt(value: U256) -> U256 {
    if value.is_zero() {
        return U256::zero();
    }
    if value < U256::from(4u64) {
        return U256::one();
    }
    let mut z = value;
    let mut x = value / U256::from(2u64) + U256::one();
    while x < z {
        z = x;
        x = (value / x + x) / U256::from(2u64);
    }
    z
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mul_div_floors() {
        // 7 * 3 / 2 = 10.5 -> 10
        assert_eq!(mul_div(7, 3, 2).unwrap(), 10);
        assert_eq!(mul_div(0, 3, 2).unwrap(), 0);
    }

    #[test]
    fn test_mul_div_wide_intermediate() {
        // (2^112 - 1)^2 overflows u128 but the quotient fits
        let max = (1u128 << 112) - 1;
        assert_eq!(mul_div(max, max, max).unwrap(), max);
    }

    #[test]
    fn test_mul_div_zero_denominator() {
        assert!(matches!(mul_div(1, 1, 0), Err(AmmError::MathOverflow)));
    }

    #[test]
    fn test_to_u128_overflow() {
        let too_big = U256::from(u128::MAX) + U256::one();
        assert!(matches!(to_u128(too_big), Err(AmmError::MathOverflow)));
        assert_eq!(to_u128(U256::from(42u64)).unwrap(), 42);
    }

    #[test]
    fn test_integer_sqrt() {
        assert_eq!(integer_sqrt(U256::zero()), U256::zero());
        assert_eq!(integer_sqrt(U256::one()), U256::one());
        assert_eq!(integer_sqrt(U256::from(3u64)), U256::one());
        assert_eq!(integer_sqrt(U256::from(4u64)), U256::from(2u64));
        assert_eq!(integer_sqrt(U256::from(1_000_000u64)), U256::from(1_000u64));
        // floor behaviour just below a perfect square
        assert_eq!(integer_sqrt(U256::from(999_999u64)), U256::from(999u64));
    }

    #[test]
    fn test_integer_sqrt_of_reserve_product() {
        let k = reserve_product(250_000, 1_000_000);
        assert_eq!(integer_sqrt(k), U256::from(500_000u64));
    }
}
