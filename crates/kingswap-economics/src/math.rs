//! Checked 256-bit helpers.
//!
//! Every amount in the crate is a `U256`. These wrappers turn the `Option`
//! returned by the checked operators into [`FarmError::ArithmeticOverflow`] so
//! call sites can use `?` throughout. Divisions floor.

use alloy_primitives::U256;

use crate::error::{FarmError, Result};

#[inline]
pub fn add(a: U256, b: U256) -> Result<U256> {
    a.checked_add(b).ok_or(FarmError::ArithmeticOverflow)
}

#[inline]
pub fn sub(a: U256, b: U256) -> Result<U256> {
    a.checked_sub(b).ok_or(FarmError::ArithmeticOverflow)
}

#[inline]
pub fn mul(a: U256, b: U256) -> Result<U256> {
    a.checked_mul(b).ok_or(FarmError::ArithmeticOverflow)
}

#[inline]
pub fn div(a: U256, b: U256) -> Result<U256> {
    a.checked_div(b).ok_or(FarmError::ArithmeticOverflow)
}

/// `a * b / d`, multiplying first
#[inline]
pub fn mul_div(a: U256, b: U256, d: U256) -> Result<U256> {
    div(mul(a, b)?, d)
}

/// Integer percentage of an amount, floored
pub fn percent_of(amount: U256, percent: u8) -> Result<U256> {
    mul_div(amount, U256::from(percent), U256::from(crate::PERCENT))
}

/// Sum an iterator of amounts with overflow checking
pub fn sum<I: IntoIterator<Item = U256>>(items: I) -> Result<U256> {
    items.into_iter().try_fold(U256::ZERO, add)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mul_div_floors() {
        let v = mul_div(U256::from(10), U256::from(1), U256::from(3)).unwrap();
        assert_eq!(v, U256::from(3));
    }

    #[test]
    fn test_overflow_is_an_error() {
        assert_eq!(add(U256::MAX, U256::from(1)), Err(FarmError::ArithmeticOverflow));
        assert_eq!(sub(U256::ZERO, U256::from(1)), Err(FarmError::ArithmeticOverflow));
        assert_eq!(div(U256::from(1), U256::ZERO), Err(FarmError::ArithmeticOverflow));
    }

    #[test]
    fn test_percent_of() {
        let fee = percent_of(U256::from(5_000_000_000_000_000_000u128), 5).unwrap();
        assert_eq!(fee, U256::from(250_000_000_000_000_000u128));
    }
}
