//! Fixed-point decimal arithmetic on scaled u128 integers.
//!
//! Values carry 24 base-10 fractional digits. All division truncates
//! toward zero, and multiplication goes through a `BigUint` intermediate
//! so products never overflow before the final narrowing back to u128.

use std::fmt;
use std::str::FromStr;

use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

use crate::shared::errors::MathError;

/// Number of base-10 fractional digits carried by [`Fixed`].
pub const DECIMALS: u32 = 24;

/// Raw representation of 1.0.
pub const SCALE: u128 = 1_000_000_000_000_000_000_000_000;

/// Unsigned fixed-point decimal with 24 fractional digits.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub struct Fixed(u128);

impl Fixed {
    pub const ZERO: Fixed = Fixed(0);
    pub const ONE: Fixed = Fixed(SCALE);

    pub const fn from_raw(raw: u128) -> Self {
        Fixed(raw)
    }

    pub const fn raw(self) -> u128 {
        self.0
    }

    pub fn from_int(value: u128) -> Result<Self, MathError> {
        value
            .checked_mul(SCALE)
            .map(Fixed)
            .ok_or(MathError::Overflow("from_int"))
    }

    /// Truncate toward zero into the plain integer domain.
    pub const fn to_int(self) -> u128 {
        self.0 / SCALE
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, rhs: Fixed) -> Result<Fixed, MathError> {
        self.0
            .checked_add(rhs.0)
            .map(Fixed)
            .ok_or(MathError::Overflow("add"))
    }

    /// Fails when the result would be negative.
    pub fn checked_sub(self, rhs: Fixed) -> Result<Fixed, MathError> {
        self.0
            .checked_sub(rhs.0)
            .map(Fixed)
            .ok_or(MathError::Underflow("sub"))
    }

    pub fn checked_mul(self, rhs: Fixed) -> Result<Fixed, MathError> {
        mul_div(self.0, rhs.0, SCALE).map(Fixed)
    }

    pub fn checked_div(self, rhs: Fixed) -> Result<Fixed, MathError> {
        if rhs.0 == 0 {
            return Err(MathError::DivisionByZero("div"));
        }
        mul_div(self.0, SCALE, rhs.0).map(Fixed)
    }

    /// `1 − self`, defined only for fractions up to 1.
    pub fn complement(self) -> Result<Fixed, MathError> {
        Fixed::ONE.checked_sub(self)
    }
}

/// `(a × b) ÷ c` with a wide intermediate, truncating toward zero.
pub fn mul_div(a: u128, b: u128, c: u128) -> Result<u128, MathError> {
    if c == 0 {
        return Err(MathError::DivisionByZero("mul_div"));
    }
    let wide = BigUint::from(a) * BigUint::from(b) / BigUint::from(c);
    u128::try_from(wide).map_err(|_| MathError::Overflow("mul_div"))
}

impl FromStr for Fixed {
    type Err = MathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || MathError::InvalidDecimal(s.to_string());
        let (int_part, frac_part) = match s.split_once('.') {
            Some((i, f)) => (i, f),
            None => (s, ""),
        };
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(invalid());
        }
        if frac_part.len() > DECIMALS as usize {
            return Err(invalid());
        }
        let int: u128 = if int_part.is_empty() {
            0
        } else {
            int_part.parse().map_err(|_| invalid())?
        };
        let frac: u128 = if frac_part.is_empty() {
            0
        } else {
            let digits: u128 = frac_part.parse().map_err(|_| invalid())?;
            digits * 10u128.pow(DECIMALS - frac_part.len() as u32)
        };
        int.checked_mul(SCALE)
            .and_then(|v| v.checked_add(frac))
            .map(Fixed)
            .ok_or(MathError::Overflow("from_str"))
    }
}

impl TryFrom<String> for Fixed {
    type Error = MathError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Fixed> for String {
    fn from(value: Fixed) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Fixed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let int = self.0 / SCALE;
        let frac = self.0 % SCALE;
        if frac == 0 {
            write!(f, "{int}")
        } else {
            let digits = format!("{frac:024}");
            write!(f, "{}.{}", int, digits.trim_end_matches('0'))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_decimal_strings() {
        assert_eq!("1".parse::<Fixed>().unwrap(), Fixed::ONE);
        assert_eq!("0.5".parse::<Fixed>().unwrap(), Fixed::from_raw(SCALE / 2));
        assert_eq!(
            "0.0025".parse::<Fixed>().unwrap(),
            Fixed::from_raw(SCALE / 400)
        );
        assert_eq!(".25".parse::<Fixed>().unwrap(), Fixed::from_raw(SCALE / 4));
        assert!("".parse::<Fixed>().is_err());
        assert!("-1".parse::<Fixed>().is_err());
        assert!("1.2.3".parse::<Fixed>().is_err());
    }

    #[test]
    fn display_round_trips() {
        for s in ["0", "1", "0.5", "0.0025", "12.000000000000000000000001"] {
            let f: Fixed = s.parse().unwrap();
            assert_eq!(f.to_string(), s);
        }
    }

    #[test]
    fn to_int_truncates_toward_zero() {
        let f = "181.818181".parse::<Fixed>().unwrap();
        assert_eq!(f.to_int(), 181);
        assert_eq!(Fixed::from_raw(SCALE - 1).to_int(), 0);
    }

    #[test]
    fn sub_fails_on_negative_result() {
        let err = Fixed::ZERO.checked_sub(Fixed::ONE).unwrap_err();
        assert_eq!(err, MathError::Underflow("sub"));
    }

    #[test]
    fn mul_truncates() {
        let third = Fixed::ONE.checked_div(Fixed::from_int(3).unwrap()).unwrap();
        let product = third.checked_mul(Fixed::from_int(3).unwrap()).unwrap();
        // 0.333... × 3 lands one raw unit short of 1 after truncation
        assert_eq!(product, Fixed::from_raw(SCALE - 1));
    }

    #[test]
    fn mul_div_handles_wide_intermediates() {
        // a × b overflows u128 on its own; the quotient still fits
        let a = u128::MAX / 2;
        assert_eq!(mul_div(a, 4, 8).unwrap(), a / 2);
        assert_eq!(
            mul_div(1, 1, 0).unwrap_err(),
            MathError::DivisionByZero("mul_div")
        );
        assert!(mul_div(u128::MAX, 2, 1).is_err());
    }

    #[test]
    fn complement_of_fraction() {
        let spread = "0.0025".parse::<Fixed>().unwrap();
        let kept = spread.complement().unwrap();
        assert_eq!(kept.checked_add(spread).unwrap(), Fixed::ONE);
        assert!(Fixed::from_int(2).unwrap().complement().is_err());
    }
}
