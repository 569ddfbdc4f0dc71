//! Pricing engine: constant-product quote formulas.
//!
//! The forward formula deducts the spread from the *input* before the
//! product-invariant split; the inverse formula instead scales its
//! denominator by `(1 − spread)`. The two are structurally asymmetric and
//! deliberately not exact inverses of one another; downstream consumers
//! depend on the existing values, so the asymmetry is preserved as-is.
//!
//! All arithmetic is integer with truncation toward zero. Intermediates go
//! through `BigUint` so full-range u128 amounts never overflow mid-formula.

use num_bigint::BigUint;

use crate::shared::errors::{ExchangeError, MathError};
use crate::shared::fixed::{Fixed, SCALE};

/// Forward quote: amount of the buy token received for `sell_amount`.
///
/// ```text
/// reduced = sell_amount × (1 − spread)
/// buy     = reduced × buy_bucket / (sell_bucket + reduced)
/// ```
pub fn buy_amount(
    sell_amount: u128,
    sell_bucket: u128,
    buy_bucket: u128,
    spread: Fixed,
) -> Result<u128, ExchangeError> {
    let kept = spread.complement()?;
    // reduced sell amount in raw fixed-point units
    let reduced = BigUint::from(sell_amount) * BigUint::from(kept.raw());
    let denominator = BigUint::from(sell_bucket) * BigUint::from(SCALE) + &reduced;
    if denominator == BigUint::from(0u32) {
        return Err(MathError::DivisionByZero("forward quote").into());
    }
    let buy = reduced * BigUint::from(buy_bucket) / denominator;
    u128::try_from(buy)
        .map_err(|_| MathError::Overflow("forward quote").into())
}

/// Inverse quote: amount of the sell token required to receive `buy_amount`.
///
/// ```text
/// sell = (buy_amount × sell_bucket) / ((buy_bucket − buy_amount) × (1 − spread))
/// ```
///
/// `buy_amount` must be strictly below `buy_bucket`, otherwise the
/// denominator is non-positive and the quote fails.
pub fn sell_amount(
    buy_amount: u128,
    sell_bucket: u128,
    buy_bucket: u128,
    spread: Fixed,
) -> Result<u128, ExchangeError> {
    if buy_amount >= buy_bucket {
        return Err(ExchangeError::InsufficientLiquidity(format!(
            "requested buy amount {buy_amount} not below buy bucket {buy_bucket}"
        )));
    }
    let kept = spread.complement()?;
    let denominator = BigUint::from(buy_bucket - buy_amount) * BigUint::from(kept.raw());
    if denominator == BigUint::from(0u32) {
        return Err(MathError::DivisionByZero("inverse quote").into());
    }
    let sell = BigUint::from(buy_amount) * BigUint::from(sell_bucket) * BigUint::from(SCALE)
        / denominator;
    u128::try_from(sell)
        .map_err(|_| MathError::Overflow("inverse quote").into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bps(points: u128) -> Fixed {
        Fixed::from_raw(SCALE / 10_000 * points)
    }

    #[test]
    fn forward_quote_worked_example() {
        // buckets (gold 1000, stable 2000), zero spread, sell 100 gold:
        // 100 × 2000 / 1100 = 181.81.. → 181
        assert_eq!(buy_amount(100, 1_000, 2_000, Fixed::ZERO).unwrap(), 181);
    }

    #[test]
    fn forward_quote_applies_spread_to_input() {
        // 10% spread reduces the sell amount to 90 before the split:
        // 90 × 2000 / 1090 = 165.13.. → 165
        assert_eq!(buy_amount(100, 1_000, 2_000, bps(1_000)).unwrap(), 165);
    }

    #[test]
    fn forward_quote_of_zero_is_zero() {
        assert_eq!(buy_amount(0, 1_000, 2_000, Fixed::ZERO).unwrap(), 0);
    }

    #[test]
    fn forward_quote_needs_liquidity() {
        assert!(buy_amount(0, 0, 2_000, Fixed::ONE.checked_sub(Fixed::from_raw(1)).unwrap()).is_err());
    }

    #[test]
    fn increasing_spread_never_increases_output() {
        let spreads = [0u128, 1, 25, 100, 1_000, 5_000, 9_999];
        let mut last = u128::MAX;
        for points in spreads {
            let out = buy_amount(500, 10_000, 20_000, bps(points)).unwrap();
            assert!(out <= last, "spread {points} increased output");
            last = out;
        }
    }

    #[test]
    fn zero_spread_preserves_constant_product() {
        let (sell_bucket, buy_bucket) = (1_000u128, 2_000u128);
        for sell in [1u128, 7, 100, 999, 5_000] {
            let buy = buy_amount(sell, sell_bucket, buy_bucket, Fixed::ZERO).unwrap();
            let before = sell_bucket * buy_bucket;
            let after = (sell_bucket + sell) * (buy_bucket - buy);
            // truncation only ever leaves value in the pool
            assert!(after >= before);
            assert!(after - before < sell_bucket + sell);
        }
    }

    #[test]
    fn inverse_quote_worked_example() {
        // 181 × 1000 / 1819 = 99.50.. → 99
        assert_eq!(sell_amount(181, 1_000, 2_000, Fixed::ZERO).unwrap(), 99);
    }

    #[test]
    fn inverse_quote_scales_denominator_by_spread() {
        // 181 × 1000 / (1819 × 0.9) = 110.56.. → 110
        assert_eq!(sell_amount(181, 1_000, 2_000, bps(1_000)).unwrap(), 110);
    }

    #[test]
    fn inverse_quote_requires_buy_below_bucket() {
        let err = sell_amount(2_000, 1_000, 2_000, Fixed::ZERO).unwrap_err();
        assert!(matches!(err, ExchangeError::InsufficientLiquidity(_)));
        assert!(sell_amount(2_001, 1_000, 2_000, Fixed::ZERO).is_err());
        assert!(sell_amount(1_999, 1_000, 2_000, Fixed::ZERO).is_ok());
    }

    #[test]
    fn formulas_are_not_exact_inverses() {
        // Selling the inverse-quoted amount forward lands short of the
        // requested buy amount; the asymmetry is intentional.
        let want_buy = 181u128;
        let quoted_sell = sell_amount(want_buy, 1_000, 2_000, Fixed::ZERO).unwrap();
        let actual_buy = buy_amount(quoted_sell, 1_000, 2_000, Fixed::ZERO).unwrap();
        assert!(actual_buy < want_buy);
    }
}
