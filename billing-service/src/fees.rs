//! Fee calculation
//!
//! `fee = max(base * percentage / 100, minimum)`, rounded half away from zero
//! to the ledger's minor unit.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

use crate::error::{BillingError, BillingResult};

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

/// Every input and intermediate of a fee computation, for receipts and logs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FeeBreakdown {
    pub base_amount: Decimal,
    pub fee_percentage: Decimal,
    pub minimum_fee: Decimal,
    /// `base * percentage / 100` before the floor is applied
    pub percentage_fee: Decimal,
    pub fee_amount: Decimal,
    pub minimum_applied: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct FeeCalculator {
    scale: u32,
}

impl FeeCalculator {
    pub fn new(minor_unit_scale: u32) -> Self {
        Self {
            scale: minor_unit_scale,
        }
    }

    pub fn scale(&self) -> u32 {
        self.scale
    }

    /// # Errors
    ///
    /// `Validation` if `base_amount` is not strictly positive or the product overflows.
    pub fn calculate(
        &self,
        base_amount: Decimal,
        fee_percentage: Decimal,
        minimum_fee: Decimal,
    ) -> BillingResult<FeeBreakdown> {
        if base_amount <= Decimal::ZERO {
            return Err(BillingError::Validation(format!(
                "base_amount must be positive, got {base_amount}"
            )));
        }

        let percentage_fee = base_amount
            .checked_mul(fee_percentage)
            .and_then(|product| product.checked_div(HUNDRED))
            .ok_or_else(|| {
                BillingError::Validation(format!(
                    "fee for base_amount {base_amount} at {fee_percentage}% is out of range"
                ))
            })?;

        let minimum_applied = percentage_fee < minimum_fee;
        let raw_fee = if minimum_applied { minimum_fee } else { percentage_fee };
        let fee_amount = raw_fee
            .round_dp_with_strategy(self.scale, RoundingStrategy::MidpointAwayFromZero)
            .normalize();

        Ok(FeeBreakdown {
            base_amount,
            fee_percentage,
            minimum_fee,
            percentage_fee,
            fee_amount,
            minimum_applied,
        })
    }
}

impl Default for FeeCalculator {
    fn default() -> Self {
        Self::new(2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    #[test]
    fn minimum_fee_floor_applies() {
        let fee = FeeCalculator::default()
            .calculate(dec!(3000), dec!(10), dec!(500))
            .unwrap();
        assert_eq!(fee.percentage_fee, dec!(300));
        assert_eq!(fee.fee_amount, dec!(500));
        assert!(fee.minimum_applied);
    }

    #[test]
    fn percentage_fee_above_floor() {
        let fee = FeeCalculator::default()
            .calculate(dec!(10000), dec!(15), dec!(0))
            .unwrap();
        assert_eq!(fee.fee_amount, dec!(1500));
        assert!(!fee.minimum_applied);
    }

    #[test]
    fn rounds_to_minor_unit() {
        let fee = FeeCalculator::default()
            .calculate(dec!(333.33), dec!(12.5), dec!(0))
            .unwrap();
        // 41.66625
        assert_eq!(fee.fee_amount, dec!(41.67));

        let fee = FeeCalculator::default()
            .calculate(dec!(0.10), dec!(5), dec!(0))
            .unwrap();
        // 0.005 rounds away from zero
        assert_eq!(fee.fee_amount, dec!(0.01));
    }

    #[test]
    fn rejects_non_positive_base() {
        let calc = FeeCalculator::default();
        for base in [dec!(0), dec!(-1), dec!(-0.01)] {
            let err = calc.calculate(base, dec!(10), dec!(0)).unwrap_err();
            assert!(matches!(err, BillingError::Validation(_)), "{base}: {err}");
        }
    }

    #[test]
    fn overflow_is_a_validation_error() {
        let err = FeeCalculator::default()
            .calculate(Decimal::MAX, dec!(200), dec!(0))
            .unwrap_err();
        assert!(matches!(err, BillingError::Validation(_)));
    }

    proptest! {
        #[test]
        fn fee_is_max_of_percentage_and_floor(
            base_cents in 1i64..1_000_000_000,
            pct_hundredths in 0i64..10_000,
            min_cents in 0i64..10_000_000,
        ) {
            let base = Decimal::new(base_cents, 2);
            let pct = Decimal::new(pct_hundredths, 2);
            let minimum = Decimal::new(min_cents, 2);
            let fee = FeeCalculator::default().calculate(base, pct, minimum).unwrap();

            let expected = (base * pct / dec!(100)).max(minimum)
                .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
            prop_assert_eq!(fee.fee_amount, expected);
            prop_assert!(fee.fee_amount >= minimum);
        }
    }
}
