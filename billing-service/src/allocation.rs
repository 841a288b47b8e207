//! Largest-remainder split allocation
//!
//! Shares are computed in integer minor units: each department gets the
//! truncated share `fee * pct / total_pct`, then the leftover units go one at
//! a time to the largest fractional remainders, ties broken by split order.
//! The result always sums to the fee exactly or the allocator fails.

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::{BillingError, BillingResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Allocation {
    pub department_id: Uuid,
    pub amount: Decimal,
}

#[derive(Debug, Clone, Copy)]
pub struct SplitAllocator {
    scale: u32,
}

impl SplitAllocator {
    pub fn new(minor_unit_scale: u32) -> Self {
        Self {
            scale: minor_unit_scale,
        }
    }

    fn unit(&self) -> Decimal {
        (0..self.scale).fold(Decimal::ONE, |acc, _| acc * Decimal::TEN)
    }

    /// Apportion `fee_amount` over `splits` in split order.
    ///
    /// Percentages are normalized by their own total, so a table summing to
    /// 99.99 still allocates the whole fee.
    ///
    /// # Errors
    ///
    /// `Allocation` for an empty table, a negative percentage, a fee that is not
    /// a whole number of minor units, or a final sum that differs from the fee.
    pub fn allocate(&self, fee_amount: Decimal, splits: &[(Uuid, Decimal)]) -> BillingResult<Vec<Allocation>> {
        if splits.is_empty() {
            return Err(BillingError::allocation("no department splits to allocate over", fee_amount, Decimal::ZERO));
        }
        if let Some((department_id, pct)) = splits.iter().find(|(_, pct)| pct.is_sign_negative()) {
            return Err(BillingError::allocation(
                format!("negative split percentage {pct} for department {department_id}"),
                fee_amount,
                Decimal::ZERO,
            ));
        }
        let total_pct: Decimal = splits.iter().map(|(_, pct)| *pct).sum();
        if total_pct <= Decimal::ZERO {
            return Err(BillingError::allocation("split percentages sum to zero", fee_amount, Decimal::ZERO));
        }

        let unit = self.unit();
        let fee_minor = fee_amount
            .checked_mul(unit)
            .ok_or_else(|| BillingError::allocation("fee out of range", fee_amount, Decimal::ZERO))?;
        if fee_minor.fract() != Decimal::ZERO {
            return Err(BillingError::allocation(
                format!("fee is not a whole number of 10^-{} units", self.scale),
                fee_amount,
                Decimal::ZERO,
            ));
        }

        let mut shares = Vec::with_capacity(splits.len());
        let mut remainders = Vec::with_capacity(splits.len());
        for (position, (_, pct)) in splits.iter().enumerate() {
            let raw = fee_minor
                .checked_mul(*pct)
                .and_then(|product| product.checked_div(total_pct))
                .ok_or_else(|| BillingError::allocation("split share out of range", fee_amount, Decimal::ZERO))?;
            let truncated = raw.trunc();
            shares.push(truncated);
            remainders.push((position, raw - truncated));
        }

        let truncated_total: Decimal = shares.iter().copied().sum();
        let residual = fee_minor - truncated_total;
        if residual.is_sign_negative() && !residual.is_zero() {
            return Err(BillingError::allocation(
                "truncated shares exceed the fee",
                fee_amount,
                truncated_total / unit,
            ));
        }

        // Stable sort keeps split order among equal remainders.
        remainders.sort_by(|a, b| b.1.cmp(&a.1));
        let mut left = residual;
        let mut order = remainders.iter().map(|(position, _)| *position).cycle();
        while left > Decimal::ZERO {
            let Some(position) = order.next() else { break };
            if let Some(share) = shares.get_mut(position) {
                *share += Decimal::ONE;
                left -= Decimal::ONE;
            }
        }

        let allocations: Vec<Allocation> = splits
            .iter()
            .zip(shares)
            .map(|((department_id, _), minor)| {
                let mut amount = minor / unit;
                amount.rescale(self.scale);
                Allocation {
                    department_id: *department_id,
                    amount,
                }
            })
            .collect();

        let allocated_total: Decimal = allocations.iter().map(|a| a.amount).sum();
        if allocated_total != fee_amount {
            return Err(BillingError::allocation(
                "allocated shares do not sum to the fee",
                fee_amount,
                allocated_total,
            ));
        }

        Ok(allocations)
    }
}

impl Default for SplitAllocator {
    fn default() -> Self {
        Self::new(2)
    }
}
