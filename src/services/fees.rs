//! Payment processing fees.
//!
//! Percentages are held in basis points and rounded half-up to whole rupiah.

use serde::Serialize;
use utoipa::ToSchema;

use crate::models::{MethodKind, PaymentMethod};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeeRule {
    Percent { basis_points: i64 },
    Flat { amount: i64 },
    Free,
}

impl FeeRule {
    /// Fee for `amount`, or `None` when the amount is too large to price.
    pub fn apply(&self, amount: i64) -> Option<i64> {
        match *self {
            FeeRule::Percent { basis_points } => {
                round_half_up(amount.checked_mul(basis_points)?, 10_000)
            }
            FeeRule::Flat { amount } => Some(amount),
            FeeRule::Free => Some(0),
        }
    }

    /// `(fee, amount + fee)`, or `None` on overflow.
    pub fn charge(&self, amount: i64) -> Option<(i64, i64)> {
        let fee = self.apply(amount)?;
        Some((fee, amount.checked_add(fee)?))
    }
}

pub fn fee_rule(method: PaymentMethod) -> FeeRule {
    match method.kind() {
        MethodKind::Ewallet => FeeRule::Percent { basis_points: 200 },
        MethodKind::BankTransfer => FeeRule::Flat { amount: 4_000 },
        MethodKind::Card => FeeRule::Percent { basis_points: 290 },
        MethodKind::Cash => FeeRule::Free,
    }
}

/// Fee for charging `amount` with the named method. Unknown methods are free.
pub fn payment_fee(amount: i64, method: &str) -> Option<i64> {
    match PaymentMethod::parse(method) {
        Some(m) => fee_rule(m).apply(amount),
        None => Some(0),
    }
}

fn round_half_up(numerator: i64, denominator: i64) -> Option<i64> {
    let half = denominator / 2;
    if numerator >= 0 {
        Some(numerator.checked_add(half)? / denominator)
    } else {
        Some(-(numerator.checked_neg()?.checked_add(half)? / denominator))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fee_schedule() {
        assert_eq!(payment_fee(100_000, "bca"), Some(4_000));
        assert_eq!(payment_fee(100_000, "mandiri"), Some(4_000));
        assert_eq!(payment_fee(100_000, "gopay"), Some(2_000));
        assert_eq!(payment_fee(100_000, "dana"), Some(2_000));
        assert_eq!(payment_fee(100_000, "credit_card"), Some(2_900));
        assert_eq!(payment_fee(100_000, "cash"), Some(0));
        assert_eq!(payment_fee(100_000, "bitcoin"), Some(0));
    }

    #[test]
    fn percentage_fees_round_half_up() {
        // 17_500 * 2.9% = 507.5
        assert_eq!(payment_fee(17_500, "credit_card"), Some(508));
        // 17_525 * 2% = 350.5
        assert_eq!(payment_fee(17_525, "ovo"), Some(351));
        // 17_520 * 2% = 350.4
        assert_eq!(payment_fee(17_520, "ovo"), Some(350));
    }

    #[test]
    fn fee_is_computed_on_service_amount_only() {
        let amount = 32_500;
        let rule = fee_rule(PaymentMethod::Gopay);
        assert_eq!(rule.charge(amount), Some((650, 33_150)));
    }

    #[test]
    fn oversized_amounts_do_not_overflow() {
        let huge = i64::MAX / 100;
        assert_eq!(payment_fee(huge, "gopay"), None);
        assert_eq!(fee_rule(PaymentMethod::CreditCard).charge(huge), None);
        assert_eq!(fee_rule(PaymentMethod::Bca).charge(i64::MAX), None);
        assert_eq!(fee_rule(PaymentMethod::Cash).charge(i64::MAX), Some((0, i64::MAX)));
    }
}
