use rust_decimal::{Decimal, RoundingStrategy};

use crate::domain::quote::CostRange;
use crate::pricing::QuoteError;

/// Monetary rounding to pence, half-up.
pub fn round2(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Customer-facing band of ±15% around a total, in whole currency units.
pub fn cost_range(total: Decimal) -> Result<CostRange, QuoteError> {
    let band = |factor: Decimal| {
        total
            .checked_mul(factor)
            .map(|amount| amount.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero))
            .ok_or(QuoteError::PriceOverflow { stage: "cost_range" })
    };
    Ok(CostRange { low: band(Decimal::new(85, 2))?, high: band(Decimal::new(115, 2))? })
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{cost_range, round2};
    use crate::pricing::QuoteError;

    #[test]
    fn round2_rounds_midpoint_up() {
        assert_eq!(round2(Decimal::new(10_005, 3)), Decimal::new(1_001, 2));
        assert_eq!(round2(Decimal::new(10_015, 3)), Decimal::new(1_002, 2));
        assert_eq!(round2(Decimal::new(10_025, 3)), Decimal::new(1_003, 2));
    }

    #[test]
    fn round2_keeps_exact_pence() {
        assert_eq!(round2(Decimal::new(12_900, 2)), Decimal::new(129, 0));
    }

    #[test]
    fn cost_range_brackets_total() {
        let range = cost_range(Decimal::new(129, 0)).expect("range");
        assert_eq!(range.low, Decimal::new(110, 0));
        assert_eq!(range.high, Decimal::new(148, 0));
    }

    #[test]
    fn cost_range_reports_overflow_instead_of_panicking() {
        assert_eq!(
            cost_range(Decimal::MAX),
            Err(QuoteError::PriceOverflow { stage: "cost_range" })
        );
    }
}
