//! HT to TTC conversion and line totals.

use rust_decimal::{Decimal, RoundingStrategy};

/// Tax-inclusive unit price: `ht + ht * rate / 100`, rounded to 2 decimal
/// places, round-half-up.
pub fn ttc(ht: Decimal, tax_rate_percent: Decimal) -> Decimal {
    let raw = ht + ht * tax_rate_percent / Decimal::ONE_HUNDRED;
    raw.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Total for a line: unit TTC times quantity.
///
/// The unit price is already rounded to 2 decimal places, so the product
/// carries no further rounding.
pub fn line_total(unit_ttc: Decimal, quantity: i64) -> Decimal {
    unit_ttc * Decimal::from(quantity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn ttc_applies_percentage_tax() {
        assert_eq!(ttc(dec("100"), dec("20")), dec("120.00"));
        assert_eq!(ttc(dec("50"), dec("5.5")), dec("52.75"));
    }

    #[test]
    fn ttc_with_zero_rate_is_ht() {
        assert_eq!(ttc(dec("19.99"), Decimal::ZERO), dec("19.99"));
    }

    #[test]
    fn ttc_rounds_half_up_at_the_midpoint() {
        // 0.95 * 1.10 = 1.045, which must round up, not to even.
        assert_eq!(ttc(dec("0.95"), dec("10")), dec("1.05"));
    }

    #[test]
    fn ttc_rounds_fractional_results_to_two_places() {
        // 19.99 * 1.055 = 21.08945
        assert_eq!(ttc(dec("19.99"), dec("5.5")), dec("21.09"));
    }

    #[test]
    fn line_total_scales_by_quantity() {
        assert_eq!(line_total(dec("120.00"), 4), dec("480.00"));
        assert_eq!(line_total(dec("21.09"), 3), dec("63.27"));
    }

    proptest! {
        /// Property: TTC never undercuts HT for non-negative rates.
        #[test]
        fn ttc_is_at_least_ht(ht_cents in 0i64..10_000_000, rate_tenths in 0i64..1000) {
            let ht = Decimal::new(ht_cents, 2);
            let rate = Decimal::new(rate_tenths, 1);
            prop_assert!(ttc(ht, rate) >= ht);
        }
    }
}
