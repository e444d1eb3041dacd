//! Money helpers for decimal prices.
//!
//! Prices are stored as [`Decimal`] values in the currency's standard unit
//! (dollars, not cents). Conversion to minor units happens only at the
//! payment-provider boundary, and display rounding only at render time —
//! stored values are never rounded.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

/// Convert a price to minor currency units (cents).
///
/// Rounds to two decimal places (midpoint away from zero) before scaling,
/// so `19.995` becomes `2000` cents. Returns `None` for negative amounts or
/// values that overflow `i64`.
#[must_use]
pub fn to_minor_units(amount: Decimal) -> Option<i64> {
    if amount.is_sign_negative() {
        return None;
    }

    let cents = amount
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
        .checked_mul(Decimal::ONE_HUNDRED)?;

    cents.to_i64()
}

/// Format a total for display, rounded to two decimal places.
///
/// The underlying value is left untouched; only the rendered string rounds.
#[must_use]
pub fn display_total(amount: Decimal) -> String {
    format!(
        "{:.2}",
        amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_to_minor_units_exact() {
        assert_eq!(to_minor_units(dec!(19.99)), Some(1999));
        assert_eq!(to_minor_units(dec!(5)), Some(500));
        assert_eq!(to_minor_units(dec!(0)), Some(0));
    }

    #[test]
    fn test_to_minor_units_rounds_sub_cent() {
        // The original string-munging approach would have produced "19995"
        assert_eq!(to_minor_units(dec!(19.995)), Some(2000));
        assert_eq!(to_minor_units(dec!(0.004)), Some(0));
    }

    #[test]
    fn test_to_minor_units_rejects_negative() {
        assert_eq!(to_minor_units(dec!(-1.00)), None);
    }

    #[test]
    fn test_display_total_rounds_only_for_display() {
        let total = dec!(7.105); // e.g. 3 x 2.368333...
        assert_eq!(display_total(total), "7.11");
        // stored value unchanged
        assert_eq!(total, dec!(7.105));
    }

    #[test]
    fn test_display_total_pads_two_places() {
        assert_eq!(display_total(dec!(5)), "5.00");
        assert_eq!(display_total(dec!(5.1)), "5.10");
    }
}
