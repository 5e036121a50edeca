//! Money and quantity helpers using rust_decimal for precision
//!
//! All cost and stock arithmetic goes through `Decimal`; `f64` appears only
//! at storage/serialization boundaries. Customer-facing prices round to
//! 2 decimal places; unit costs, line costs and quantities keep 4 so
//! per-serving costs survive small divisors.

use rust_decimal::prelude::*;
use rust_decimal::RoundingStrategy;

/// Rounding for customer-facing monetary values (2 decimal places, half-up)
pub const MONEY_DECIMAL_PLACES: u32 = 2;

/// Rounding for unit costs, line costs and quantities (4 decimal places, half-up)
pub const COST_DECIMAL_PLACES: u32 = 4;

/// Convert f64 to Decimal for calculation
#[inline]
pub fn to_decimal(value: f64) -> Decimal {
    Decimal::from_f64(value).unwrap_or_default()
}

/// Convert Decimal back to f64 for storage/serialization
#[inline]
pub fn to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or_default()
}

/// Round to a monetary amount (2 decimal places, half-up)
pub fn round_money(value: Decimal) -> f64 {
    to_f64(value.round_dp_with_strategy(MONEY_DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero))
}

/// Round to a cost/quantity amount (4 decimal places, half-up)
pub fn round_cost(value: Decimal) -> f64 {
    to_f64(value.round_dp_with_strategy(COST_DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_decimal_precision() {
        // Classic floating point problem: 0.1 + 0.2 != 0.3
        let a = 0.1_f64;
        let b = 0.2_f64;
        assert_ne!(a + b, 0.3);

        // Decimal succeeds
        let sum = to_decimal(a) + to_decimal(b);
        assert_eq!(to_f64(sum), 0.3);
    }

    #[test]
    fn test_accumulation_precision() {
        // Sum 0.01 one thousand times
        let mut total = Decimal::ZERO;
        for _ in 0..1000 {
            total += to_decimal(0.01);
        }
        assert_eq!(to_f64(total), 10.0);
    }

    #[test]
    fn test_round_money_half_up() {
        assert_eq!(round_money(to_decimal(3.365)), 3.37);
        assert_eq!(round_money(to_decimal(3.364)), 3.36);
        assert_eq!(round_money(to_decimal(20.0)), 20.0);
    }

    #[test]
    fn test_round_cost_keeps_four_places() {
        assert_eq!(round_cost(to_decimal(1.01) / Decimal::from(4)), 0.2525);
        assert_eq!(round_cost(to_decimal(0.123456)), 0.1235);
    }
}
