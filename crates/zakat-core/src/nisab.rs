//! Nisab threshold from precious-metal spot prices.

use crate::{NisabStandard, MAX_AMOUNT};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Weight of gold (grams) making up the nisab.
pub const GOLD_NISAB_GRAMS: Decimal = Decimal::from_parts(85, 0, 0, false, 0);
/// Weight of silver (grams) making up the nisab.
pub const SILVER_NISAB_GRAMS: Decimal = Decimal::from_parts(595, 0, 0, false, 0);

/// Spot prices per gram in the input currency.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetalPrices {
    pub gold_per_gram: Decimal,
    pub silver_per_gram: Decimal,
}

impl Default for MetalPrices {
    /// Fallback USD prices used when no live quote was supplied.
    fn default() -> Self {
        Self {
            gold_per_gram: Decimal::new(10_500, 2),
            silver_per_gram: Decimal::new(125, 2),
        }
    }
}

impl MetalPrices {
    /// Replace non-positive prices with the fallback quote and cap the rest
    /// at [`MAX_AMOUNT`] per gram.
    pub fn sanitized(self) -> Self {
        let fallback = Self::default();
        Self {
            gold_per_gram: usable_price(self.gold_per_gram, fallback.gold_per_gram),
            silver_per_gram: usable_price(self.silver_per_gram, fallback.silver_per_gram),
        }
    }
}

fn usable_price(price: Decimal, fallback: Decimal) -> Decimal {
    if price <= Decimal::ZERO {
        fallback
    } else {
        price.min(MAX_AMOUNT)
    }
}

/// Nisab in currency for the selected metal standard. Saturates at
/// `Decimal::MAX` for prices that have not been sanitized.
pub fn nisab_threshold(standard: NisabStandard, prices: &MetalPrices) -> Decimal {
    let (grams, price) = match standard {
        NisabStandard::Gold => (GOLD_NISAB_GRAMS, prices.gold_per_gram),
        NisabStandard::Silver => (SILVER_NISAB_GRAMS, prices.silver_per_gram),
    };
    grams.checked_mul(price).unwrap_or(Decimal::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thresholds_scale_with_weight() {
        let prices = MetalPrices {
            gold_per_gram: Decimal::new(100, 0),
            silver_per_gram: Decimal::new(1, 0),
        };
        assert_eq!(
            nisab_threshold(NisabStandard::Gold, &prices),
            Decimal::new(8_500, 0)
        );
        assert_eq!(
            nisab_threshold(NisabStandard::Silver, &prices),
            Decimal::new(595, 0)
        );
    }

    #[test]
    fn silver_nisab_is_lower_at_fallback_prices() {
        let prices = MetalPrices::default();
        assert!(
            nisab_threshold(NisabStandard::Silver, &prices)
                < nisab_threshold(NisabStandard::Gold, &prices)
        );
    }

    #[test]
    fn sanitized_prices_replace_zero() {
        let p = MetalPrices {
            gold_per_gram: Decimal::ZERO,
            silver_per_gram: Decimal::new(2, 0),
        }
        .sanitized();
        assert_eq!(p.gold_per_gram, MetalPrices::default().gold_per_gram);
        assert_eq!(p.silver_per_gram, Decimal::new(2, 0));
    }

    #[test]
    fn sanitized_prices_are_capped() {
        let p = MetalPrices {
            gold_per_gram: Decimal::MAX,
            silver_per_gram: Decimal::MAX,
        }
        .sanitized();
        assert_eq!(p.gold_per_gram, MAX_AMOUNT);
        assert_eq!(
            nisab_threshold(NisabStandard::Silver, &p),
            SILVER_NISAB_GRAMS * MAX_AMOUNT
        );
    }

    #[test]
    fn threshold_saturates_on_raw_prices() {
        let raw = MetalPrices {
            gold_per_gram: Decimal::MAX,
            silver_per_gram: Decimal::ONE,
        };
        assert_eq!(nisab_threshold(NisabStandard::Gold, &raw), Decimal::MAX);
    }
}
