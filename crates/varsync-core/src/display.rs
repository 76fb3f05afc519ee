//! Presentation helpers for option widgets: swatch colors and price badges.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

use crate::classifier::named_color_hex;
use crate::resolver::Variant;

/// Swatch color used when a value is neither a hex code nor a known name.
pub const FALLBACK_SWATCH: &str = "#cccccc";

/// Resolves an option value to a CSS color. Values starting with `#` pass
/// through unchanged.
#[must_use]
pub fn swatch_hex(value: &str) -> &str {
    let trimmed = value.trim();
    if trimmed.starts_with('#') {
        return trimmed;
    }
    named_color_hex(trimmed).unwrap_or(FALLBACK_SWATCH)
}

/// White swatches disappear on a white page and get an outline.
#[must_use]
pub fn swatch_needs_outline(hex: &str) -> bool {
    hex.eq_ignore_ascii_case("#ffffff") || hex.eq_ignore_ascii_case("#fff")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PriceSummary {
    pub price: Decimal,
    pub compare_at_price: Option<Decimal>,
    pub on_sale: bool,
    pub savings_amount: Option<Decimal>,
    /// Whole percent, rounded half away from zero.
    pub savings_percent: Option<u32>,
}

impl PriceSummary {
    #[must_use]
    pub fn new(price: Decimal, compare_at_price: Option<Decimal>) -> Self {
        let sale_reference = compare_at_price.filter(|c| *c > price && !c.is_zero());
        let savings_amount = sale_reference.map(|c| c - price);
        let savings_percent = sale_reference.and_then(|c| {
            ((c - price) / c * Decimal::ONE_HUNDRED)
                .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
                .to_u32()
        });

        Self {
            price,
            compare_at_price,
            on_sale: sale_reference.is_some(),
            savings_amount,
            savings_percent,
        }
    }

    #[must_use]
    pub fn for_variant(variant: &Variant) -> Self {
        Self::new(variant.price, variant.compare_at_price)
    }
}

/// `$1234.50` style formatting with exactly two decimals.
#[must_use]
pub fn format_usd(amount: Decimal) -> String {
    let mut rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    format!("${rounded}")
}
