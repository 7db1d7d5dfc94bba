//! Toolkit pricing.

use common::Money;
use serde::Serialize;

/// Computes the price charged after an optional flat discount.
///
/// Total and side-effect free: a discount larger than the base price floors
/// the result at zero instead of failing, which is what routes a purchase
/// onto the free path.
pub fn final_price(base_price: Money, discount: Option<Money>) -> Money {
    base_price.saturating_sub_floor_zero(discount.unwrap_or_default())
}

/// A priced purchase: base price, applied discount and what is charged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PriceQuote {
    pub base_price: Money,
    pub discount_amount: Money,
    pub final_price: Money,
}

impl PriceQuote {
    /// Prices a toolkit with an optional coupon discount.
    pub fn new(base_price: Money, discount: Option<Money>) -> Self {
        Self {
            base_price,
            discount_amount: discount.unwrap_or_default(),
            final_price: final_price(base_price, discount),
        }
    }

    /// Returns true if nothing needs to be charged.
    pub fn is_free(&self) -> bool {
        self.final_price.is_zero()
    }
}
