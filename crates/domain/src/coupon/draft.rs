use chrono::{DateTime, Utc};
use common::{CouponId, Money};
use purchase_store::{CouponUpdate, NewCoupon};
use serde::Deserialize;

use super::CouponCode;
use crate::error::ValidationError;

/// Administrative input for a new coupon.
#[derive(Debug, Clone, Deserialize)]
pub struct CouponDraft {
    pub code: CouponCode,
    pub discount_amount: Money,
    #[serde(default)]
    pub max_uses: Option<i32>,
    #[serde(default)]
    pub max_uses_per_user: Option<i32>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

fn default_active() -> bool {
    true
}

impl CouponDraft {
    /// Checks the draft and turns it into an insertable coupon with a fresh id.
    pub fn validate(self) -> Result<NewCoupon, ValidationError> {
        check_discount(self.discount_amount)?;
        check_limit("max_uses", self.max_uses)?;
        check_limit("max_uses_per_user", self.max_uses_per_user)?;

        Ok(NewCoupon {
            id: CouponId::new(),
            code: self.code.into(),
            discount_amount: self.discount_amount,
            max_uses: self.max_uses,
            max_uses_per_user: self.max_uses_per_user,
            is_active: self.is_active,
            expires_at: self.expires_at,
        })
    }
}

/// Checks a partial coupon update before it reaches the store.
///
/// Limits may be cleared with `Some(None)` but never set below one.
pub fn validate_coupon_update(update: &CouponUpdate) -> Result<(), ValidationError> {
    if update.is_empty() {
        return Err(ValidationError::EmptyUpdate);
    }
    if let Some(discount) = update.discount_amount {
        check_discount(discount)?;
    }
    if let Some(max_uses) = update.max_uses {
        check_limit("max_uses", max_uses)?;
    }
    if let Some(per_user) = update.max_uses_per_user {
        check_limit("max_uses_per_user", per_user)?;
    }
    Ok(())
}

fn check_discount(discount: Money) -> Result<(), ValidationError> {
    if discount.minor() <= 0 {
        return Err(ValidationError::NotPositive {
            field: "discount_amount",
            value: discount.minor(),
        });
    }
    Ok(())
}

fn check_limit(field: &'static str, limit: Option<i32>) -> Result<(), ValidationError> {
    match limit {
        Some(value) if value < 1 => Err(ValidationError::NotPositive {
            field,
            value: i64::from(value),
        }),
        _ => Ok(()),
    }
}
