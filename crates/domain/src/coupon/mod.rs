//! Coupon codes, eligibility policy, redemption and administration input.

mod draft;
mod policy;
mod redemption;

pub use draft::{CouponDraft, validate_coupon_update};
pub use policy::CouponPolicy;
pub use redemption::{RedeemedCoupon, RedemptionError, redeem_coupon};

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Longest accepted coupon code after trimming.
pub const MAX_COUPON_CODE_LEN: usize = 64;

/// A normalized coupon code: trimmed and upper-cased.
///
/// Codes are matched case-insensitively by normalizing on the way in, so
/// `" save500 "` and `"SAVE500"` name the same coupon.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CouponCode(String);

impl CouponCode {
    /// Normalizes and validates a raw code.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::MissingField {
                field: "coupon code",
            });
        }
        if trimmed.chars().count() > MAX_COUPON_CODE_LEN {
            return Err(ValidationError::TooLong {
                field: "coupon code",
                max: MAX_COUPON_CODE_LEN,
            });
        }
        Ok(Self(trimmed.to_uppercase()))
    }

    /// Returns the normalized code.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CouponCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for CouponCode {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CouponCode> for String {
    fn from(code: CouponCode) -> Self {
        code.0
    }
}

impl AsRef<str> for CouponCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
