//! Domain error types.

use thiserror::Error;

/// Reasons a coupon cannot be applied.
///
/// Each variant carries a distinct caller-facing message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CouponError {
    /// No coupon exists with the given code.
    #[error("Invalid coupon code")]
    InvalidCoupon,

    /// The coupon has been deactivated.
    #[error("This coupon is no longer active")]
    CouponNotActive,

    /// The coupon's expiry time has passed.
    #[error("This coupon has expired")]
    CouponExpired,

    /// The user has reached their personal limit for this coupon.
    #[error("You have already used this coupon")]
    CouponAlreadyUsed,

    /// The coupon's global usage budget is exhausted.
    #[error("This coupon has reached its usage limit")]
    CouponLimitReached,
}

impl CouponError {
    /// Returns a stable machine-readable reason code.
    pub fn reason(&self) -> &'static str {
        match self {
            CouponError::InvalidCoupon => "invalid_coupon",
            CouponError::CouponNotActive => "coupon_not_active",
            CouponError::CouponExpired => "coupon_expired",
            CouponError::CouponAlreadyUsed => "coupon_already_used",
            CouponError::CouponLimitReached => "coupon_limit_reached",
        }
    }
}

/// Malformed or incomplete input. Reported before any state is touched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field was missing or blank.
    #[error("{field} is required")]
    MissingField { field: &'static str },

    /// A text field exceeded its maximum length.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: &'static str, max: usize },

    /// A numeric field must be strictly positive.
    #[error("{field} must be greater than 0 (got {value})")]
    NotPositive { field: &'static str, value: i64 },

    /// A partial update did not change anything.
    #[error("Update contains no changes")]
    EmptyUpdate,

    /// A partial update tried to revive an inactive or expired coupon.
    #[error("{field} cannot be restored once the coupon is {state}")]
    IrreversibleChange {
        field: &'static str,
        state: &'static str,
    },

    /// A batch was empty or too large.
    #[error("Batch must contain between 1 and {max} records (got {len})")]
    BatchSize { len: usize, max: usize },

    /// One record of a batch was invalid.
    #[error("Record {index}: {reason}")]
    InvalidRecord {
        index: usize,
        reason: Box<ValidationError>,
    },
}
