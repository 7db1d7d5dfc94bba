use chrono::{DateTime, Utc};
use purchase_store::{Coupon, CouponUpdate};

use crate::error::{CouponError, ValidationError};

/// Point-in-time coupon eligibility rules.
///
/// Checks run in a fixed order: active flag, expiry, the user's own limit,
/// then the global budget. The policy only reads the state it is handed;
/// on its own it cannot stop two callers from passing at the same time.
/// That is the job of the conditional increment in [`crate::redeem_coupon`].
#[derive(Debug, Clone, Copy)]
pub struct CouponPolicy {
    now: DateTime<Utc>,
}

impl CouponPolicy {
    /// Creates a policy evaluated at `now`.
    pub fn at(now: DateTime<Utc>) -> Self {
        Self { now }
    }

    /// Creates a policy evaluated at the current time.
    pub fn now() -> Self {
        Self::at(Utc::now())
    }

    /// Checks the one-way flags: inactive and expired coupons never come back.
    pub fn check_status(&self, coupon: &Coupon) -> Result<(), CouponError> {
        if !coupon.is_active {
            return Err(CouponError::CouponNotActive);
        }
        if coupon.is_expired_at(self.now) {
            return Err(CouponError::CouponExpired);
        }
        Ok(())
    }

    /// Checks the per-user limit against the user's completed purchases.
    pub fn check_user_limit(
        &self,
        coupon: &Coupon,
        completed_by_user: i64,
    ) -> Result<(), CouponError> {
        match coupon.max_uses_per_user {
            Some(limit) if completed_by_user >= i64::from(limit) => {
                Err(CouponError::CouponAlreadyUsed)
            }
            _ => Ok(()),
        }
    }

    /// Checks the global budget against the observed `current_uses`.
    pub fn check_global_limit(&self, coupon: &Coupon) -> Result<(), CouponError> {
        if coupon.has_remaining_uses() {
            Ok(())
        } else {
            Err(CouponError::CouponLimitReached)
        }
    }

    /// Runs every check in order.
    pub fn check(&self, coupon: &Coupon, completed_by_user: i64) -> Result<(), CouponError> {
        self.check_status(coupon)?;
        self.check_user_limit(coupon, completed_by_user)?;
        self.check_global_limit(coupon)
    }

    /// Checks that an administrative update keeps the status flags one-way.
    ///
    /// An inactive coupon cannot be switched back on, and an expired coupon
    /// cannot have its expiry cleared or moved past `now`.
    pub fn check_update(
        &self,
        coupon: &Coupon,
        update: &CouponUpdate,
    ) -> Result<(), ValidationError> {
        if !coupon.is_active && update.is_active == Some(true) {
            return Err(ValidationError::IrreversibleChange {
                field: "is_active",
                state: "inactive",
            });
        }

        if let Some(expires_at) = update.expires_at
            && coupon.is_expired_at(self.now)
            && !expires_at.is_some_and(|at| at <= self.now)
        {
            return Err(ValidationError::IrreversibleChange {
                field: "expires_at",
                state: "expired",
            });
        }
        Ok(())
    }
}
