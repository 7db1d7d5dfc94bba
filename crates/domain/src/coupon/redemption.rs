use chrono::{DateTime, Utc};
use common::{CouponId, Money, UserId};
use purchase_store::{StoreError, StoreTransaction};
use thiserror::Error;

use super::{CouponCode, CouponPolicy};
use crate::error::CouponError;

/// A coupon use that has been consumed inside the caller's transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedeemedCoupon {
    pub coupon_id: CouponId,
    pub code: CouponCode,
    pub discount_amount: Money,
}

/// Errors that can occur while redeeming a coupon.
#[derive(Debug, Error)]
pub enum RedemptionError {
    /// The coupon cannot be applied.
    #[error(transparent)]
    Coupon(#[from] CouponError),

    /// The store failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Consumes one use of a coupon inside an open store transaction.
///
/// The coupon is re-read and re-checked inside `tx`, then its counter is
/// bumped with a conditional update that only matches while
/// `current_uses < max_uses` (or the coupon is unlimited). Exactly one row
/// must be affected; zero rows means another transaction took the last use
/// after our read, and the redemption fails with `CouponLimitReached`.
///
/// On any error the caller must roll `tx` back (or drop it) so no partial
/// increment or purchase record survives.
///
/// The per-user check counts only completed purchases and is not serialized:
/// two concurrent first purchases by the same user can both pass it. The
/// global budget, by contrast, is consumed at initiation, so abandoned
/// pending purchases still use it up.
#[tracing::instrument(skip(tx, code, user_id), fields(code = %code, %user_id))]
pub async fn redeem_coupon(
    tx: &mut dyn StoreTransaction,
    code: &CouponCode,
    user_id: UserId,
    now: DateTime<Utc>,
) -> Result<RedeemedCoupon, RedemptionError> {
    let result = redeem(tx, code, user_id, now).await;

    match &result {
        Ok(redeemed) => {
            metrics::counter!("coupon_redemptions_total").increment(1);
            tracing::info!(coupon_id = %redeemed.coupon_id, "coupon redeemed");
        }
        Err(RedemptionError::Coupon(err)) => {
            metrics::counter!("coupon_redemption_rejections_total", "reason" => err.reason())
                .increment(1);
            tracing::info!(reason = err.reason(), "coupon redemption rejected");
        }
        Err(RedemptionError::Store(err)) => {
            tracing::error!(error = %err, "coupon redemption failed");
        }
    }

    result
}

async fn redeem(
    tx: &mut dyn StoreTransaction,
    code: &CouponCode,
    user_id: UserId,
    now: DateTime<Utc>,
) -> Result<RedeemedCoupon, RedemptionError> {
    let policy = CouponPolicy::at(now);

    let coupon = tx
        .find_coupon_by_code(code.as_str())
        .await?
        .ok_or(CouponError::InvalidCoupon)?;

    policy.check_status(&coupon)?;

    if coupon.max_uses_per_user.is_some() {
        let completed = tx.count_completed_with_coupon(user_id, coupon.id).await?;
        policy.check_user_limit(&coupon, completed)?;
    }

    policy.check_global_limit(&coupon)?;

    let affected = tx.increment_coupon_uses(coupon.id).await?;
    if affected != 1 {
        tracing::debug!(coupon_id = %coupon.id, affected, "conditional increment lost the race");
        return Err(CouponError::CouponLimitReached.into());
    }

    Ok(RedeemedCoupon {
        coupon_id: coupon.id,
        code: code.clone(),
        discount_amount: coupon.discount_amount,
    })
}
