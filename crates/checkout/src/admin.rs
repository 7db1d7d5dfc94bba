//! Coupon administration.

use common::CouponId;
use domain::{CouponDraft, CouponPolicy, validate_coupon_update};
use purchase_store::{Coupon, CouponUpdate, PurchaseStore};

use crate::error::{CheckoutError, Result};

/// Creates, updates and inspects coupons.
pub struct CouponAdmin<S: PurchaseStore> {
    store: S,
}

impl<S: PurchaseStore> CouponAdmin<S> {
    /// Creates a new coupon administrator.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Validates a draft and stores the coupon.
    #[tracing::instrument(skip(self, draft), fields(code = %draft.code))]
    pub async fn create(&self, draft: CouponDraft) -> Result<Coupon> {
        let coupon = self.store.insert_coupon(&draft.validate()?).await?;
        tracing::info!(coupon_id = %coupon.id, "coupon created");
        Ok(coupon)
    }

    /// Loads a coupon with its current usage.
    pub async fn get(&self, id: CouponId) -> Result<Coupon> {
        self.store
            .get_coupon(id)
            .await?
            .ok_or(CheckoutError::CouponNotFound(id))
    }

    /// Applies a partial update and returns the updated coupon.
    ///
    /// Deactivation and expiry are one-way: an update that would revive the
    /// coupon is refused. The store write is conditional on the same rules
    /// and on `max_uses` not falling below the uses already consumed, so a
    /// concurrent change cannot slip in between the check here and the write.
    #[tracing::instrument(skip(self, update))]
    pub async fn update(&self, id: CouponId, update: CouponUpdate) -> Result<Coupon> {
        validate_coupon_update(&update)?;
        let current = self.get(id).await?;
        CouponPolicy::now().check_update(&current, &update)?;

        let affected = self.store.update_coupon(id, &update).await?;
        let coupon = self.get(id).await?;

        if affected == 0 {
            // The coupon changed after our read
            CouponPolicy::now().check_update(&coupon, &update)?;
            if let Some(Some(max_uses)) = update.max_uses {
                return Err(CheckoutError::MaxUsesBelowCurrentUses {
                    max_uses,
                    current_uses: coupon.current_uses,
                });
            }
            return Err(CheckoutError::CouponNotFound(id));
        }

        tracing::info!(coupon_id = %id, "coupon updated");
        Ok(coupon)
    }
}
