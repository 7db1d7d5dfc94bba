//! Purchase lifecycle: coupon preview, initiation, payment finalization and
//! access checks.

use std::time::Instant;

use chrono::Utc;
use common::{Money, PurchaseId, ToolkitId, UserId};
use domain::{
    CouponCode, CouponError, CouponPolicy, PaymentVerifier, PriceQuote, ValidationError,
    redeem_coupon,
};
use purchase_store::{
    NewPurchase, PaymentStatus, PurchaseRecord, PurchaseStore, PurchaseUpdate, StoreTransaction,
    Toolkit,
};
use serde::{Deserialize, Serialize};

use crate::error::{CheckoutError, Result};
use crate::gateway::{GatewayOrder, PaymentGateway};

/// Read-only outcome of checking a coupon against a toolkit.
///
/// A coupon that cannot be applied is a normal answer here, not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CouponPreview {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discount_amount: Option<Money>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_price: Option<Money>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CouponPreview {
    fn accepted(quote: PriceQuote) -> Self {
        Self {
            valid: true,
            discount_amount: Some(quote.discount_amount),
            final_price: Some(quote.final_price),
            error: None,
        }
    }

    fn rejected(err: CouponError) -> Self {
        Self {
            valid: false,
            discount_amount: None,
            final_price: None,
            error: Some(err.to_string()),
        }
    }
}

/// Result of starting a purchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InitiatedPurchase {
    pub purchase_id: PurchaseId,
    /// True when the price was fully discounted and access is already granted.
    pub free: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<GatewayOrder>,
    pub final_price: Money,
    pub discount_amount: Money,
}

/// Identifiers the client receives from the gateway after paying.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentCallback {
    pub order_id: String,
    pub payment_id: String,
    pub signature: String,
}

impl PaymentCallback {
    fn check_present(&self) -> std::result::Result<(), ValidationError> {
        for (field, value) in [
            ("order_id", &self.order_id),
            ("payment_id", &self.payment_id),
            ("signature", &self.signature),
        ] {
            if value.trim().is_empty() {
                return Err(ValidationError::MissingField { field });
            }
        }
        Ok(())
    }
}

/// Result of a verified payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerifiedPurchase {
    pub success: bool,
    pub purchase_id: PurchaseId,
}

/// Drives purchase records from initiation to completion.
///
/// Coupon redemption and record creation share one store transaction. The
/// gateway order is created only after that transaction commits, so no lock
/// is held across the network call. If the gateway then fails, the coupon
/// use already consumed is not given back and the record stays pending.
pub struct PurchaseManager<S, G>
where
    S: PurchaseStore,
    G: PaymentGateway,
{
    store: S,
    gateway: G,
    verifier: PaymentVerifier,
    currency: String,
}

impl<S, G> PurchaseManager<S, G>
where
    S: PurchaseStore,
    G: PaymentGateway,
{
    /// Creates a new purchase manager.
    pub fn new(
        store: S,
        gateway: G,
        verifier: PaymentVerifier,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            store,
            gateway,
            verifier,
            currency: currency.into(),
        }
    }

    /// Previews a coupon for a toolkit without consuming a use.
    ///
    /// The per-user limit is only checked when the caller is known.
    #[tracing::instrument(skip(self, code))]
    pub async fn validate_coupon(
        &self,
        code: &str,
        toolkit_id: ToolkitId,
        user_id: Option<UserId>,
    ) -> Result<CouponPreview> {
        let code = CouponCode::parse(code)?;
        let toolkit = self.active_toolkit(toolkit_id).await?;

        let Some(coupon) = self.store.find_coupon_by_code(code.as_str()).await? else {
            return Ok(CouponPreview::rejected(CouponError::InvalidCoupon));
        };

        let completed = match (user_id, coupon.max_uses_per_user) {
            (Some(user_id), Some(_)) => {
                self.store
                    .count_completed_with_coupon(user_id, coupon.id)
                    .await?
            }
            _ => 0,
        };

        Ok(match CouponPolicy::now().check(&coupon, completed) {
            Ok(()) => CouponPreview::accepted(PriceQuote::new(
                toolkit.price,
                Some(coupon.discount_amount),
            )),
            Err(err) => CouponPreview::rejected(err),
        })
    }

    /// Starts a purchase of a toolkit, optionally with a coupon.
    ///
    /// A fully discounted purchase is recorded as completed straight away and
    /// no gateway order is created. Otherwise a pending record is created and
    /// the gateway order id is attached to it.
    #[tracing::instrument(skip(self, coupon_code))]
    pub async fn initiate(
        &self,
        user_id: UserId,
        toolkit_id: ToolkitId,
        coupon_code: Option<&str>,
    ) -> Result<InitiatedPurchase> {
        let started = Instant::now();

        let code = coupon_code
            .filter(|raw| !raw.trim().is_empty())
            .map(CouponCode::parse)
            .transpose()?;
        let toolkit = self.active_toolkit(toolkit_id).await?;

        // Race-prone pre-check; a duplicate completed record is harmless for access
        if self
            .store
            .has_completed_purchase(user_id, toolkit_id)
            .await?
        {
            return Err(CheckoutError::AlreadyPurchased);
        }

        let mut tx = self.store.begin().await?;
        let (record, quote) =
            match Self::open_purchase(tx.as_mut(), &toolkit, user_id, code.as_ref()).await {
                Ok(opened) => opened,
                Err(err) => {
                    if let Err(rollback_err) = tx.rollback().await {
                        tracing::warn!(error = %rollback_err, "rollback failed");
                    }
                    return Err(err);
                }
            };
        tx.commit().await?;

        if quote.is_free() {
            metrics::counter!("purchases_initiated_total", "path" => "free").increment(1);
            metrics::counter!("purchases_completed_total").increment(1);
            metrics::histogram!("purchase_initiate_duration_seconds")
                .record(started.elapsed().as_secs_f64());
            tracing::info!(purchase_id = %record.id, "free purchase completed");

            return Ok(InitiatedPurchase {
                purchase_id: record.id,
                free: true,
                order: None,
                final_price: quote.final_price,
                discount_amount: quote.discount_amount,
            });
        }

        let order = match self
            .gateway
            .create_order(quote.final_price, &self.currency, &record.id.to_string())
            .await
        {
            Ok(order) => order,
            Err(err) => {
                tracing::error!(
                    purchase_id = %record.id,
                    coupon_id = ?record.coupon_id,
                    error = %err,
                    "gateway order failed; purchase left pending, coupon use not returned"
                );
                return Err(err.into());
            }
        };

        let attached = self
            .store
            .update_purchase(
                record.id,
                &PurchaseUpdate::attach_order(order.id.clone()),
                Some(PaymentStatus::Pending),
            )
            .await?;
        if attached != 1 {
            tracing::error!(
                purchase_id = %record.id,
                order_id = %order.id,
                attached,
                "gateway order could not be attached to the purchase"
            );
            return Err(CheckoutError::OrderNotAttached(record.id));
        }

        metrics::counter!("purchases_initiated_total", "path" => "paid").increment(1);
        metrics::histogram!("purchase_initiate_duration_seconds")
            .record(started.elapsed().as_secs_f64());
        tracing::info!(purchase_id = %record.id, order_id = %order.id, "purchase initiated");

        Ok(InitiatedPurchase {
            purchase_id: record.id,
            free: false,
            order: Some(order),
            final_price: quote.final_price,
            discount_amount: quote.discount_amount,
        })
    }

    /// Verifies a payment callback and completes the matching record.
    ///
    /// Repeating a successful callback with the same payment id succeeds
    /// again without changes.
    #[tracing::instrument(skip(self, callback), fields(order_id = %callback.order_id))]
    pub async fn finalize(
        &self,
        user_id: UserId,
        toolkit_id: ToolkitId,
        callback: &PaymentCallback,
    ) -> Result<VerifiedPurchase> {
        callback.check_present()?;
        self.verifier.verify(
            &callback.order_id,
            &callback.payment_id,
            &callback.signature,
        )?;

        let record = self
            .store
            .find_purchase_by_order(&callback.order_id, toolkit_id)
            .await?
            .ok_or(CheckoutError::PurchaseNotFound)?;

        if record.user_id != user_id {
            tracing::warn!(purchase_id = %record.id, "payment callback from non-owner");
            return Err(CheckoutError::Forbidden);
        }

        if record.payment_status.can_complete() {
            let affected = self
                .store
                .update_purchase(
                    record.id,
                    &PurchaseUpdate::complete(callback.payment_id.clone()),
                    Some(PaymentStatus::Pending),
                )
                .await?;

            if affected == 1 {
                metrics::counter!("purchases_completed_total").increment(1);
                tracing::info!(purchase_id = %record.id, "purchase completed");
                return Ok(VerifiedPurchase {
                    success: true,
                    purchase_id: record.id,
                });
            }
        }

        // Already completed, possibly by a concurrent callback
        let current = self
            .store
            .get_purchase(record.id)
            .await?
            .ok_or(CheckoutError::PurchaseNotFound)?;
        Self::confirm_repeat(&current, &callback.payment_id)
    }

    /// Returns true if the user has a completed purchase of the toolkit.
    pub async fn has_access(&self, user_id: UserId, toolkit_id: ToolkitId) -> Result<bool> {
        Ok(self
            .store
            .has_completed_purchase(user_id, toolkit_id)
            .await?)
    }

    async fn active_toolkit(&self, toolkit_id: ToolkitId) -> Result<Toolkit> {
        self.store
            .get_toolkit(toolkit_id)
            .await?
            .filter(|toolkit| toolkit.is_active)
            .ok_or(CheckoutError::ToolkitNotFound(toolkit_id))
    }

    /// Redeems the coupon (if any) and inserts the purchase record inside `tx`.
    async fn open_purchase(
        tx: &mut dyn StoreTransaction,
        toolkit: &Toolkit,
        user_id: UserId,
        code: Option<&CouponCode>,
    ) -> Result<(PurchaseRecord, PriceQuote)> {
        let redeemed = match code {
            Some(code) => Some(redeem_coupon(tx, code, user_id, Utc::now()).await?),
            None => None,
        };

        let quote = PriceQuote::new(
            toolkit.price,
            redeemed.as_ref().map(|r| r.discount_amount),
        );
        let payment_status = if quote.is_free() {
            PaymentStatus::Completed
        } else {
            PaymentStatus::Pending
        };

        let record = tx
            .insert_purchase(&NewPurchase {
                id: PurchaseId::new(),
                user_id,
                toolkit_id: toolkit.id,
                coupon_id: redeemed.map(|r| r.coupon_id),
                payment_status,
                amount_paid: quote.final_price,
            })
            .await?;

        Ok((record, quote))
    }

    fn confirm_repeat(record: &PurchaseRecord, payment_id: &str) -> Result<VerifiedPurchase> {
        if record.payment_status.grants_access()
            && record.payment_id.as_deref() == Some(payment_id)
        {
            Ok(VerifiedPurchase {
                success: true,
                purchase_id: record.id,
            })
        } else {
            Err(CheckoutError::AlreadyPurchased)
        }
    }
}
