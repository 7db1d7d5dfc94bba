//! Checkout error types.

use common::{CouponId, PurchaseId, ToolkitId};
use domain::{CouponError, RedemptionError, SignatureError, ValidationError};
use purchase_store::StoreError;
use thiserror::Error;

use crate::gateway::GatewayError;

/// Errors that can occur during checkout and coupon administration.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// Input was malformed. Nothing was written.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The coupon cannot be applied. The redemption was rolled back.
    #[error(transparent)]
    Coupon(#[from] CouponError),

    /// The payment callback carried a bad signature.
    #[error(transparent)]
    Signature(#[from] SignatureError),

    /// The toolkit does not exist or is not for sale.
    #[error("Toolkit not found: {0}")]
    ToolkitNotFound(ToolkitId),

    /// No coupon has the given id.
    #[error("Coupon not found: {0}")]
    CouponNotFound(CouponId),

    /// No purchase record matches the order.
    #[error("Purchase not found")]
    PurchaseNotFound,

    /// The purchase record belongs to another user.
    #[error("Purchase belongs to another user")]
    Forbidden,

    /// The caller already owns the toolkit, or the order was completed with
    /// a different payment.
    #[error("Toolkit already purchased")]
    AlreadyPurchased,

    /// Another coupon already uses this code.
    #[error("Coupon code already exists: {0}")]
    DuplicateCouponCode(String),

    /// A new global limit would be below the uses already consumed.
    #[error("max_uses {max_uses} is below current uses {current_uses}")]
    MaxUsesBelowCurrentUses { max_uses: i32, current_uses: i32 },

    /// The gateway order was created but the pending record could not
    /// take its id.
    #[error("Order could not be attached to purchase {0}")]
    OrderNotAttached(PurchaseId),

    /// The payment gateway failed.
    #[error("Payment gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// The store failed.
    #[error("Store error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for CheckoutError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateCouponCode(code) => CheckoutError::DuplicateCouponCode(code),
            other => CheckoutError::Store(other),
        }
    }
}

impl From<RedemptionError> for CheckoutError {
    fn from(err: RedemptionError) -> Self {
        match err {
            RedemptionError::Coupon(err) => CheckoutError::Coupon(err),
            RedemptionError::Store(err) => err.into(),
        }
    }
}

/// Convenience type alias for checkout results.
pub type Result<T> = std::result::Result<T, CheckoutError>;
