//! Checkout orchestration for toolkit purchases.
//!
//! The purchase flow:
//! 1. Price the toolkit and, if a coupon is given, redeem one use inside a
//!    store transaction together with the new purchase record
//! 2. Commit, then create a payment order at the gateway (skipped when the
//!    price is zero, in which case the record is already completed)
//! 3. Verify the gateway's signed callback and complete the record
//!
//! Coupon administration and bulk opportunity ingest live here as well.

pub mod admin;
pub mod error;
pub mod gateway;
pub mod ingest;
pub mod manager;

pub use admin::CouponAdmin;
pub use error::CheckoutError;
pub use gateway::{GatewayError, GatewayOrder, InMemoryPaymentGateway, PaymentGateway};
pub use ingest::IngestService;
pub use manager::{
    CouponPreview, InitiatedPurchase, PaymentCallback, PurchaseManager, VerifiedPurchase,
};
