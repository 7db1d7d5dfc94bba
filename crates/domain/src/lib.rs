//! Domain layer for the toolkit purchase engine.
//!
//! This crate provides the policy that the checkout flow relies on:
//! - Pricing of a toolkit after a flat coupon discount
//! - Coupon code normalization, eligibility policy and the race-safe
//!   redemption that runs inside a store transaction
//! - Validation of administrative coupon drafts and partial updates
//! - HMAC payment signature verification and bearer token checks, both
//!   built on constant-time comparison

pub mod coupon;
pub mod error;
pub mod ingest;
pub mod pricing;
pub mod security;

pub use coupon::{
    CouponCode, CouponDraft, CouponPolicy, RedeemedCoupon, RedemptionError, redeem_coupon,
    validate_coupon_update,
};
pub use error::{CouponError, ValidationError};
pub use ingest::{MAX_INGEST_BATCH, validate_opportunity_batch};
pub use pricing::{PriceQuote, final_price};
pub use security::{
    PaymentVerifier, SignatureError, TokenAuthError, TokenAuthenticator, bearer_token,
};
