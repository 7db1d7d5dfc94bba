//! Timing-safe checks guarding the payment callback and the trusted
//! ingest and admin endpoints.

pub mod constant_time;
mod signature;
mod token;

pub use signature::{PaymentVerifier, SignatureError};
pub use token::{TokenAuthError, TokenAuthenticator, bearer_token};
