//! Shared types used across the toolkit purchase engine crates.

pub mod types;

pub use types::{CouponId, Money, OpportunityId, PurchaseId, ToolkitId, UserId};
