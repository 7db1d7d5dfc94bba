//! Relational store for the toolkit purchase engine.
//!
//! The store is an external collaborator reached only through transactional
//! reads, inserts and conditional updates that report affected row counts.
//! Two implementations are provided: PostgreSQL for deployments and an
//! in-memory store with the same contract for tests and local runs.

pub mod error;
pub mod memory;
pub mod model;
pub mod postgres;
pub mod store;

pub use common::{CouponId, Money, OpportunityId, PurchaseId, ToolkitId, UserId};
pub use error::{Result, StoreError};
pub use memory::InMemoryPurchaseStore;
pub use model::{
    Coupon, CouponUpdate, NewCoupon, NewOpportunity, NewPurchase, PaymentStatus, PurchaseRecord,
    PurchaseUpdate, Toolkit,
};
pub use postgres::PostgresPurchaseStore;
pub use store::{PurchaseStore, StoreTransaction};
