use async_trait::async_trait;

use crate::{
    Coupon, CouponId, CouponUpdate, NewCoupon, NewOpportunity, NewPurchase, PaymentStatus,
    PurchaseId, PurchaseRecord, PurchaseUpdate, Result, Toolkit, ToolkitId, UserId,
};

/// Core trait for purchase store implementations.
///
/// Plain methods run as single statements outside any caller-visible
/// transaction. Multi-step work that must commit or roll back as a unit
/// goes through [`PurchaseStore::begin`].
///
/// All implementations must be thread-safe (Send + Sync). No in-process
/// locking may be relied upon for correctness: several server processes can
/// share one database.
#[async_trait]
pub trait PurchaseStore: Send + Sync {
    /// Opens a new atomic transaction.
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>>;

    /// Inserts or replaces a toolkit.
    async fn upsert_toolkit(&self, toolkit: &Toolkit) -> Result<()>;

    /// Loads a toolkit by id.
    async fn get_toolkit(&self, id: ToolkitId) -> Result<Option<Toolkit>>;

    /// Inserts a coupon.
    ///
    /// Fails with `DuplicateCouponCode` if the normalized code is taken.
    async fn insert_coupon(&self, coupon: &NewCoupon) -> Result<Coupon>;

    /// Loads a coupon by id.
    async fn get_coupon(&self, id: CouponId) -> Result<Option<Coupon>>;

    /// Loads a coupon by its normalized code.
    async fn find_coupon_by_code(&self, code: &str) -> Result<Option<Coupon>>;

    /// Applies a partial update to a coupon and returns the affected row count.
    ///
    /// When the update sets a new `max_uses`, the write is conditional on
    /// `current_uses` not exceeding it, so zero rows are affected if the new
    /// limit would already be broken. Likewise nothing is written when the
    /// update would reactivate an inactive coupon or lift the expiry of an
    /// expired one.
    async fn update_coupon(&self, id: CouponId, update: &CouponUpdate) -> Result<u64>;

    /// Loads a purchase record by id.
    async fn get_purchase(&self, id: PurchaseId) -> Result<Option<PurchaseRecord>>;

    /// Loads the purchase record created for a gateway order of a toolkit.
    async fn find_purchase_by_order(
        &self,
        order_id: &str,
        toolkit_id: ToolkitId,
    ) -> Result<Option<PurchaseRecord>>;

    /// Returns true if the user has a completed purchase of the toolkit.
    async fn has_completed_purchase(&self, user_id: UserId, toolkit_id: ToolkitId)
    -> Result<bool>;

    /// Counts the user's completed purchases that consumed the coupon.
    async fn count_completed_with_coupon(
        &self,
        user_id: UserId,
        coupon_id: CouponId,
    ) -> Result<i64>;

    /// Applies a partial update to a purchase record and returns the affected
    /// row count.
    ///
    /// If `only_if` is set the write only happens while the record is still in
    /// that status.
    async fn update_purchase(
        &self,
        id: PurchaseId,
        update: &PurchaseUpdate,
        only_if: Option<PaymentStatus>,
    ) -> Result<u64>;

    /// Inserts opportunity listings atomically and returns how many were written.
    async fn insert_opportunities(&self, records: &[NewOpportunity]) -> Result<u64>;
}

/// An open store transaction.
///
/// Dropping a transaction without calling [`StoreTransaction::commit`] rolls
/// it back.
#[async_trait]
pub trait StoreTransaction: Send {
    /// Loads a coupon by its normalized code.
    async fn find_coupon_by_code(&mut self, code: &str) -> Result<Option<Coupon>>;

    /// Counts the user's completed purchases that consumed the coupon.
    async fn count_completed_with_coupon(
        &mut self,
        user_id: UserId,
        coupon_id: CouponId,
    ) -> Result<i64>;

    /// Increments `current_uses` by one only while it is below `max_uses`
    /// (or `max_uses` is unset) and returns the affected row count.
    async fn increment_coupon_uses(&mut self, coupon_id: CouponId) -> Result<u64>;

    /// Inserts a purchase record.
    async fn insert_purchase(&mut self, purchase: &NewPurchase) -> Result<PurchaseRecord>;

    /// Commits every write made through this transaction.
    async fn commit(self: Box<Self>) -> Result<()>;

    /// Discards every write made through this transaction.
    async fn rollback(self: Box<Self>) -> Result<()>;
}
