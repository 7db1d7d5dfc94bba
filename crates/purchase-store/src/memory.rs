use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;

use crate::{
    Coupon, CouponId, CouponUpdate, NewCoupon, NewOpportunity, NewPurchase, OpportunityId,
    PaymentStatus, PurchaseId, PurchaseRecord, PurchaseUpdate, Result, StoreError, Toolkit,
    ToolkitId, UserId,
    store::{PurchaseStore, StoreTransaction},
};

#[derive(Debug, Default)]
struct MemoryState {
    toolkits: HashMap<ToolkitId, Toolkit>,
    coupons: HashMap<CouponId, Coupon>,
    purchases: Vec<PurchaseRecord>,
    opportunities: Vec<(OpportunityId, NewOpportunity)>,
}

impl MemoryState {
    fn coupon_by_code(&self, code: &str) -> Option<&Coupon> {
        self.coupons.values().find(|c| c.code == code)
    }

    fn count_completed_with_coupon(&self, user_id: UserId, coupon_id: CouponId) -> i64 {
        self.purchases
            .iter()
            .filter(|p| {
                p.user_id == user_id
                    && p.coupon_id == Some(coupon_id)
                    && p.payment_status == PaymentStatus::Completed
            })
            .count() as i64
    }
}

fn lock(state: &Mutex<MemoryState>) -> Result<MutexGuard<'_, MemoryState>> {
    state
        .lock()
        .map_err(|_| StoreError::Unavailable("in-memory store lock poisoned".to_string()))
}

/// In-memory purchase store for testing and local runs.
///
/// Mirrors the transactional contract of the PostgreSQL store: a coupon
/// increment is a single atomic conditional write against shared state and is
/// undone if its transaction rolls back, while inserted purchases only become
/// visible to other callers on commit.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPurchaseStore {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryPurchaseStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all committed purchase records that consumed the coupon.
    pub fn purchases_with_coupon(&self, coupon_id: CouponId) -> Result<Vec<PurchaseRecord>> {
        let state = lock(&self.state)?;
        Ok(state
            .purchases
            .iter()
            .filter(|p| p.coupon_id == Some(coupon_id))
            .cloned()
            .collect())
    }

    /// Returns the total number of committed purchase records.
    pub fn purchase_count(&self) -> Result<usize> {
        Ok(lock(&self.state)?.purchases.len())
    }

    /// Returns the total number of ingested opportunities.
    pub fn opportunity_count(&self) -> Result<usize> {
        Ok(lock(&self.state)?.opportunities.len())
    }
}

#[async_trait]
impl PurchaseStore for InMemoryPurchaseStore {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>> {
        Ok(Box::new(InMemoryTransaction {
            state: self.state.clone(),
            staged: Vec::new(),
            increments: Vec::new(),
            finished: false,
        }))
    }

    async fn upsert_toolkit(&self, toolkit: &Toolkit) -> Result<()> {
        lock(&self.state)?
            .toolkits
            .insert(toolkit.id, toolkit.clone());
        Ok(())
    }

    async fn get_toolkit(&self, id: ToolkitId) -> Result<Option<Toolkit>> {
        Ok(lock(&self.state)?.toolkits.get(&id).cloned())
    }

    async fn insert_coupon(&self, coupon: &NewCoupon) -> Result<Coupon> {
        let mut state = lock(&self.state)?;
        if state.coupon_by_code(&coupon.code).is_some() {
            return Err(StoreError::DuplicateCouponCode(coupon.code.clone()));
        }

        let stored = Coupon {
            id: coupon.id,
            code: coupon.code.clone(),
            discount_amount: coupon.discount_amount,
            max_uses: coupon.max_uses,
            current_uses: 0,
            max_uses_per_user: coupon.max_uses_per_user,
            is_active: coupon.is_active,
            expires_at: coupon.expires_at,
            created_at: Utc::now(),
        };
        state.coupons.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn get_coupon(&self, id: CouponId) -> Result<Option<Coupon>> {
        Ok(lock(&self.state)?.coupons.get(&id).cloned())
    }

    async fn find_coupon_by_code(&self, code: &str) -> Result<Option<Coupon>> {
        Ok(lock(&self.state)?.coupon_by_code(code).cloned())
    }

    async fn update_coupon(&self, id: CouponId, update: &CouponUpdate) -> Result<u64> {
        let mut state = lock(&self.state)?;
        let Some(coupon) = state.coupons.get_mut(&id) else {
            return Ok(0);
        };

        if let Some(Some(new_max)) = update.max_uses
            && coupon.current_uses > new_max
        {
            return Ok(0);
        }
        if !coupon.is_active && update.is_active == Some(true) {
            return Ok(0);
        }
        let now = Utc::now();
        if let Some(expires_at) = update.expires_at
            && coupon.is_expired_at(now)
            && !expires_at.is_some_and(|at| at <= now)
        {
            return Ok(0);
        }

        update.apply_to(coupon);
        Ok(1)
    }

    async fn get_purchase(&self, id: PurchaseId) -> Result<Option<PurchaseRecord>> {
        let state = lock(&self.state)?;
        Ok(state.purchases.iter().find(|p| p.id == id).cloned())
    }

    async fn find_purchase_by_order(
        &self,
        order_id: &str,
        toolkit_id: ToolkitId,
    ) -> Result<Option<PurchaseRecord>> {
        let state = lock(&self.state)?;
        Ok(state
            .purchases
            .iter()
            .find(|p| p.order_id.as_deref() == Some(order_id) && p.toolkit_id == toolkit_id)
            .cloned())
    }

    async fn has_completed_purchase(
        &self,
        user_id: UserId,
        toolkit_id: ToolkitId,
    ) -> Result<bool> {
        let state = lock(&self.state)?;
        Ok(state.purchases.iter().any(|p| {
            p.user_id == user_id
                && p.toolkit_id == toolkit_id
                && p.payment_status == PaymentStatus::Completed
        }))
    }

    async fn count_completed_with_coupon(
        &self,
        user_id: UserId,
        coupon_id: CouponId,
    ) -> Result<i64> {
        Ok(lock(&self.state)?.count_completed_with_coupon(user_id, coupon_id))
    }

    async fn update_purchase(
        &self,
        id: PurchaseId,
        update: &PurchaseUpdate,
        only_if: Option<PaymentStatus>,
    ) -> Result<u64> {
        let mut state = lock(&self.state)?;

        if let Some(order_id) = &update.order_id
            && state
                .purchases
                .iter()
                .any(|p| p.id != id && p.order_id.as_deref() == Some(order_id.as_str()))
        {
            return Err(StoreError::DuplicateOrderId(order_id.clone()));
        }

        let Some(record) = state.purchases.iter_mut().find(|p| p.id == id) else {
            return Ok(0);
        };
        if let Some(expected) = only_if
            && record.payment_status != expected
        {
            return Ok(0);
        }

        update.apply_to(record, Utc::now());
        Ok(1)
    }

    async fn insert_opportunities(&self, records: &[NewOpportunity]) -> Result<u64> {
        let mut state = lock(&self.state)?;
        state
            .opportunities
            .extend(records.iter().map(|r| (OpportunityId::new(), r.clone())));
        Ok(records.len() as u64)
    }
}

/// Transaction over the in-memory store.
struct InMemoryTransaction {
    state: Arc<Mutex<MemoryState>>,
    staged: Vec<PurchaseRecord>,
    increments: Vec<CouponId>,
    finished: bool,
}

impl InMemoryTransaction {
    fn undo_increments(&mut self) {
        if self.increments.is_empty() {
            return;
        }
        if let Ok(mut state) = self.state.lock() {
            for coupon_id in self.increments.drain(..) {
                if let Some(coupon) = state.coupons.get_mut(&coupon_id) {
                    coupon.current_uses -= 1;
                }
            }
        }
    }
}

impl Drop for InMemoryTransaction {
    fn drop(&mut self) {
        if !self.finished {
            tracing::debug!(
                increments = self.increments.len(),
                staged = self.staged.len(),
                "transaction dropped without commit, rolling back"
            );
            self.undo_increments();
        }
    }
}

#[async_trait]
impl StoreTransaction for InMemoryTransaction {
    async fn find_coupon_by_code(&mut self, code: &str) -> Result<Option<Coupon>> {
        Ok(lock(&self.state)?.coupon_by_code(code).cloned())
    }

    async fn count_completed_with_coupon(
        &mut self,
        user_id: UserId,
        coupon_id: CouponId,
    ) -> Result<i64> {
        let committed = lock(&self.state)?.count_completed_with_coupon(user_id, coupon_id);
        let staged = self
            .staged
            .iter()
            .filter(|p| {
                p.user_id == user_id
                    && p.coupon_id == Some(coupon_id)
                    && p.payment_status == PaymentStatus::Completed
            })
            .count() as i64;
        Ok(committed + staged)
    }

    async fn increment_coupon_uses(&mut self, coupon_id: CouponId) -> Result<u64> {
        let mut state = lock(&self.state)?;
        let Some(coupon) = state.coupons.get_mut(&coupon_id) else {
            return Ok(0);
        };
        if !coupon.has_remaining_uses() {
            tracing::debug!(
                %coupon_id,
                current_uses = coupon.current_uses,
                "coupon increment matched no row"
            );
            return Ok(0);
        }

        coupon.current_uses += 1;
        drop(state);
        self.increments.push(coupon_id);
        Ok(1)
    }

    async fn insert_purchase(&mut self, purchase: &NewPurchase) -> Result<PurchaseRecord> {
        let record = purchase.clone().into_record(Utc::now());
        self.staged.push(record.clone());
        Ok(record)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let mut this = self;
        let mut state = lock(&this.state)?;
        let staged = std::mem::take(&mut this.staged);
        state.purchases.extend(staged);
        drop(state);
        this.increments.clear();
        this.finished = true;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        let mut this = self;
        tracing::debug!(
            increments = this.increments.len(),
            staged = this.staged.len(),
            "rolling back transaction"
        );
        this.staged.clear();
        this.undo_increments();
        this.finished = true;
        Ok(())
    }
}
