//! Records persisted by the purchase store.

use chrono::{DateTime, Utc};
use common::{CouponId, Money, PurchaseId, ToolkitId, UserId};
use serde::{Deserialize, Serialize};

/// A purchasable digital product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Toolkit {
    pub id: ToolkitId,
    pub title: String,
    /// Base price in minor units, before any coupon.
    pub price: Money,
    pub is_active: bool,
}

impl Toolkit {
    /// Creates an active toolkit.
    pub fn new(title: impl Into<String>, price: Money) -> Self {
        Self {
            id: ToolkitId::new(),
            title: title.into(),
            price,
            is_active: true,
        }
    }
}

/// A discount code with a bounded, shared usage budget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coupon {
    pub id: CouponId,
    /// Normalized (trimmed, upper-case) code.
    pub code: String,
    /// Flat deduction in minor units.
    pub discount_amount: Money,
    /// Global redemption limit; `None` means unlimited.
    pub max_uses: Option<i32>,
    /// Redemptions consumed so far. A missing stored value reads as zero.
    pub current_uses: i32,
    /// Completed purchases a single user may make with this coupon.
    pub max_uses_per_user: Option<i32>,
    pub is_active: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Coupon {
    /// Returns true if the global budget still has at least one use left.
    pub fn has_remaining_uses(&self) -> bool {
        match self.max_uses {
            Some(max) => self.current_uses < max,
            None => true,
        }
    }

    /// Returns true if the coupon has expired at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires| expires <= now)
    }
}

/// A coupon ready to be inserted. The code must already be normalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCoupon {
    pub id: CouponId,
    pub code: String,
    pub discount_amount: Money,
    pub max_uses: Option<i32>,
    pub max_uses_per_user: Option<i32>,
    pub is_active: bool,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Typed partial update of the mutable coupon fields.
///
/// `None` leaves a field untouched. Nullable columns use a nested option so
/// that `Some(None)` clears the value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CouponUpdate {
    pub discount_amount: Option<Money>,
    pub max_uses: Option<Option<i32>>,
    pub max_uses_per_user: Option<Option<i32>>,
    pub is_active: Option<bool>,
    pub expires_at: Option<Option<DateTime<Utc>>>,
}

impl CouponUpdate {
    /// Returns true if the update changes nothing.
    pub fn is_empty(&self) -> bool {
        self.discount_amount.is_none()
            && self.max_uses.is_none()
            && self.max_uses_per_user.is_none()
            && self.is_active.is_none()
            && self.expires_at.is_none()
    }

    /// Applies the update to an in-memory coupon.
    pub fn apply_to(&self, coupon: &mut Coupon) {
        if let Some(discount) = self.discount_amount {
            coupon.discount_amount = discount;
        }
        if let Some(max_uses) = self.max_uses {
            coupon.max_uses = max_uses;
        }
        if let Some(per_user) = self.max_uses_per_user {
            coupon.max_uses_per_user = per_user;
        }
        if let Some(active) = self.is_active {
            coupon.is_active = active;
        }
        if let Some(expires_at) = self.expires_at {
            coupon.expires_at = expires_at;
        }
    }
}

/// Payment status of a purchase record.
///
/// State transitions:
/// ```text
/// Pending ──► Completed
/// ```
/// Zero-price purchases are created directly as `Completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    /// Awaiting payment verification.
    #[default]
    Pending,

    /// Paid (or fully discounted). Terminal.
    Completed,
}

impl PaymentStatus {
    /// Returns true if a record in this state may transition to completed.
    pub fn can_complete(&self) -> bool {
        matches!(self, PaymentStatus::Pending)
    }

    /// Returns true if this state grants access to the toolkit.
    pub fn grants_access(&self) -> bool {
        matches!(self, PaymentStatus::Completed)
    }

    /// Returns the stored representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Completed => "completed",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "completed" => Ok(PaymentStatus::Completed),
            other => Err(format!("unknown payment status '{other}'")),
        }
    }
}

/// One purchase attempt of a toolkit by a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseRecord {
    pub id: PurchaseId,
    pub user_id: UserId,
    pub toolkit_id: ToolkitId,
    /// Coupon whose budget this attempt consumed.
    pub coupon_id: Option<CouponId>,
    /// Gateway order id, set once an order exists.
    pub order_id: Option<String>,
    /// Gateway payment id, set on verification.
    pub payment_id: Option<String>,
    pub payment_status: PaymentStatus,
    /// Post-discount price actually charged.
    pub amount_paid: Money,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A purchase record ready to be inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPurchase {
    pub id: PurchaseId,
    pub user_id: UserId,
    pub toolkit_id: ToolkitId,
    pub coupon_id: Option<CouponId>,
    pub payment_status: PaymentStatus,
    pub amount_paid: Money,
}

impl NewPurchase {
    /// Materializes the record as it will be stored at `now`.
    pub fn into_record(self, now: DateTime<Utc>) -> PurchaseRecord {
        PurchaseRecord {
            id: self.id,
            user_id: self.user_id,
            toolkit_id: self.toolkit_id,
            coupon_id: self.coupon_id,
            order_id: None,
            payment_id: None,
            payment_status: self.payment_status,
            amount_paid: self.amount_paid,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Typed partial update of the mutable purchase fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PurchaseUpdate {
    pub order_id: Option<String>,
    pub payment_id: Option<String>,
    pub payment_status: Option<PaymentStatus>,
}

impl PurchaseUpdate {
    /// Attaches a gateway order id to a pending record.
    pub fn attach_order(order_id: impl Into<String>) -> Self {
        Self {
            order_id: Some(order_id.into()),
            ..Self::default()
        }
    }

    /// Marks a record completed with the verified payment id.
    pub fn complete(payment_id: impl Into<String>) -> Self {
        Self {
            payment_id: Some(payment_id.into()),
            payment_status: Some(PaymentStatus::Completed),
            ..Self::default()
        }
    }

    /// Returns true if the update changes nothing.
    pub fn is_empty(&self) -> bool {
        self.order_id.is_none() && self.payment_id.is_none() && self.payment_status.is_none()
    }

    /// Applies the update to an in-memory record.
    pub fn apply_to(&self, record: &mut PurchaseRecord, now: DateTime<Utc>) {
        if let Some(order_id) = &self.order_id {
            record.order_id = Some(order_id.clone());
        }
        if let Some(payment_id) = &self.payment_id {
            record.payment_id = Some(payment_id.clone());
        }
        if let Some(status) = self.payment_status {
            record.payment_status = status;
        }
        record.updated_at = now;
    }
}

/// An opportunity listing received through bulk ingest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOpportunity {
    pub title: String,
    pub organization: String,
    pub url: Option<String>,
    pub deadline: Option<DateTime<Utc>>,
}
