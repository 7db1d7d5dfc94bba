use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};
use uuid::Uuid;

use crate::{
    Coupon, CouponId, CouponUpdate, Money, NewCoupon, NewOpportunity, NewPurchase, OpportunityId,
    PaymentStatus, PurchaseId, PurchaseRecord, PurchaseUpdate, Result, StoreError, Toolkit,
    ToolkitId, UserId,
    store::{PurchaseStore, StoreTransaction},
};

const COUPON_COLUMNS: &str = "id, code, discount_amount, max_uses, current_uses, \
     max_uses_per_user, is_active, expires_at, created_at";

const PURCHASE_COLUMNS: &str = "id, user_id, toolkit_id, coupon_id, order_id, payment_id, \
     payment_status, amount_paid, created_at, updated_at";

const INCREMENT_COUPON_USES: &str = r#"
    UPDATE coupons
    SET current_uses = COALESCE(current_uses, 0) + 1
    WHERE id = $1 AND (max_uses IS NULL OR COALESCE(current_uses, 0) < max_uses)
"#;

const COUNT_COMPLETED_WITH_COUPON: &str = r#"
    SELECT COUNT(*) FROM purchases
    WHERE user_id = $1 AND coupon_id = $2 AND payment_status = 'completed'
"#;

/// PostgreSQL-backed purchase store implementation.
#[derive(Clone)]
pub struct PostgresPurchaseStore {
    pool: PgPool,
}

impl PostgresPurchaseStore {
    /// Creates a new PostgreSQL purchase store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_toolkit(row: PgRow) -> Result<Toolkit> {
        Ok(Toolkit {
            id: ToolkitId::from_uuid(row.try_get::<Uuid, _>("id")?),
            title: row.try_get("title")?,
            price: Money::from_minor(row.try_get("price")?),
            is_active: row.try_get("is_active")?,
        })
    }

    fn row_to_coupon(row: PgRow) -> Result<Coupon> {
        Ok(Coupon {
            id: CouponId::from_uuid(row.try_get::<Uuid, _>("id")?),
            code: row.try_get("code")?,
            discount_amount: Money::from_minor(row.try_get("discount_amount")?),
            max_uses: row.try_get("max_uses")?,
            current_uses: row
                .try_get::<Option<i32>, _>("current_uses")?
                .unwrap_or(0),
            max_uses_per_user: row.try_get("max_uses_per_user")?,
            is_active: row.try_get("is_active")?,
            expires_at: row.try_get("expires_at")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn row_to_purchase(row: PgRow) -> Result<PurchaseRecord> {
        let status: String = row.try_get("payment_status")?;
        let payment_status = status
            .parse::<PaymentStatus>()
            .map_err(StoreError::CorruptRow)?;

        Ok(PurchaseRecord {
            id: PurchaseId::from_uuid(row.try_get::<Uuid, _>("id")?),
            user_id: UserId::from_uuid(row.try_get::<Uuid, _>("user_id")?),
            toolkit_id: ToolkitId::from_uuid(row.try_get::<Uuid, _>("toolkit_id")?),
            coupon_id: row
                .try_get::<Option<Uuid>, _>("coupon_id")?
                .map(CouponId::from_uuid),
            order_id: row.try_get("order_id")?,
            payment_id: row.try_get("payment_id")?,
            payment_status,
            amount_paid: Money::from_minor(row.try_get("amount_paid")?),
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn map_unique_violation(e: sqlx::Error, constraint: &str, err: StoreError) -> StoreError {
        if let sqlx::Error::Database(ref db_err) = e
            && db_err.constraint() == Some(constraint)
        {
            return err;
        }
        StoreError::Database(e)
    }
}

#[async_trait]
impl PurchaseStore for PostgresPurchaseStore {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PostgresTransaction { tx }))
    }

    async fn upsert_toolkit(&self, toolkit: &Toolkit) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO toolkits (id, title, price, is_active)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE SET
                title = EXCLUDED.title,
                price = EXCLUDED.price,
                is_active = EXCLUDED.is_active
            "#,
        )
        .bind(toolkit.id.as_uuid())
        .bind(&toolkit.title)
        .bind(toolkit.price.minor())
        .bind(toolkit.is_active)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_toolkit(&self, id: ToolkitId) -> Result<Option<Toolkit>> {
        let row = sqlx::query("SELECT id, title, price, is_active FROM toolkits WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_toolkit).transpose()
    }

    async fn insert_coupon(&self, coupon: &NewCoupon) -> Result<Coupon> {
        let sql = format!(
            r#"
            INSERT INTO coupons (id, code, discount_amount, max_uses, current_uses,
                                 max_uses_per_user, is_active, expires_at, created_at)
            VALUES ($1, $2, $3, $4, 0, $5, $6, $7, $8)
            RETURNING {COUPON_COLUMNS}
            "#
        );

        let row = sqlx::query(&sql)
            .bind(coupon.id.as_uuid())
            .bind(&coupon.code)
            .bind(coupon.discount_amount.minor())
            .bind(coupon.max_uses)
            .bind(coupon.max_uses_per_user)
            .bind(coupon.is_active)
            .bind(coupon.expires_at)
            .bind(Utc::now())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                Self::map_unique_violation(
                    e,
                    "unique_coupon_code",
                    StoreError::DuplicateCouponCode(coupon.code.clone()),
                )
            })?;

        Self::row_to_coupon(row)
    }

    async fn get_coupon(&self, id: CouponId) -> Result<Option<Coupon>> {
        let sql = format!("SELECT {COUPON_COLUMNS} FROM coupons WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_coupon).transpose()
    }

    async fn find_coupon_by_code(&self, code: &str) -> Result<Option<Coupon>> {
        let sql = format!("SELECT {COUPON_COLUMNS} FROM coupons WHERE code = $1");
        let row = sqlx::query(&sql)
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_coupon).transpose()
    }

    async fn update_coupon(&self, id: CouponId, update: &CouponUpdate) -> Result<u64> {
        if update.is_empty() {
            return Ok(0);
        }

        // $1 is always the coupon id
        let mut assignments = Vec::new();
        let mut param_count = 1;
        let mut max_uses_param = None;

        if update.discount_amount.is_some() {
            param_count += 1;
            assignments.push(format!("discount_amount = ${param_count}"));
        }
        if update.max_uses.is_some() {
            param_count += 1;
            max_uses_param = Some(param_count);
            assignments.push(format!("max_uses = ${param_count}"));
        }
        if update.max_uses_per_user.is_some() {
            param_count += 1;
            assignments.push(format!("max_uses_per_user = ${param_count}"));
        }
        if update.is_active.is_some() {
            param_count += 1;
            assignments.push(format!("is_active = ${param_count}"));
        }
        if update.expires_at.is_some() {
            param_count += 1;
            assignments.push(format!("expires_at = ${param_count}"));
        }

        let mut sql = format!("UPDATE coupons SET {} WHERE id = $1", assignments.join(", "));

        // A new limit must not already be exceeded by consumed uses.
        if let (Some(Some(_)), Some(param)) = (update.max_uses, max_uses_param) {
            sql.push_str(&format!(" AND COALESCE(current_uses, 0) <= ${param}"));
        }
        // Inactive and expired coupons stay that way.
        if update.is_active == Some(true) {
            sql.push_str(" AND is_active");
        }
        if let Some(expires_at) = update.expires_at
            && !expires_at.is_some_and(|at| at <= Utc::now())
        {
            sql.push_str(" AND (expires_at IS NULL OR expires_at > NOW())");
        }

        let mut query = sqlx::query(&sql).bind(id.as_uuid());
        if let Some(discount) = update.discount_amount {
            query = query.bind(discount.minor());
        }
        if let Some(max_uses) = update.max_uses {
            query = query.bind(max_uses);
        }
        if let Some(per_user) = update.max_uses_per_user {
            query = query.bind(per_user);
        }
        if let Some(active) = update.is_active {
            query = query.bind(active);
        }
        if let Some(expires_at) = update.expires_at {
            query = query.bind(expires_at);
        }

        let result = query.execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            tracing::debug!(coupon_id = %id, "conditional coupon update matched no row");
        }
        Ok(result.rows_affected())
    }

    async fn get_purchase(&self, id: PurchaseId) -> Result<Option<PurchaseRecord>> {
        let sql = format!("SELECT {PURCHASE_COLUMNS} FROM purchases WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_purchase).transpose()
    }

    async fn find_purchase_by_order(
        &self,
        order_id: &str,
        toolkit_id: ToolkitId,
    ) -> Result<Option<PurchaseRecord>> {
        let sql = format!(
            "SELECT {PURCHASE_COLUMNS} FROM purchases WHERE order_id = $1 AND toolkit_id = $2"
        );
        let row = sqlx::query(&sql)
            .bind(order_id)
            .bind(toolkit_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_purchase).transpose()
    }

    async fn has_completed_purchase(
        &self,
        user_id: UserId,
        toolkit_id: ToolkitId,
    ) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM purchases
                WHERE user_id = $1 AND toolkit_id = $2 AND payment_status = 'completed'
            )
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(toolkit_id.as_uuid())
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn count_completed_with_coupon(
        &self,
        user_id: UserId,
        coupon_id: CouponId,
    ) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(COUNT_COMPLETED_WITH_COUPON)
            .bind(user_id.as_uuid())
            .bind(coupon_id.as_uuid())
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    async fn update_purchase(
        &self,
        id: PurchaseId,
        update: &PurchaseUpdate,
        only_if: Option<PaymentStatus>,
    ) -> Result<u64> {
        if update.is_empty() {
            return Ok(0);
        }

        // $1 is always the purchase id
        let mut sql = String::from("UPDATE purchases SET updated_at = NOW()");
        let mut param_count = 1;

        if update.order_id.is_some() {
            param_count += 1;
            sql.push_str(&format!(", order_id = ${param_count}"));
        }
        if update.payment_id.is_some() {
            param_count += 1;
            sql.push_str(&format!(", payment_id = ${param_count}"));
        }
        if update.payment_status.is_some() {
            param_count += 1;
            sql.push_str(&format!(", payment_status = ${param_count}"));
        }

        sql.push_str(" WHERE id = $1");
        if only_if.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND payment_status = ${param_count}"));
        }

        let mut query = sqlx::query(&sql).bind(id.as_uuid());
        if let Some(order_id) = &update.order_id {
            query = query.bind(order_id);
        }
        if let Some(payment_id) = &update.payment_id {
            query = query.bind(payment_id);
        }
        if let Some(status) = update.payment_status {
            query = query.bind(status.as_str());
        }
        if let Some(expected) = only_if {
            query = query.bind(expected.as_str());
        }

        let result = query.execute(&self.pool).await.map_err(|e| {
            Self::map_unique_violation(
                e,
                "unique_purchase_order_id",
                StoreError::DuplicateOrderId(update.order_id.clone().unwrap_or_default()),
            )
        })?;

        Ok(result.rows_affected())
    }

    async fn insert_opportunities(&self, records: &[NewOpportunity]) -> Result<u64> {
        let mut tx = self.pool.begin().await?;

        for record in records {
            sqlx::query(
                r#"
                INSERT INTO opportunities (id, title, organization, url, deadline)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(OpportunityId::new().as_uuid())
            .bind(&record.title)
            .bind(&record.organization)
            .bind(&record.url)
            .bind(record.deadline)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(records.len() as u64)
    }
}

/// Transaction over a pooled PostgreSQL connection.
///
/// Dropping the inner `sqlx` transaction without commit issues a rollback.
struct PostgresTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTransaction for PostgresTransaction {
    async fn find_coupon_by_code(&mut self, code: &str) -> Result<Option<Coupon>> {
        let sql = format!("SELECT {COUPON_COLUMNS} FROM coupons WHERE code = $1");
        let row = sqlx::query(&sql)
            .bind(code)
            .fetch_optional(&mut *self.tx)
            .await?;

        row.map(PostgresPurchaseStore::row_to_coupon).transpose()
    }

    async fn count_completed_with_coupon(
        &mut self,
        user_id: UserId,
        coupon_id: CouponId,
    ) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(COUNT_COMPLETED_WITH_COUPON)
            .bind(user_id.as_uuid())
            .bind(coupon_id.as_uuid())
            .fetch_one(&mut *self.tx)
            .await?;

        Ok(count)
    }

    async fn increment_coupon_uses(&mut self, coupon_id: CouponId) -> Result<u64> {
        let result = sqlx::query(INCREMENT_COUPON_USES)
            .bind(coupon_id.as_uuid())
            .execute(&mut *self.tx)
            .await?;

        if result.rows_affected() == 0 {
            tracing::debug!(%coupon_id, "coupon increment matched no row");
        }
        Ok(result.rows_affected())
    }

    async fn insert_purchase(&mut self, purchase: &NewPurchase) -> Result<PurchaseRecord> {
        let record = purchase.clone().into_record(Utc::now());

        sqlx::query(
            r#"
            INSERT INTO purchases (id, user_id, toolkit_id, coupon_id, payment_status,
                                   amount_paid, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(record.id.as_uuid())
        .bind(record.user_id.as_uuid())
        .bind(record.toolkit_id.as_uuid())
        .bind(record.coupon_id.map(|id| id.as_uuid()))
        .bind(record.payment_status.as_str())
        .bind(record.amount_paid.minor())
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(record)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        tracing::debug!("rolling back transaction");
        self.tx.rollback().await?;
        Ok(())
    }
}
