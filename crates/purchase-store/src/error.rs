use thiserror::Error;

/// Errors that can occur when interacting with the purchase store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A coupon with the same normalized code already exists.
    #[error("Duplicate coupon code: {0}")]
    DuplicateCouponCode(String),

    /// A purchase already references the same gateway order id.
    #[error("Duplicate order id: {0}")]
    DuplicateOrderId(String),

    /// A stored row could not be mapped to a model type.
    #[error("Corrupt row: {0}")]
    CorruptRow(String),

    /// The store cannot serve requests (in-memory lock poisoned).
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
