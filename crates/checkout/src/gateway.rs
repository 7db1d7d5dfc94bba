//! Payment gateway trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use common::Money;
use serde::Serialize;
use thiserror::Error;

/// A payment order created at the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GatewayOrder {
    /// The order id assigned by the gateway.
    pub id: String,
    pub amount: Money,
    pub currency: String,
}

/// Payment gateway failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// The gateway refused to create the order.
    #[error("order rejected: {0}")]
    Rejected(String),

    /// The gateway could not be reached.
    #[error("gateway unavailable: {0}")]
    Unavailable(String),
}

/// Trait for creating payment orders.
///
/// Calls go over the network and must never be made while a store
/// transaction is open.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Creates an order for `amount` in `currency`, tagged with `receipt`.
    async fn create_order(
        &self,
        amount: Money,
        currency: &str,
        receipt: &str,
    ) -> Result<GatewayOrder, GatewayError>;
}

#[async_trait]
impl<T: PaymentGateway + ?Sized> PaymentGateway for Arc<T> {
    async fn create_order(
        &self,
        amount: Money,
        currency: &str,
        receipt: &str,
    ) -> Result<GatewayOrder, GatewayError> {
        (**self).create_order(amount, currency, receipt).await
    }
}

#[derive(Debug, Default)]
struct InMemoryGatewayState {
    orders: HashMap<String, (GatewayOrder, String)>,
    next_id: u32,
    fail_on_create: bool,
}

/// In-memory payment gateway for tests and local runs.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentGateway {
    state: Arc<RwLock<InMemoryGatewayState>>,
}

impl InMemoryPaymentGateway {
    /// Creates a new in-memory gateway.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the gateway to fail every order creation.
    pub fn set_fail_on_create(&self, fail: bool) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .fail_on_create = fail;
    }

    /// Returns the number of orders created.
    pub fn order_count(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .orders
            .len()
    }

    /// Returns an order and its receipt by order id.
    pub fn order(&self, order_id: &str) -> Option<(GatewayOrder, String)> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .orders
            .get(order_id)
            .cloned()
    }
}

#[async_trait]
impl PaymentGateway for InMemoryPaymentGateway {
    async fn create_order(
        &self,
        amount: Money,
        currency: &str,
        receipt: &str,
    ) -> Result<GatewayOrder, GatewayError> {
        let mut state = self
            .state
            .write()
            .map_err(|_| GatewayError::Unavailable("gateway state poisoned".to_string()))?;

        if state.fail_on_create {
            return Err(GatewayError::Unavailable("connection refused".to_string()));
        }
        if !amount.minor().is_positive() {
            return Err(GatewayError::Rejected(format!(
                "amount must be positive, got {amount}"
            )));
        }

        state.next_id += 1;
        let order = GatewayOrder {
            id: format!("order_{:04}", state.next_id),
            amount,
            currency: currency.to_string(),
        };
        state
            .orders
            .insert(order.id.clone(), (order.clone(), receipt.to_string()));

        Ok(order)
    }
}
