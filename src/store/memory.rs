//! In-memory payment store.
//!
//! Backs the end-to-end tests and local experiments with the same trait the
//! Postgres store implements. State lives behind a single mutex; semantics
//! mirror the SQL implementation, including updates against missing rows
//! being silent no-ops.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::order::{Order, OrderStatus, PaymentStatus};
use crate::models::payment_log::{NewPaymentLog, PaymentLog};
use crate::models::transaction::{PaymentTransaction, TransactionStatus};
use crate::store::PaymentStore;

#[derive(Debug, Default)]
struct Inner {
    transactions: HashMap<Uuid, PaymentTransaction>,
    orders: HashMap<Uuid, Order>,
    logs: Vec<PaymentLog>,
}

/// Mutex-guarded store holding transactions, orders and audit rows in maps.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    inner: Mutex<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Seed an order.
    pub fn insert_order(&self, order: Order) {
        self.lock().orders.insert(order.id, order);
    }

    /// Seed a payment transaction.
    pub fn insert_transaction(&self, transaction: PaymentTransaction) {
        self.lock()
            .transactions
            .insert(transaction.id, transaction);
    }

    /// Current state of a transaction, if present.
    pub fn transaction(&self, id: Uuid) -> Option<PaymentTransaction> {
        self.lock().transactions.get(&id).cloned()
    }

    /// Current state of an order, if present.
    pub fn order(&self, id: Uuid) -> Option<Order> {
        self.lock().orders.get(&id).cloned()
    }

    /// Snapshot of the audit log, oldest first.
    pub fn logs(&self) -> Vec<PaymentLog> {
        self.lock().logs.clone()
    }
}

#[async_trait]
impl PaymentStore for InMemoryStore {
    async fn find_transactions(
        &self,
        reference: Option<&str>,
        gateway_id: Option<&str>,
    ) -> Result<Vec<PaymentTransaction>, AppError> {
        let inner = self.lock();
        let matches = inner
            .transactions
            .values()
            .filter(|tx| {
                let by_reference =
                    reference.is_some_and(|r| tx.transaction_reference == r);
                let by_gateway = gateway_id
                    .is_some_and(|g| tx.gateway_transaction_id.as_deref() == Some(g));
                by_reference || by_gateway
            })
            .take(2)
            .cloned()
            .collect();
        Ok(matches)
    }

    async fn mark_completed(
        &self,
        id: Uuid,
        gateway_id: Option<&str>,
        webhook_data: &Value,
    ) -> Result<(), AppError> {
        let mut inner = self.lock();
        if let Some(tx) = inner.transactions.get_mut(&id) {
            tx.status = TransactionStatus::Completed.as_str().to_string();
            tx.completed_at = Some(Utc::now());
            if let Some(gateway_id) = gateway_id {
                tx.gateway_transaction_id = Some(gateway_id.to_string());
            }
            tx.webhook_data = Some(webhook_data.clone());
        }
        Ok(())
    }

    async fn mark_pending(&self, id: Uuid, webhook_data: &Value) -> Result<(), AppError> {
        let mut inner = self.lock();
        if let Some(tx) = inner.transactions.get_mut(&id) {
            tx.status = TransactionStatus::Pending.as_str().to_string();
            tx.webhook_data = Some(webhook_data.clone());
        }
        Ok(())
    }

    async fn mark_cancelled(&self, id: Uuid, webhook_data: &Value) -> Result<(), AppError> {
        let mut inner = self.lock();
        if let Some(tx) = inner.transactions.get_mut(&id) {
            tx.status = TransactionStatus::Cancelled.as_str().to_string();
            tx.cancelled_at = Some(Utc::now());
            tx.webhook_data = Some(webhook_data.clone());
        }
        Ok(())
    }

    async fn mark_failed(
        &self,
        id: Uuid,
        failure_reason: &str,
        webhook_data: &Value,
    ) -> Result<(), AppError> {
        let mut inner = self.lock();
        if let Some(tx) = inner.transactions.get_mut(&id) {
            tx.status = TransactionStatus::Failed.as_str().to_string();
            tx.failed_at = Some(Utc::now());
            tx.failure_reason = Some(failure_reason.to_string());
            tx.webhook_data = Some(webhook_data.clone());
        }
        Ok(())
    }

    async fn mark_order_paid(&self, order_id: Uuid) -> Result<(), AppError> {
        let mut inner = self.lock();
        if let Some(order) = inner.orders.get_mut(&order_id) {
            order.status = OrderStatus::Processing.as_str().to_string();
            order.payment_status = PaymentStatus::Paid.as_str().to_string();
            order.paid_at = Some(Utc::now());
            order.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn set_order_payment_status(
        &self,
        order_id: Uuid,
        status: PaymentStatus,
    ) -> Result<(), AppError> {
        let mut inner = self.lock();
        if let Some(order) = inner.orders.get_mut(&order_id) {
            order.payment_status = status.as_str().to_string();
            order.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn order_has_settled_payment(
        &self,
        order_id: Uuid,
        excluding: Uuid,
    ) -> Result<bool, AppError> {
        let inner = self.lock();
        let settled = inner.transactions.values().any(|tx| {
            tx.order_id == order_id
                && tx.id != excluding
                && matches!(tx.status.as_str(), "completed" | "processing")
        });
        Ok(settled)
    }

    async fn append_log(&self, log: NewPaymentLog) -> Result<(), AppError> {
        let mut inner = self.lock();
        inner.logs.push(PaymentLog {
            id: Uuid::new_v4(),
            transaction_id: log.transaction_id,
            event_type: log.event_type.as_str().to_string(),
            data: log.data,
            created_at: Utc::now(),
        });
        Ok(())
    }

    async fn ping(&self) -> Result<(), AppError> {
        Ok(())
    }
}
