//! Persistence seam for the reconciliation pipeline.
//!
//! The pipeline talks to a [`PaymentStore`] trait object rather than a
//! concrete pool, so the same handler code runs against PostgreSQL in
//! production and against an in-memory store in tests. The trait mirrors
//! what the underlying platform offers: conditional row lookup across two
//! unique-ish columns, partial-field updates, and insert-only appends for
//! the audit log.

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::order::PaymentStatus;
use crate::models::payment_log::NewPaymentLog;
use crate::models::transaction::PaymentTransaction;

pub mod memory;
pub mod postgres;

pub use memory::InMemoryStore;
pub use postgres::PgPaymentStore;

/// Storage operations used by the webhook pipeline.
///
/// Every method is one independent write or read; the reconciler sequences
/// them best-effort and treats each failure in isolation. Updates against a
/// missing row are a no-op, not an error, mirroring SQL UPDATE semantics.
#[async_trait]
pub trait PaymentStore: Send + Sync {
    /// Fetch transactions whose `transaction_reference` equals `reference`
    /// or whose `gateway_transaction_id` equals `gateway_id`. A side with
    /// no value is skipped. At most two rows are returned; the caller only
    /// distinguishes zero, one, and many.
    async fn find_transactions(
        &self,
        reference: Option<&str>,
        gateway_id: Option<&str>,
    ) -> Result<Vec<PaymentTransaction>, AppError>;

    /// Move a transaction to `completed`: stamp `completed_at`, persist the
    /// gateway id when newly learned, and keep the raw payload.
    async fn mark_completed(
        &self,
        id: Uuid,
        gateway_id: Option<&str>,
        webhook_data: &Value,
    ) -> Result<(), AppError>;

    /// Move a transaction back to `pending`, keeping the raw payload.
    async fn mark_pending(&self, id: Uuid, webhook_data: &Value) -> Result<(), AppError>;

    /// Move a transaction to `cancelled` and stamp `cancelled_at`.
    async fn mark_cancelled(&self, id: Uuid, webhook_data: &Value) -> Result<(), AppError>;

    /// Move a transaction to `failed`, stamp `failed_at` and record the
    /// failure reason.
    async fn mark_failed(
        &self,
        id: Uuid,
        failure_reason: &str,
        webhook_data: &Value,
    ) -> Result<(), AppError>;

    /// Mark an order paid: fulfillment `processing`, `payment_status` paid,
    /// `paid_at` stamped.
    async fn mark_order_paid(&self, order_id: Uuid) -> Result<(), AppError>;

    /// Downgrade an order's `payment_status` (failed/cancelled paths).
    async fn set_order_payment_status(
        &self,
        order_id: Uuid,
        status: PaymentStatus,
    ) -> Result<(), AppError>;

    /// Whether any other transaction on the order is already
    /// completed or processing. Guards the downgrade paths against
    /// regressing an order paid by a different attempt.
    async fn order_has_settled_payment(
        &self,
        order_id: Uuid,
        excluding: Uuid,
    ) -> Result<bool, AppError>;

    /// Append one audit log row. Never updates or deletes.
    async fn append_log(&self, log: NewPaymentLog) -> Result<(), AppError>;

    /// Cheap connectivity probe for the health endpoint.
    async fn ping(&self) -> Result<(), AppError>;
}
