//! Append-only audit trail for reconciliation events.
//!
//! One row is written per reconciliation branch taken. Rows are never
//! updated or deleted by this service; duplicates from redelivered webhooks
//! are acceptable and expected under at-least-once delivery.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// Audit log record from the database.
///
/// # Database Table
///
/// Maps to the `payment_logs` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PaymentLog {
    pub id: Uuid,

    /// Transaction the event was reconciled against
    pub transaction_id: Uuid,

    /// Event tag, see [`PaymentEventType`]
    pub event_type: String,

    /// The raw payload that triggered the event
    pub data: serde_json::Value,

    pub created_at: DateTime<Utc>,
}

/// Insert shape for a new audit row.
///
/// `id` and `created_at` are assigned by the store.
#[derive(Debug, Clone)]
pub struct NewPaymentLog {
    pub transaction_id: Uuid,
    pub event_type: PaymentEventType,
    pub data: serde_json::Value,
}

impl NewPaymentLog {
    pub fn new(transaction_id: Uuid, event_type: PaymentEventType, data: serde_json::Value) -> Self {
        Self {
            transaction_id,
            event_type,
            data,
        }
    }
}

/// Event tags written to `payment_logs.event_type`, one per reconciliation
/// branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentEventType {
    Completed,
    Failed,
    Pending,
    Cancelled,
}

impl PaymentEventType {
    /// The exact string stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentEventType::Completed => "payment_completed",
            PaymentEventType::Failed => "payment_failed",
            PaymentEventType::Pending => "payment_pending",
            PaymentEventType::Cancelled => "payment_cancelled",
        }
    }
}
