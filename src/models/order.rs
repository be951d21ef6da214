//! Order data model.
//!
//! Orders are created by the checkout flow, which is outside this service.
//! The reconciliation pipeline only ever mutates `status`, `payment_status`,
//! `paid_at` and `updated_at`.
//!
//! `status` (fulfillment) and `payment_status` are two orthogonal fields:
//! a successful payment nudges fulfillment to `processing` while a failed
//! or cancelled payment touches `payment_status` only.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Represents an order record from the database.
///
/// # Database Table
///
/// Maps to the `orders` table.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Order {
    /// Unique identifier for this order
    pub id: Uuid,

    /// Owning user (external auth service, no foreign key)
    pub user_id: Uuid,

    /// Fulfillment status
    ///
    /// "pending", "processing", "shipped", "delivered", "cancelled".
    /// This service only ever writes "processing".
    pub status: String,

    /// Payment status
    ///
    /// One of "pending", "paid", "failed", "cancelled".
    /// See [`PaymentStatus`] for the write-side vocabulary.
    pub payment_status: String,

    /// Order total in cents
    pub total_cents: i64,

    /// Currency code (ISO 4217)
    pub currency: String,

    /// Stamped when the order is first paid
    pub paid_at: Option<DateTime<Utc>>,

    /// When the order was created by checkout
    pub created_at: DateTime<Utc>,

    /// Timestamp of the last update to this row
    pub updated_at: DateTime<Utc>,
}

/// Status vocabulary for `orders.payment_status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
    Cancelled,
}

impl PaymentStatus {
    /// The exact string stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Cancelled => "cancelled",
        }
    }
}

/// Fulfillment states this service writes.
///
/// The full fulfillment lifecycle belongs to the storefront; reconciliation
/// only moves a freshly paid order into `Processing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatus {
    Processing,
}

impl OrderStatus {
    /// The exact string stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Processing => "processing",
        }
    }
}
