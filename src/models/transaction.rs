//! Payment transaction data model.
//!
//! This module defines:
//! - `PaymentTransaction`: Database entity representing one payment attempt
//! - `TransactionStatus`: the status vocabulary the reconciler writes
//!
//! A transaction is created in `pending` state by the checkout flow. The
//! webhook pipeline is the only writer of the terminal states.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Represents a payment transaction record from the database.
///
/// # Database Table
///
/// Maps to the `payment_transactions` table. Each transaction:
/// - Belongs to exactly one order and one user
/// - Carries a caller-chosen `transaction_reference` (unique per attempt)
/// - Learns its `gateway_transaction_id` only once the gateway calls back
/// - Stores amount in cents (never floats!)
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct PaymentTransaction {
    /// Unique identifier for this transaction
    pub id: Uuid,

    /// Order this payment attempt belongs to
    ///
    /// One order may accumulate several attempts (retries); only the most
    /// recent successful one determines the order's final payment state.
    pub order_id: Uuid,

    /// User the attempt is attributed to, for audit purposes
    ///
    /// Users live in an external auth service, so this is a bare UUID
    /// with no foreign key.
    pub user_id: Uuid,

    /// Reference minted by checkout and sent to the gateway
    ///
    /// Unique per attempt. Webhooks usually echo it back as `order_id`
    /// or `reference`.
    pub transaction_reference: String,

    /// Identifier the gateway assigned to the same attempt
    ///
    /// NULL until the first webhook that carries it arrives.
    pub gateway_transaction_id: Option<String>,

    /// Amount in cents
    pub amount_cents: i64,

    /// Currency code (ISO 4217)
    pub currency: String,

    /// Transaction status
    ///
    /// One of "pending", "completed", "failed", "cancelled".
    /// See [`TransactionStatus`] for the write-side vocabulary.
    pub status: String,

    /// Free-text reason, populated only when the gateway reports a failure
    pub failure_reason: Option<String>,

    /// Last raw webhook payload received for this attempt
    ///
    /// Kept verbatim so disputed events can be replayed forensically.
    pub webhook_data: Option<serde_json::Value>,

    /// When the attempt was created by checkout
    pub created_at: DateTime<Utc>,

    /// Stamped when the attempt reaches `completed`
    pub completed_at: Option<DateTime<Utc>>,

    /// Stamped when the attempt reaches `failed`
    pub failed_at: Option<DateTime<Utc>>,

    /// Stamped when the attempt reaches `cancelled`
    pub cancelled_at: Option<DateTime<Utc>>,
}

/// Status vocabulary for `payment_transactions.status`.
///
/// `pending` may transition to any of the three terminal states;
/// the terminal states are final for this service (refund flows live
/// elsewhere). Repeated webhooks re-apply the same transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
    Cancelled,
}

impl TransactionStatus {
    /// The exact string stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Failed => "failed",
            TransactionStatus::Cancelled => "cancelled",
        }
    }

    /// Parse a stored status string. Returns None for anything outside
    /// the vocabulary (legacy rows, manual edits).
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(TransactionStatus::Pending),
            "completed" => Some(TransactionStatus::Completed),
            "failed" => Some(TransactionStatus::Failed),
            "cancelled" => Some(TransactionStatus::Cancelled),
            _ => None,
        }
    }
}
