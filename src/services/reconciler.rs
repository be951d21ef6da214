//! Payment status reconciliation state machine.
//!
//! Maps a normalized gateway event onto the internal transaction and order
//! state. `pending` may move to `completed`, `failed` or `cancelled`;
//! those three are terminal here (refund flows are a different subsystem).
//!
//! # Write Discipline
//!
//! Each transition is a sequence of independent writes, not one database
//! transaction. A failed write is logged and processing continues to the
//! next write, trading strict atomicity for forward progress; the webhook
//! answers 2xx either way so the gateway does not enter a retry storm.
//! Every transition is idempotent under at-least-once delivery: replaying
//! an event converges to the same stored state, with duplicate audit rows
//! as the only side effect.
//!
//! # Order Downgrade Guard
//!
//! Cancellation and failure only downgrade the order's `payment_status`
//! when no other transaction on the order is completed or processing. A
//! late event for an abandoned retry attempt must not regress an order
//! paid by a newer attempt. If the guard query itself fails, the order is
//! left untouched.

use std::future::Future;

use crate::models::order::PaymentStatus;
use crate::models::payment_log::{NewPaymentLog, PaymentEventType};
use crate::models::transaction::{PaymentTransaction, TransactionStatus};
use crate::services::normalizer::{CanonicalStatus, NormalizedEvent};
use crate::store::PaymentStore;

use crate::error::AppError;

/// Reason recorded when the gateway reports a failure without one.
const DEFAULT_FAILURE_REASON: &str = "Payment failed";

/// Which branch of the state machine an event took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Completed,
    Pending,
    Cancelled,
    Failed,
    /// Unrecognized status; nothing was written.
    Ignored,
}

impl ReconcileOutcome {
    /// Whether stored state may have changed, and caches need invalidating.
    pub fn changed_state(&self) -> bool {
        !matches!(self, ReconcileOutcome::Ignored)
    }
}

/// Apply a normalized event to the located transaction.
///
/// Never fails: every write is attempted best-effort and failures surface
/// only in the logs.
pub async fn reconcile(
    store: &dyn PaymentStore,
    transaction: &PaymentTransaction,
    event: &NormalizedEvent,
) -> ReconcileOutcome {
    match event.status {
        CanonicalStatus::Success => {
            apply_success(store, transaction, event).await;
            ReconcileOutcome::Completed
        }
        CanonicalStatus::Pending => {
            apply_pending(store, transaction, event).await;
            ReconcileOutcome::Pending
        }
        CanonicalStatus::Cancelled => {
            apply_cancelled(store, transaction, event).await;
            ReconcileOutcome::Cancelled
        }
        CanonicalStatus::Failed => {
            apply_failed(store, transaction, event).await;
            ReconcileOutcome::Failed
        }
        CanonicalStatus::Unrecognized => {
            tracing::warn!(
                transaction_id = %transaction.id,
                raw_status = event.raw_status.as_deref().unwrap_or("-"),
                "unrecognized gateway status; ignoring webhook"
            );
            ReconcileOutcome::Ignored
        }
    }
}

async fn apply_success(
    store: &dyn PaymentStore,
    transaction: &PaymentTransaction,
    event: &NormalizedEvent,
) {
    attempt(
        "mark transaction completed",
        store.mark_completed(transaction.id, event.gateway_id.as_deref(), &event.payload),
    )
    .await;

    attempt(
        "mark order paid",
        store.mark_order_paid(transaction.order_id),
    )
    .await;

    append_log(store, transaction, event, PaymentEventType::Completed).await;
}

async fn apply_pending(
    store: &dyn PaymentStore,
    transaction: &PaymentTransaction,
    event: &NormalizedEvent,
) {
    // A transaction can bounce back to pending after an earlier terminal
    // webhook when the gateway re-evaluates the attempt. Rare, and worth a
    // warn so operators can spot a misbehaving gateway.
    if transaction.status != TransactionStatus::Pending.as_str() {
        tracing::warn!(
            transaction_id = %transaction.id,
            previous_status = %transaction.status,
            "gateway bounced a finalized transaction back to pending"
        );
        attempt(
            "mark transaction pending",
            store.mark_pending(transaction.id, &event.payload),
        )
        .await;
    }

    append_log(store, transaction, event, PaymentEventType::Pending).await;
}

async fn apply_cancelled(
    store: &dyn PaymentStore,
    transaction: &PaymentTransaction,
    event: &NormalizedEvent,
) {
    attempt(
        "mark transaction cancelled",
        store.mark_cancelled(transaction.id, &event.payload),
    )
    .await;

    downgrade_order_guarded(store, transaction, PaymentStatus::Cancelled).await;

    append_log(store, transaction, event, PaymentEventType::Cancelled).await;
}

async fn apply_failed(
    store: &dyn PaymentStore,
    transaction: &PaymentTransaction,
    event: &NormalizedEvent,
) {
    let reason = event
        .failure_reason
        .as_deref()
        .unwrap_or(DEFAULT_FAILURE_REASON);

    attempt(
        "mark transaction failed",
        store.mark_failed(transaction.id, reason, &event.payload),
    )
    .await;

    downgrade_order_guarded(store, transaction, PaymentStatus::Failed).await;

    append_log(store, transaction, event, PaymentEventType::Failed).await;
}

/// Downgrade the order's payment status unless another attempt on the same
/// order already settled it.
async fn downgrade_order_guarded(
    store: &dyn PaymentStore,
    transaction: &PaymentTransaction,
    status: PaymentStatus,
) {
    match store
        .order_has_settled_payment(transaction.order_id, transaction.id)
        .await
    {
        Ok(true) => {
            tracing::info!(
                order_id = %transaction.order_id,
                transaction_id = %transaction.id,
                "order already settled by another transaction; leaving payment_status"
            );
        }
        Ok(false) => {
            attempt(
                "downgrade order payment status",
                store.set_order_payment_status(transaction.order_id, status),
            )
            .await;
        }
        Err(err) => {
            tracing::error!(
                error = %err,
                order_id = %transaction.order_id,
                "settled-payment guard query failed; leaving order untouched"
            );
        }
    }
}

async fn append_log(
    store: &dyn PaymentStore,
    transaction: &PaymentTransaction,
    event: &NormalizedEvent,
    event_type: PaymentEventType,
) {
    attempt(
        "append audit log row",
        store.append_log(NewPaymentLog::new(
            transaction.id,
            event_type,
            event.payload.clone(),
        )),
    )
    .await;
}

/// Run one write of a transition, logging failure and moving on.
async fn attempt(label: &str, write: impl Future<Output = Result<(), AppError>>) {
    if let Err(err) = write.await {
        tracing::error!(error = %err, "{label} failed; continuing with remaining writes");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::order::Order;
    use crate::services::normalizer::normalize;
    use crate::store::InMemoryStore;
    use chrono::Utc;
    use serde_json::json;
    use uuid::Uuid;

    fn order() -> Order {
        Order {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            status: "pending".to_string(),
            payment_status: "pending".to_string(),
            total_cents: 4200,
            currency: "USD".to_string(),
            paid_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn transaction(order: &Order, reference: &str, status: &str) -> PaymentTransaction {
        PaymentTransaction {
            id: Uuid::new_v4(),
            order_id: order.id,
            user_id: order.user_id,
            transaction_reference: reference.to_string(),
            gateway_transaction_id: None,
            amount_cents: order.total_cents,
            currency: order.currency.clone(),
            status: status.to_string(),
            failure_reason: None,
            webhook_data: None,
            created_at: Utc::now(),
            completed_at: None,
            failed_at: None,
            cancelled_at: None,
        }
    }

    #[tokio::test]
    async fn success_completes_transaction_and_pays_order() {
        let store = InMemoryStore::new();
        let order = order();
        let tx = transaction(&order, "R1", "pending");
        let (order_id, tx_id) = (order.id, tx.id);
        store.insert_order(order);
        store.insert_transaction(tx.clone());

        let event = normalize(&json!({"order_id": "R1", "status": "SUCCESS", "transaction_id": "GW1"}));
        let outcome = reconcile(&store, &tx, &event).await;

        assert_eq!(outcome, ReconcileOutcome::Completed);
        let stored_tx = store.transaction(tx_id).unwrap();
        assert_eq!(stored_tx.status, "completed");
        assert!(stored_tx.completed_at.is_some());
        assert_eq!(stored_tx.gateway_transaction_id.as_deref(), Some("GW1"));
        assert!(stored_tx.webhook_data.is_some());

        let stored_order = store.order(order_id).unwrap();
        assert_eq!(stored_order.status, "processing");
        assert_eq!(stored_order.payment_status, "paid");
        assert!(stored_order.paid_at.is_some());

        let logs = store.logs();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].event_type, "payment_completed");
        assert_eq!(logs[0].transaction_id, tx_id);
    }

    #[tokio::test]
    async fn replayed_success_converges_with_duplicate_log_rows() {
        let store = InMemoryStore::new();
        let order = order();
        let tx = transaction(&order, "R1", "pending");
        let (order_id, tx_id) = (order.id, tx.id);
        store.insert_order(order);
        store.insert_transaction(tx.clone());

        let event = normalize(&json!({"order_id": "R1", "status": "SUCCESS"}));
        reconcile(&store, &tx, &event).await;
        // Second delivery sees the already-completed row.
        let replayed = store.transaction(tx_id).unwrap();
        reconcile(&store, &replayed, &event).await;

        assert_eq!(store.transaction(tx_id).unwrap().status, "completed");
        assert_eq!(store.order(order_id).unwrap().payment_status, "paid");
        assert_eq!(store.logs().len(), 2);
    }

    #[tokio::test]
    async fn pending_is_a_noop_for_an_already_pending_transaction() {
        let store = InMemoryStore::new();
        let order = order();
        let tx = transaction(&order, "R1", "pending");
        let tx_id = tx.id;
        store.insert_order(order);
        store.insert_transaction(tx.clone());

        let event = normalize(&json!({"order_id": "R1", "status": "PENDING"}));
        let outcome = reconcile(&store, &tx, &event).await;

        assert_eq!(outcome, ReconcileOutcome::Pending);
        assert_eq!(store.transaction(tx_id).unwrap().status, "pending");
        let logs = store.logs();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].event_type, "payment_pending");
    }

    #[tokio::test]
    async fn pending_pulls_a_settled_transaction_back() {
        let store = InMemoryStore::new();
        let order = order();
        let tx = transaction(&order, "R1", "completed");
        let tx_id = tx.id;
        store.insert_order(order);
        store.insert_transaction(tx.clone());

        let event = normalize(&json!({"order_id": "R1", "status": "PROCESSING"}));
        reconcile(&store, &tx, &event).await;

        assert_eq!(store.transaction(tx_id).unwrap().status, "pending");
    }

    #[tokio::test]
    async fn cancellation_downgrades_an_unsettled_order() {
        let store = InMemoryStore::new();
        let order = order();
        let tx = transaction(&order, "R1", "pending");
        let (order_id, tx_id) = (order.id, tx.id);
        store.insert_order(order);
        store.insert_transaction(tx.clone());

        let event = normalize(&json!({"order_id": "R1", "status": "CANCELLED"}));
        let outcome = reconcile(&store, &tx, &event).await;

        assert_eq!(outcome, ReconcileOutcome::Cancelled);
        let stored_tx = store.transaction(tx_id).unwrap();
        assert_eq!(stored_tx.status, "cancelled");
        assert!(stored_tx.cancelled_at.is_some());
        assert_eq!(store.order(order_id).unwrap().payment_status, "cancelled");
        assert_eq!(store.logs()[0].event_type, "payment_cancelled");
    }

    #[tokio::test]
    async fn cancellation_keeps_an_order_paid_by_another_attempt() {
        let store = InMemoryStore::new();
        let mut order = order();
        order.payment_status = "paid".to_string();
        order.status = "processing".to_string();
        let settled = transaction(&order, "R1-a", "completed");
        let retry = transaction(&order, "R1-b", "pending");
        let (order_id, retry_id) = (order.id, retry.id);
        store.insert_order(order);
        store.insert_transaction(settled);
        store.insert_transaction(retry.clone());

        let event = normalize(&json!({"order_id": "R1-b", "status": "CANCELLED"}));
        reconcile(&store, &retry, &event).await;

        assert_eq!(store.transaction(retry_id).unwrap().status, "cancelled");
        // The settled attempt keeps the order paid.
        assert_eq!(store.order(order_id).unwrap().payment_status, "paid");
    }

    #[tokio::test]
    async fn failure_records_reason_and_downgrades_order() {
        let store = InMemoryStore::new();
        let order = order();
        let tx = transaction(&order, "R1", "pending");
        let (order_id, tx_id) = (order.id, tx.id);
        store.insert_order(order);
        store.insert_transaction(tx.clone());

        let event = normalize(&json!({
            "order_id": "R1",
            "status": "FAILED",
            "failure_reason": "insufficient_funds"
        }));
        let outcome = reconcile(&store, &tx, &event).await;

        assert_eq!(outcome, ReconcileOutcome::Failed);
        let stored_tx = store.transaction(tx_id).unwrap();
        assert_eq!(stored_tx.status, "failed");
        assert_eq!(stored_tx.failure_reason.as_deref(), Some("insufficient_funds"));
        assert!(stored_tx.failed_at.is_some());
        assert_eq!(store.order(order_id).unwrap().payment_status, "failed");
        assert_eq!(store.logs()[0].event_type, "payment_failed");
    }

    #[tokio::test]
    async fn failure_without_reason_records_the_default() {
        let store = InMemoryStore::new();
        let order = order();
        let tx = transaction(&order, "R1", "pending");
        let tx_id = tx.id;
        store.insert_order(order);
        store.insert_transaction(tx.clone());

        let event = normalize(&json!({"order_id": "R1", "status": "DECLINED"}));
        reconcile(&store, &tx, &event).await;

        assert_eq!(
            store.transaction(tx_id).unwrap().failure_reason.as_deref(),
            Some(DEFAULT_FAILURE_REASON)
        );
    }

    #[tokio::test]
    async fn failure_keeps_an_order_paid_by_another_attempt() {
        let store = InMemoryStore::new();
        let mut order = order();
        order.payment_status = "paid".to_string();
        let settled = transaction(&order, "R2-a", "completed");
        let retry = transaction(&order, "R2-b", "pending");
        let order_id = order.id;
        store.insert_order(order);
        store.insert_transaction(settled);
        store.insert_transaction(retry.clone());

        let event = normalize(&json!({"order_id": "R2-b", "status": "FAILED"}));
        reconcile(&store, &retry, &event).await;

        assert_eq!(store.order(order_id).unwrap().payment_status, "paid");
    }

    #[tokio::test]
    async fn unrecognized_status_changes_nothing() {
        let store = InMemoryStore::new();
        let order = order();
        let tx = transaction(&order, "R2", "pending");
        let (order_id, tx_id) = (order.id, tx.id);
        store.insert_order(order);
        store.insert_transaction(tx.clone());

        let event = normalize(&json!({"order_id": "R2", "status": "UNKNOWN_EVENT"}));
        let outcome = reconcile(&store, &tx, &event).await;

        assert_eq!(outcome, ReconcileOutcome::Ignored);
        assert!(!outcome.changed_state());
        assert_eq!(store.transaction(tx_id).unwrap().status, "pending");
        assert_eq!(store.order(order_id).unwrap().payment_status, "pending");
        assert!(store.logs().is_empty());
    }
}
