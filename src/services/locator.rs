//! Transaction lookup for inbound webhooks.
//!
//! A webhook is matched to exactly one payment transaction, either by the
//! reference this system minted or by the gateway's own transaction id.
//! Zero matches produce a 404 for the gateway to act on; more than one
//! match means the uniqueness invariants were violated upstream and the
//! request fails loudly instead of reconciling an arbitrary row.

use crate::error::AppError;
use crate::services::normalizer::NormalizedEvent;
use crate::store::PaymentStore;

use crate::models::transaction::PaymentTransaction;

/// Find the unique transaction a normalized event refers to.
///
/// # Errors
///
/// - `TransactionNotFound` when neither identifier is present or nothing
///   matches (the attempted identifiers are logged for diagnosis)
/// - `AmbiguousTransaction` when more than one row matches
pub async fn locate(
    store: &dyn PaymentStore,
    event: &NormalizedEvent,
) -> Result<PaymentTransaction, AppError> {
    let reference = event.reference.as_deref();
    let gateway_id = event.gateway_id.as_deref();

    if reference.is_none() && gateway_id.is_none() {
        tracing::warn!("webhook carried neither a transaction reference nor a gateway id");
        return Err(AppError::TransactionNotFound);
    }

    let mut matches = store.find_transactions(reference, gateway_id).await?;

    match matches.len() {
        0 => {
            tracing::warn!(
                reference = reference.unwrap_or("-"),
                gateway_id = gateway_id.unwrap_or("-"),
                "no payment transaction matched webhook"
            );
            Err(AppError::TransactionNotFound)
        }
        1 => Ok(matches.remove(0)),
        count => {
            tracing::error!(
                reference = reference.unwrap_or("-"),
                gateway_id = gateway_id.unwrap_or("-"),
                count,
                "multiple payment transactions matched webhook; refusing to pick one"
            );
            Err(AppError::AmbiguousTransaction)
        }
    }
}
