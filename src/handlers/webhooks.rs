//! Inbound payment gateway webhook endpoint.
//!
//! This module implements `POST /api/payments/webhooks`, the endpoint the
//! payment gateway calls back with asynchronous status changes.
//!
//! # Pipeline
//!
//! 1. Check the store is configured (503 otherwise)
//! 2. Authenticate: HMAC signature over the raw body, API key fallback (401)
//! 3. Parse and normalize the payload
//! 4. Locate the unique matching transaction (404 / loud 500)
//! 5. Reconcile transaction + order state, append the audit row
//! 6. Invalidate dependent read caches
//! 7. Respond `200 {"received": true}`
//!
//! The body is consumed as raw bytes before any JSON parsing so the
//! signature covers the exact bytes the gateway sent. Unrecognized
//! statuses still answer 200: a 4xx/5xx would only make the gateway retry
//! an event this service will never act on.

use axum::{Json, body::Bytes, extract::State, http::HeaderMap};
use serde_json::{Value, json};

use crate::AppState;
use crate::error::AppError;
use crate::services::{cache, locator, normalizer, reconciler};

/// Receive and reconcile one webhook delivery.
///
/// # Headers
///
/// - `x-signature` or `x-webhook-signature`: HMAC digest, possibly in the
///   compound `t=<ts>,v1=<digest>` format
/// - `x-api-key`: static fallback credential
///
/// # Responses
///
/// - `200 {"received": true}` - accepted (including the unrecognized-status
///   no-op case)
/// - `401 {"error": "Invalid webhook authentication"}`
/// - `404 {"error": "Transaction not found"}`
/// - `500 {"error": "Webhook processing failed"}`
/// - `503 {"error": "Webhook disabled: missing DATABASE_URL"}`
pub async fn receive_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    // Fail fast before touching the pipeline when the store is absent.
    let store = state
        .store
        .as_deref()
        .ok_or(AppError::WebhookDisabled("DATABASE_URL"))?;

    let signature = headers
        .get("x-signature")
        .or_else(|| headers.get("x-webhook-signature"))
        .and_then(|value| value.to_str().ok());
    let api_key = headers.get("x-api-key").and_then(|value| value.to_str().ok());

    if !state.verifier.verify(&body, signature, api_key) {
        return Err(AppError::InvalidWebhookAuth);
    }

    let payload: Value = serde_json::from_slice(&body)
        .map_err(|err| AppError::Processing(format!("webhook body is not valid JSON: {err}")))?;

    let event = normalizer::normalize(&payload);

    let transaction = locator::locate(store, &event).await?;

    tracing::info!(
        transaction_id = %transaction.id,
        order_id = %transaction.order_id,
        raw_status = event.raw_status.as_deref().unwrap_or("-"),
        "reconciling webhook"
    );

    let outcome = reconciler::reconcile(store, &transaction, &event).await;

    if outcome.changed_state() {
        cache::invalidate_payment_caches(state.cache.as_ref(), &transaction).await;
    }

    Ok(Json(json!({ "received": true })))
}
