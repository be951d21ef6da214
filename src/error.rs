//! Error types and HTTP error response handling.
//!
//! This module defines all application errors and how they are converted
//! into HTTP responses. The webhook endpoint is server-to-server, so every
//! failure surface is a status code plus a small JSON body; details stay in
//! the server logs.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

/// Application-wide error type.
///
/// # Error Categories
///
/// - **Database Errors**: Any sqlx::Error from store operations
/// - **Authentication Errors**: Signature and API-key fallback both failed
/// - **Lookup Errors**: No (or more than one) matching payment transaction
/// - **Configuration Errors**: Required store credentials absent
/// - **Abuse Errors**: Per-IP rate limit exceeded
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Database operation failed (e.g., connection error, query error).
    ///
    /// Wraps any sqlx::Error via `#[from]`. Surfaces as a generic 500 so
    /// gateway retries carry no internal detail.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Signature verification failed and no valid fallback API key was
    /// presented.
    ///
    /// Returns HTTP 401 Unauthorized. The gateway decides its own retry
    /// policy; no transaction state was touched.
    #[error("Invalid webhook authentication")]
    InvalidWebhookAuth,

    /// No payment transaction matched the webhook's reference or gateway id.
    ///
    /// Returns HTTP 404 Not Found.
    #[error("Transaction not found")]
    TransactionNotFound,

    /// More than one payment transaction matched.
    ///
    /// Should be impossible given the uniqueness constraints; when it
    /// happens anyway the request fails loudly rather than reconciling an
    /// arbitrary row. Returns HTTP 500.
    #[error("Ambiguous transaction match")]
    AmbiguousTransaction,

    /// Anything unexpected inside the pipeline (malformed body, serialization).
    ///
    /// Returns HTTP 500. The String is logged, never sent to the caller.
    #[error("Webhook processing failed: {0}")]
    Processing(String),

    /// Required configuration is absent, the endpoint is disabled.
    ///
    /// Returns HTTP 503 Service Unavailable naming the missing variable.
    #[error("Webhook disabled: missing {0}")]
    WebhookDisabled(&'static str),

    /// Caller exceeded the per-IP rate limit.
    ///
    /// Returns HTTP 429 Too Many Requests.
    #[error("Too many requests")]
    RateLimited,
}

/// Convert AppError into an HTTP response.
///
/// # Response Format
///
/// All errors return JSON in this format:
/// ```json
/// {
///   "error": "Human-readable error message"
/// }
/// ```
///
/// # Status Code Mapping
///
/// - `InvalidWebhookAuth` → 401 Unauthorized
/// - `TransactionNotFound` → 404 Not Found
/// - `RateLimited` → 429 Too Many Requests
/// - `Database` / `AmbiguousTransaction` / `Processing` → 500 (generic body,
///   detail only in logs)
/// - `WebhookDisabled` → 503 Service Unavailable
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::InvalidWebhookAuth => {
                (StatusCode::UNAUTHORIZED, self.to_string())
            }
            AppError::TransactionNotFound => (StatusCode::NOT_FOUND, self.to_string()),
            AppError::RateLimited => (StatusCode::TOO_MANY_REQUESTS, self.to_string()),
            AppError::Database(err) => {
                tracing::error!(error = %err, "database error while processing webhook");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Webhook processing failed".to_string(),
                )
            }
            AppError::AmbiguousTransaction => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Webhook processing failed".to_string(),
            ),
            AppError::Processing(detail) => {
                tracing::error!(detail = %detail, "webhook processing failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Webhook processing failed".to_string(),
                )
            }
            AppError::WebhookDisabled(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, self.to_string())
            }
        };

        let body = Json(json!({ "error": message }));

        (status, body).into_response()
    }
}
