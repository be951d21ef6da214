//! Health check endpoint for service monitoring.

use axum::{Json, extract::State};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::AppState;
use crate::error::AppError;

/// Health check response.
///
/// Returns service status and database connectivity.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Overall service status
    pub status: String,

    /// Database connection status
    pub database: String,

    /// Current server timestamp
    pub timestamp: DateTime<Utc>,
}

/// Health check handler.
///
/// # Checks
///
/// - Database connectivity (simple query through the store)
///
/// A server running without store credentials reports `degraded` with the
/// database `unconfigured` instead of failing, so orchestrators keep the
/// process alive while the webhook endpoint answers 503.
///
/// # Response (200 OK)
///
/// ```json
/// {
///   "status": "healthy",
///   "database": "connected",
///   "timestamp": "2026-08-01T19:00:00Z"
/// }
/// ```
pub async fn health_check(State(state): State<AppState>) -> Result<Json<HealthResponse>, AppError> {
    let (status, database) = match &state.store {
        Some(store) => {
            store.ping().await?;
            ("healthy", "connected")
        }
        None => ("degraded", "unconfigured"),
    };

    Ok(Json(HealthResponse {
        status: status.to_string(),
        database: database.to_string(),
        timestamp: Utc::now(),
    }))
}
