//! Payment webhook reconciliation service.
//!
//! Receives asynchronous payment-gateway callbacks, verifies their
//! authenticity, maps them onto the internal transaction/order state
//! machine, and applies idempotent updates across the payment tables plus
//! an append-only audit log.
//!
//! # Architecture
//!
//! - **Web Framework**: Axum (async HTTP server)
//! - **Database**: PostgreSQL with sqlx, behind a `PaymentStore` trait
//! - **Authentication**: HMAC-SHA256 over the raw body, API-key fallback
//! - **Format**: JSON requests/responses
//!
//! The library crate exposes the module tree and the router builder so the
//! binary and the integration tests serve the exact same application.

use std::sync::Arc;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod store;

use crate::middleware::rate_limit::RateLimiter;
use crate::services::cache::CacheInvalidator;
use crate::services::signature::SignatureVerifier;
use crate::store::PaymentStore;

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Payment store; `None` when `DATABASE_URL` is absent, which puts the
    /// webhook endpoint into 503 "disabled" mode instead of crashing.
    pub store: Option<Arc<dyn PaymentStore>>,

    /// Webhook authenticity checks (HMAC + API-key fallback)
    pub verifier: SignatureVerifier,

    /// Read-cache invalidation seam
    pub cache: Arc<dyn CacheInvalidator>,
}

/// Build the HTTP router.
///
/// # Routes
///
/// - `POST /api/payments/webhooks` - gateway callback endpoint,
///   rate-limited per client IP
/// - `GET /health` - liveness probe, not rate-limited
pub fn build_router(state: AppState, limiter: Arc<dyn RateLimiter>) -> Router {
    // Rate limiting applies to the webhook route only; starving the
    // health probe would make orchestrators restart a healthy process.
    let webhook_routes = Router::new()
        .route(
            "/api/payments/webhooks",
            post(handlers::webhooks::receive_webhook),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            limiter,
            middleware::rate_limit::enforce,
        ));

    Router::new()
        .route("/health", get(handlers::health::health_check))
        .merge(webhook_routes)
        // Distributed tracing middleware for observability
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
