//! Payment Webhook Service - Main Application Entry Point
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment variables
//! 2. Create the database pool and run migrations (when configured)
//! 3. Build the HTTP router with the webhook pipeline and middleware
//! 4. Start the server on the configured port
//!
//! A missing `DATABASE_URL` is not fatal: the server starts and the
//! webhook endpoint answers 503 until the credential is supplied, so a
//! misconfigured deploy is visible in responses rather than a crash loop.

use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use payment_webhook_server::middleware::rate_limit::{RateLimiter, SlidingWindowLimiter};
use payment_webhook_server::services::cache::{CacheInvalidator, InMemoryTagCache};
use payment_webhook_server::services::signature::SignatureVerifier;
use payment_webhook_server::store::{PaymentStore, PgPaymentStore};
use payment_webhook_server::{AppState, build_router, config, db};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging with tracing subscriber. Reads RUST_LOG environment
    // variable (defaults to "info" level)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    // Load configuration
    let config = config::Config::from_env()?;
    tracing::info!(environment = %config.environment, "Configuration loaded");

    // Create database pool and run migrations, if credentials are present
    let store: Option<Arc<dyn PaymentStore>> = match &config.database_url {
        Some(database_url) => {
            let pool = db::create_pool(database_url).await?;
            tracing::info!("Database pool created");

            db::run_migrations(&pool).await?;
            tracing::info!("Database migrations complete");

            Some(Arc::new(PgPaymentStore::new(pool)) as Arc<dyn PaymentStore>)
        }
        None => {
            tracing::warn!("DATABASE_URL not set; webhook endpoint will answer 503");
            None
        }
    };

    if config.webhook_secret.is_none() && config.is_production() {
        tracing::error!("WEBHOOK_SECRET not set in production; all deliveries will be rejected");
    }

    let state = AppState {
        store,
        verifier: SignatureVerifier::from_config(&config),
        cache: Arc::new(InMemoryTagCache::new()) as Arc<dyn CacheInvalidator>,
    };

    let limiter: Arc<dyn RateLimiter> = Arc::new(SlidingWindowLimiter::new(
        config.rate_limit_max_requests,
        Duration::from_secs(config.rate_limit_window_secs),
    ));

    let app = build_router(state, limiter);

    // Bind to network address and start server
    let addr = format!("0.0.0.0:{}", config.server_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    // Start serving HTTP requests
    // This blocks forever, handling webhook deliveries concurrently with tokio
    axum::serve(listener, app).await?;

    Ok(())
}
