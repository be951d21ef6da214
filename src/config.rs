//! Application configuration management.
//!
//! This module handles loading configuration from environment variables.
//! It uses the `envy` crate to automatically deserialize environment
//! variables into a type-safe struct.

use serde::Deserialize;

/// Application configuration loaded from environment variables.
///
/// # Environment Variables
///
/// - `DATABASE_URL` (optional): PostgreSQL connection string. When absent
///   the server still starts, but the webhook endpoint answers 503 until
///   the credential is supplied.
/// - `SERVER_PORT` (optional): HTTP server port, defaults to 3000
/// - `WEBHOOK_SECRET` (optional): shared secret for HMAC signature
///   verification. Without it the verifier fails open in development and
///   closed in production.
/// - `WEBHOOK_API_KEY` (optional): static fallback credential accepted in
///   the `x-api-key` header when HMAC verification fails
/// - `ENVIRONMENT` (optional): "development" (default) or "production"
/// - `RATE_LIMIT_MAX_REQUESTS` (optional): per-IP request cap, defaults to 60
/// - `RATE_LIMIT_WINDOW_SECS` (optional): sliding window size, defaults to 60
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: Option<String>,

    #[serde(default = "default_port")]
    pub server_port: u16,

    pub webhook_secret: Option<String>,

    pub webhook_api_key: Option<String>,

    #[serde(default = "default_environment")]
    pub environment: String,

    #[serde(default = "default_rate_limit_max_requests")]
    pub rate_limit_max_requests: u32,

    #[serde(default = "default_rate_limit_window_secs")]
    pub rate_limit_window_secs: u64,
}

/// Default port if SERVER_PORT environment variable is not set.
fn default_port() -> u16 {
    3000
}

fn default_environment() -> String {
    "development".to_string()
}

fn default_rate_limit_max_requests() -> u32 {
    60
}

fn default_rate_limit_window_secs() -> u64 {
    60
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// This method first attempts to load a `.env` file (which is optional),
    /// then reads environment variables and deserializes them into a Config
    /// struct.
    ///
    /// # Errors
    ///
    /// Returns an error if environment variable values cannot be parsed
    /// into the expected types.
    pub fn from_env() -> Result<Self, envy::Error> {
        // Try to load .env file if it exists (does nothing if not found)
        dotenvy::dotenv().ok();

        // Parse environment variables into Config struct
        // Field names are automatically converted: database_url -> DATABASE_URL
        envy::from_env::<Config>()
    }

    /// Whether the verifier and other policy switches should fail closed.
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }
}
