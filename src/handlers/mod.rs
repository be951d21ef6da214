//! HTTP request handlers (route handlers).
//!
//! Each handler is an async function that:
//! 1. Receives HTTP request data (headers, raw body)
//! 2. Drives the service-layer pipeline
//! 3. Returns HTTP response (JSON, status code)

/// Service health endpoint
pub mod health;
/// Inbound payment gateway webhook endpoint
pub mod webhooks;
