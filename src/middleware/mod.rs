//! HTTP middleware components.
//!
//! Middleware are functions that run before route handlers. They can
//! short-circuit a request (reject an abusive caller) before the pipeline
//! does any work.

/// Per-IP request rate limiting
pub mod rate_limit;
