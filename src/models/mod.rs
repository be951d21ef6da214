//! Data models representing database entities.
//!
//! This module contains all data structures that map to database tables,
//! plus the status vocabularies written by the reconciliation pipeline.

/// Payment transaction model (one row per payment attempt)
pub mod transaction;
/// Order model (fulfillment + payment state)
pub mod order;
/// Append-only audit log model
pub mod payment_log;
