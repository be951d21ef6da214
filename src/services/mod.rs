//! Business logic services.
//!
//! Services contain the reconciliation pipeline separated from HTTP
//! handlers: request authentication, payload normalization, transaction
//! lookup, the status state machine, and cache invalidation.

pub mod cache;
pub mod locator;
pub mod normalizer;
pub mod reconciler;
pub mod signature;
