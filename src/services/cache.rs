//! Read-cache invalidation after reconciliation.
//!
//! Storefront and admin read paths cache order and payment views under
//! named tags. After a state-changing reconciliation those tags are marked
//! stale so the next read refetches. Invalidation is fire-and-forget:
//! failures are logged and never turn into a webhook error, because the
//! transaction state is already updated and a gateway retry would not help.

use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use crate::error::AppError;
use crate::models::transaction::PaymentTransaction;

/// Named-tag cache invalidation seam.
///
/// The default is process-local; a shared cache layer (CDN, Redis) plugs in
/// by implementing this trait.
#[async_trait]
pub trait CacheInvalidator: Send + Sync {
    /// Mark one tag stale.
    async fn invalidate(&self, tag: &str) -> Result<(), AppError>;
}

/// Process-local stale-tag set.
///
/// Doubles as the observation point in tests: `is_stale` tells whether a
/// tag was invalidated since startup.
#[derive(Debug, Default)]
pub struct InMemoryTagCache {
    stale: Mutex<HashSet<String>>,
}

impl InMemoryTagCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_stale(&self, tag: &str) -> bool {
        self.stale
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(tag)
    }

    pub fn stale_tags(&self) -> HashSet<String> {
        self.stale
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl CacheInvalidator for InMemoryTagCache {
    async fn invalidate(&self, tag: &str) -> Result<(), AppError> {
        self.stale
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(tag.to_string());
        tracing::debug!(tag, "cache tag marked stale");
        Ok(())
    }
}

/// Tags whose cached views depend on this transaction's order or payment.
///
/// Covers the customer and admin order lists, the order's detail view, the
/// owning user's order list, and the payment views.
pub fn reconciliation_tags(transaction: &PaymentTransaction) -> Vec<String> {
    vec![
        "orders".to_string(),
        "admin-orders".to_string(),
        format!("order-{}", transaction.order_id),
        format!("user-{}-orders", transaction.user_id),
        "payments".to_string(),
        format!("payment-{}", transaction.id),
    ]
}

/// Invalidate every dependent tag, logging failures and moving on.
pub async fn invalidate_payment_caches(
    cache: &dyn CacheInvalidator,
    transaction: &PaymentTransaction,
) {
    for tag in reconciliation_tags(transaction) {
        if let Err(err) = cache.invalidate(&tag).await {
            tracing::warn!(error = %err, tag, "cache invalidation failed");
        }
    }
}
