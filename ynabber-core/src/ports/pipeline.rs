//! Source and sink ports
//!
//! A sync run reads every configured source and hands the concatenated batch
//! to every configured sink. Both sides are whole-batch: there is no cursor
//! and no incremental delivery.

use async_trait::async_trait;

use crate::domain::result::Result;
use crate::domain::Transaction;

/// Pluggable transaction-fetching component
///
/// Implementations keep no state between calls apart from cached
/// credentials.
#[async_trait]
pub trait Source: Send + Sync {
    /// Registry name (e.g., "nordigen")
    fn name(&self) -> &str;

    /// Fetch every transaction currently available for `bank_id`
    async fn bulk(&self, bank_id: &str) -> Result<Vec<Transaction>>;
}

/// Pluggable transaction-recording component
///
/// Re-delivery after a partial failure may hand a sink records it has
/// already written; sinks either tolerate that or accept duplicates.
#[async_trait]
pub trait Sink: Send + Sync {
    /// Registry name (e.g., "ynab", "json")
    fn name(&self) -> &str;

    /// Durably record the whole batch
    async fn bulk(&self, transactions: &[Transaction]) -> Result<()>;
}
