//! Consent store port - one persisted requisition per bank key

use async_trait::async_trait;

use crate::domain::result::Result;
use crate::domain::Requisition;

/// Outcome of reading a stored requisition
#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    /// Nothing stored under the key; no prior consent
    Absent,
    /// Something is stored but it does not parse
    Corrupt(String),
    Found(Requisition),
}

/// Key-to-blob storage for requisitions
///
/// Storage keys come from [`ConsentStore::key_for`]: a configured override
/// name wins over the bank id, and the result is sanitized before use.
#[async_trait]
pub trait ConsentStore: Send + Sync {
    /// Resolved, sanitized storage key for a bank id
    fn key_for(&self, bank_id: &str) -> String;

    /// Read-only lookup. Errors other than "not stored" are returned as `Err`.
    async fn load(&self, bank_id: &str) -> Result<LoadOutcome>;

    /// Create or overwrite the record for `bank_id`
    async fn save(&self, bank_id: &str, requisition: &Requisition) -> Result<()>;
}
