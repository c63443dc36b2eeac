//! Bank-data aggregator ports
//!
//! Split in two: consent initiation (used by the authorization manager) and
//! account data (used by sources once a consent is usable).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::domain::result::Result;
use crate::domain::{NewRequisition, Requisition};

/// Consent-initiation interface of the aggregator
#[async_trait]
pub trait RequisitionClient: Send + Sync {
    /// Create a fresh pending requisition
    async fn create_requisition(&self, request: &NewRequisition) -> Result<Requisition>;

    /// Re-fetch a requisition by id
    async fn get_requisition(&self, id: &str) -> Result<Requisition>;
}

/// Account metadata returned by the aggregator
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountDetails {
    pub id: String,
    #[serde(default)]
    pub iban: Option<String>,
    #[serde(default)]
    pub owner_name: Option<String>,
}

impl AccountDetails {
    /// Reference used to address the account downstream
    pub fn reference(&self) -> &str {
        self.iban
            .as_deref()
            .filter(|iban| !iban.is_empty())
            .unwrap_or(&self.id)
    }
}

/// Account data interface of the aggregator
#[async_trait]
pub trait AccountData: Send + Sync {
    async fn account_details(&self, account_id: &str) -> Result<AccountDetails>;

    /// Booked transactions for one account, as raw upstream JSON objects
    async fn booked_transactions(&self, account_id: &str) -> Result<Vec<JsonValue>>;
}
