//! Requisition (bank consent) domain model

use std::fmt;

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Consent lifecycle as seen by the authorization manager.
///
/// Every raw aggregator status collapses into exactly one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConsentState {
    PendingConsent,
    Authorized,
    Expired,
    Unknown,
}

/// Raw requisition status as reported by the aggregator.
///
/// Serialized as the aggregator's two-letter code so persisted records keep
/// the upstream representation. Codes we don't recognise survive a round trip
/// through `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RequisitionStatus {
    Created,
    GivingConsent,
    UndergoingAuthentication,
    Rejected,
    SelectingAccounts,
    GrantingAccess,
    Linked,
    Suspended,
    Expired,
    Other(String),
}

impl RequisitionStatus {
    pub fn code(&self) -> &str {
        match self {
            Self::Created => "CR",
            Self::GivingConsent => "GC",
            Self::UndergoingAuthentication => "UA",
            Self::Rejected => "RJ",
            Self::SelectingAccounts => "SA",
            Self::GrantingAccess => "GA",
            Self::Linked => "LN",
            Self::Suspended => "SU",
            Self::Expired => "EX",
            Self::Other(code) => code,
        }
    }

    pub fn state(&self) -> ConsentState {
        match self {
            Self::Linked => ConsentState::Authorized,
            Self::Expired => ConsentState::Expired,
            Self::Created
            | Self::GivingConsent
            | Self::UndergoingAuthentication
            | Self::SelectingAccounts
            | Self::GrantingAccess => ConsentState::PendingConsent,
            Self::Rejected | Self::Suspended | Self::Other(_) => ConsentState::Unknown,
        }
    }
}

impl From<String> for RequisitionStatus {
    fn from(code: String) -> Self {
        match code.as_str() {
            "CR" => Self::Created,
            "GC" => Self::GivingConsent,
            "UA" => Self::UndergoingAuthentication,
            "RJ" => Self::Rejected,
            "SA" => Self::SelectingAccounts,
            "GA" => Self::GrantingAccess,
            "LN" => Self::Linked,
            "SU" => Self::Suspended,
            "EX" => Self::Expired,
            _ => Self::Other(code),
        }
    }
}

impl From<RequisitionStatus> for String {
    fn from(status: RequisitionStatus) -> Self {
        status.code().to_string()
    }
}

impl fmt::Display for RequisitionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A time-bounded consent record granting read access to one bank connection.
///
/// Field names follow the aggregator's JSON so a record can be persisted
/// exactly as it was received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Requisition {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    #[serde(default)]
    pub redirect: String,
    pub status: RequisitionStatus,
    #[serde(default)]
    pub institution_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agreement: Option<String>,
    #[serde(default)]
    pub reference: String,
    #[serde(default)]
    pub accounts: Vec<String>,
    /// Initiation link the user visits to grant consent
    #[serde(default)]
    pub link: String,
}

impl Requisition {
    pub fn state(&self) -> ConsentState {
        self.status.state()
    }

    pub fn is_authorized(&self) -> bool {
        self.state() == ConsentState::Authorized
    }
}

/// Parameters for creating a fresh requisition
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewRequisition {
    pub institution_id: String,
    pub redirect: String,
    pub reference: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agreement: Option<String>,
}

impl NewRequisition {
    /// Build a creation request with a reference derived from the current time.
    pub fn new(institution_id: impl Into<String>, redirect: impl Into<String>) -> Self {
        Self {
            institution_id: institution_id.into(),
            redirect: redirect.into(),
            reference: Utc::now().timestamp_millis().to_string(),
            agreement: None,
        }
    }
}
