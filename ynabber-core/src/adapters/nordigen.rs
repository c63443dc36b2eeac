//! Nordigen (GoCardless Bank Account Data) client and source
//!
//! The client implements both aggregator ports: requisition management for
//! the authorization manager, and account data for the source.
//!
//! API Documentation: https://developer.gocardless.com/bank-account-data/overview

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use tokio::sync::Mutex;

use crate::config::PayeeSource;
use crate::domain::result::{Error, Result};
use crate::domain::{Amount, NewRequisition, Requisition, Transaction};
use crate::ports::{AccountData, AccountDetails, RequisitionClient, Source};
use crate::services::AuthorizationManager;

/// Refresh the access token this long before it actually expires
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

// =============================================================================
// API Response Models
// =============================================================================

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access: String,
    /// Lifetime in seconds
    access_expires: u64,
}

#[derive(Debug, Deserialize)]
struct TransactionsResponse {
    transactions: TransactionLists,
}

#[derive(Debug, Deserialize)]
struct TransactionLists {
    #[serde(default)]
    booked: Vec<JsonValue>,
}

/// Booked transaction fields we map; the full object is kept as `raw`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BookedTransaction {
    #[serde(default)]
    transaction_id: Option<String>,
    #[serde(default)]
    internal_transaction_id: Option<String>,
    #[serde(default)]
    booking_date: Option<String>,
    #[serde(default)]
    value_date: Option<String>,
    transaction_amount: TransactionAmount,
    #[serde(default)]
    creditor_name: Option<String>,
    #[serde(default)]
    debtor_name: Option<String>,
    #[serde(default)]
    remittance_information_unstructured: Option<String>,
    #[serde(default)]
    additional_information: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TransactionAmount {
    amount: String,
    #[serde(default)]
    currency: String,
}

// =============================================================================
// Nordigen HTTP Client
// =============================================================================

#[derive(Debug, Clone)]
struct AccessToken {
    access: String,
    expires_at: Instant,
}

/// Nordigen API client with a cached access token
#[derive(Debug)]
pub struct NordigenClient {
    client: Client,
    base_url: String,
    secret_id: String,
    secret_key: String,
    token: Mutex<Option<AccessToken>>,
}

impl NordigenClient {
    pub fn new(base_url: &str, secret_id: &str, secret_key: &str) -> Result<Self> {
        if secret_id.is_empty() || secret_key.is_empty() {
            return Err(Error::config("Nordigen secret id and secret key are required"));
        }

        let client = Client::builder().timeout(Duration::from_secs(120)).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            secret_id: secret_id.to_string(),
            secret_key: secret_key.to_string(),
            token: Mutex::new(None),
        })
    }

    /// Current access token, fetching a new one when missing or about to expire
    async fn access_token(&self) -> Result<String> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.expires_at > Instant::now() + TOKEN_EXPIRY_MARGIN {
                return Ok(token.access.clone());
            }
        }

        tracing::debug!("requesting new Nordigen access token");
        let response = self
            .client
            .post(format!("{}/api/v2/token/new/", self.base_url))
            .json(&serde_json::json!({
                "secret_id": self.secret_id,
                "secret_key": self.secret_key,
            }))
            .send()
            .await
            .map_err(map_request_error)?;
        let token: TokenResponse = check_response_status(response).await?.json().await?;

        let access = token.access.clone();
        *cached = Some(AccessToken {
            access: token.access,
            expires_at: Instant::now() + Duration::from_secs(token.access_expires),
        });
        Ok(access)
    }

    async fn authorized(&self, request: RequestBuilder) -> Result<Response> {
        let token = self.access_token().await?;
        let response = request
            .bearer_auth(token)
            .send()
            .await
            .map_err(map_request_error)?;
        check_response_status(response).await
    }
}

#[async_trait]
impl RequisitionClient for NordigenClient {
    async fn create_requisition(&self, request: &NewRequisition) -> Result<Requisition> {
        let url = format!("{}/api/v2/requisitions/", self.base_url);
        let response = self.authorized(self.client.post(url).json(request)).await?;
        Ok(response.json().await?)
    }

    async fn get_requisition(&self, id: &str) -> Result<Requisition> {
        let url = format!("{}/api/v2/requisitions/{}/", self.base_url, id);
        let response = self.authorized(self.client.get(url)).await?;
        Ok(response.json().await?)
    }
}

#[async_trait]
impl AccountData for NordigenClient {
    async fn account_details(&self, account_id: &str) -> Result<AccountDetails> {
        let url = format!("{}/api/v2/accounts/{}/", self.base_url, account_id);
        let response = self.authorized(self.client.get(url)).await?;
        Ok(response.json().await?)
    }

    async fn booked_transactions(&self, account_id: &str) -> Result<Vec<JsonValue>> {
        let url = format!("{}/api/v2/accounts/{}/transactions/", self.base_url, account_id);
        let response = self.authorized(self.client.get(url)).await?;
        let body: TransactionsResponse = response.json().await?;
        Ok(body.transactions.booked)
    }
}

/// Map request errors to user-friendly messages
fn map_request_error(error: reqwest::Error) -> Error {
    if error.is_timeout() {
        Error::upstream("Nordigen request timed out after 120 seconds")
    } else if error.is_connect() {
        Error::upstream("Unable to connect to Nordigen servers")
    } else {
        Error::Http(error)
    }
}

/// Check response status and return appropriate errors
async fn check_response_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(match status.as_u16() {
        401 => Error::upstream(format!(
            "Nordigen authentication failed, check secret id and key: {}",
            body
        )),
        403 => Error::upstream(format!("Nordigen access denied: {}", body)),
        404 => Error::NotFound(format!("Nordigen resource: {}", body)),
        429 => Error::upstream("Nordigen rate limit exceeded. Please wait and try again."),
        code => Error::upstream(format!("Nordigen API error: HTTP {}: {}", code, body)),
    })
}

// =============================================================================
// NordigenSource - implements Source
// =============================================================================

/// Reads booked transactions for every account on an authorized requisition
pub struct NordigenSource {
    auth: Arc<AuthorizationManager>,
    accounts: Arc<dyn AccountData>,
    payee_sources: Vec<PayeeSource>,
}

impl NordigenSource {
    pub fn new(
        auth: Arc<AuthorizationManager>,
        accounts: Arc<dyn AccountData>,
        payee_sources: Vec<PayeeSource>,
    ) -> Self {
        Self {
            auth,
            accounts,
            payee_sources,
        }
    }
}

#[async_trait]
impl Source for NordigenSource {
    fn name(&self) -> &str {
        "nordigen"
    }

    async fn bulk(&self, bank_id: &str) -> Result<Vec<Transaction>> {
        let requisition = self.auth.obtain_authorized(bank_id).await?;

        let mut transactions = Vec::new();
        for account_id in &requisition.accounts {
            let details = self.accounts.account_details(account_id).await?;
            let booked = self.accounts.booked_transactions(account_id).await?;
            tracing::debug!(
                account = %details.reference(),
                count = booked.len(),
                "fetched booked transactions"
            );
            for raw in booked {
                transactions.push(map_transaction(raw, details.reference(), &self.payee_sources)?);
            }
        }
        Ok(transactions)
    }
}

/// Map one raw booked transaction to the domain model
fn map_transaction(
    raw: JsonValue,
    account: &str,
    payee_sources: &[PayeeSource],
) -> Result<Transaction> {
    let booked: BookedTransaction = serde_json::from_value(raw.clone())?;

    let id = booked
        .transaction_id
        .clone()
        .or_else(|| booked.internal_transaction_id.clone())
        .ok_or_else(|| Error::upstream("Nordigen transaction without an id"))?;

    let date_str = booked
        .booking_date
        .as_deref()
        .or(booked.value_date.as_deref())
        .ok_or_else(|| Error::upstream(format!("Nordigen transaction {} has no date", id)))?;
    let date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
        .map_err(|e| Error::upstream(format!("invalid date {:?} on {}: {}", date_str, id, e)))?;

    let amount: Amount = booked.transaction_amount.amount.parse()?;
    let payee = pick_payee(&booked, amount, payee_sources);

    let mut tx = Transaction::new(id, account, payee, amount, date);
    tx.memo = booked
        .remittance_information_unstructured
        .clone()
        .unwrap_or_default();
    tx.currency = booked.transaction_amount.currency.clone();
    tx.raw = raw;
    Ok(tx)
}

/// First non-blank payee candidate in configured order
fn pick_payee(booked: &BookedTransaction, amount: Amount, sources: &[PayeeSource]) -> String {
    // Money going out is paid to the creditor; money coming in is from the debtor
    let (primary, secondary) = if amount.minor() < 0 {
        (&booked.creditor_name, &booked.debtor_name)
    } else {
        (&booked.debtor_name, &booked.creditor_name)
    };

    sources
        .iter()
        .filter_map(|source| match source {
            PayeeSource::Name => primary.as_deref().or(secondary.as_deref()),
            PayeeSource::Unstructured => booked.remittance_information_unstructured.as_deref(),
            PayeeSource::Additional => booked.additional_information.as_deref(),
        })
        .map(str::trim)
        .find(|candidate| !candidate.is_empty())
        .unwrap_or_default()
        .to_string()
}

// =============================================================================
// Tests
// =============================================================================
