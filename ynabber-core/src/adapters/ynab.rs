//! YNAB sink
//!
//! Posts the whole batch to the budget's transactions endpoint. YNAB drops
//! transactions whose `import_id` it has already seen, which makes
//! re-delivery after a partial failure harmless.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::{ClearedStatus, YnabConfig};
use crate::domain::result::{Error, Result};
use crate::domain::Transaction;
use crate::ports::Sink;

const MAX_PAYEE_CHARS: usize = 200;
const MAX_MEMO_CHARS: usize = 500;

#[derive(Debug, Serialize)]
struct TransactionsRequest<'a> {
    transactions: Vec<YnabTransaction<'a>>,
}

#[derive(Debug, Serialize, PartialEq)]
struct YnabTransaction<'a> {
    account_id: &'a str,
    date: String,
    amount: i64,
    payee_name: String,
    memo: String,
    cleared: ClearedStatus,
    approved: bool,
    import_id: String,
}

#[derive(Debug, Default, Deserialize)]
struct TransactionsResponse {
    #[serde(default)]
    data: SaveSummary,
}

#[derive(Debug, Default, Deserialize)]
struct SaveSummary {
    #[serde(default)]
    transaction_ids: Vec<String>,
    #[serde(default)]
    duplicate_import_ids: Vec<String>,
}

pub struct YnabSink {
    client: Client,
    base_url: String,
    budget_id: String,
    token: String,
    account_map: HashMap<String, String>,
    from_date: Option<NaiveDate>,
    cleared: ClearedStatus,
}

impl YnabSink {
    pub fn new(config: &YnabConfig) -> Result<Self> {
        if config.token.is_empty() {
            return Err(Error::config("YNAB token is required"));
        }
        if config.budget_id.is_empty() {
            return Err(Error::config("YNAB budget id is required"));
        }

        let client = Client::builder().timeout(Duration::from_secs(60)).build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            budget_id: config.budget_id.clone(),
            token: config.token.clone(),
            account_map: config.account_map.clone(),
            from_date: config.from_date,
            cleared: config.cleared,
        })
    }

    /// Translate the batch, skipping unmapped accounts and old transactions
    fn build_payload<'a>(&'a self, transactions: &'a [Transaction]) -> Result<Vec<YnabTransaction<'a>>> {
        let mut payload = Vec::with_capacity(transactions.len());
        for tx in transactions {
            let Some(account_id) = self.account_map.get(&tx.account) else {
                tracing::debug!(account = %tx.account, id = %tx.id, "no YNAB account mapped, skipping");
                continue;
            };
            if self.from_date.is_some_and(|from| tx.date < from) {
                continue;
            }
            payload.push(YnabTransaction {
                account_id,
                date: tx.date.format("%Y-%m-%d").to_string(),
                amount: tx.amount.milliunits()?,
                payee_name: truncate(&tx.payee, MAX_PAYEE_CHARS),
                memo: truncate(&tx.memo, MAX_MEMO_CHARS),
                cleared: self.cleared,
                approved: false,
                import_id: tx.import_id(),
            });
        }
        Ok(payload)
    }
}

#[async_trait]
impl Sink for YnabSink {
    fn name(&self) -> &str {
        "ynab"
    }

    async fn bulk(&self, transactions: &[Transaction]) -> Result<()> {
        let payload = self.build_payload(transactions)?;
        if payload.is_empty() {
            tracing::info!("no transactions to write to YNAB");
            return Ok(());
        }

        let url = format!("{}/budgets/{}/transactions", self.base_url, self.budget_id);
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.token)
            .json(&TransactionsRequest {
                transactions: payload,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(match status.as_u16() {
                400 => Error::upstream(format!("YNAB rejected the transactions: {}", body)),
                401 => Error::upstream("YNAB authentication failed, check the token"),
                404 => Error::NotFound(format!("YNAB budget {}", self.budget_id)),
                429 => Error::upstream("YNAB rate limit exceeded. Please wait and try again."),
                code => Error::upstream(format!("YNAB API error: HTTP {}: {}", code, body)),
            });
        }

        let summary: TransactionsResponse = response.json().await.unwrap_or_default();
        tracing::info!(
            created = summary.data.transaction_ids.len(),
            duplicates = summary.data.duplicate_import_ids.len(),
            "wrote transactions to YNAB"
        );
        Ok(())
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}
