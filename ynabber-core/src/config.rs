//! Configuration management
//!
//! The core consumes a plain struct. It can be read from a JSON settings file:
//! ```json
//! {
//!   "readers": ["nordigen"],
//!   "writers": ["ynab"],
//!   "intervalSecs": 21600,
//!   "nordigen": { "bankId": "NORDEA_NDEADKKK", "secretId": "...", "secretKey": "..." },
//!   "ynab": { "budgetId": "...", "token": "...", "accountMap": { "DK50...": "ynab-account-id" } }
//! }
//! ```
//! and the CLI layers environment variables and flags on top.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Redirect target shown to the user after granting consent
pub const DEFAULT_REDIRECT: &str =
    "https://raw.githubusercontent.com/martinohansen/ynabber/main/ok.html";

pub const DEFAULT_NORDIGEN_URL: &str = "https://bankaccountdata.gocardless.com";
pub const DEFAULT_YNAB_URL: &str = "https://api.ynab.com/v1";

/// ynabber configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Active source names, in run order
    pub readers: Vec<String>,
    /// Active sink names, in run order
    pub writers: Vec<String>,
    pub port: u16,
    /// Seconds between scheduled runs. 0 runs once and exits.
    pub interval_secs: u64,
    /// Where requisition files live
    pub data_dir: PathBuf,
    pub debug: bool,
    /// Acknowledge `/run` immediately and sync in the background
    pub detached: bool,
    pub nordigen: NordigenConfig,
    pub ynab: YnabConfig,
    pub json: JsonConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            readers: vec!["nordigen".to_string()],
            writers: vec!["ynab".to_string()],
            port: 8080,
            interval_secs: 0,
            data_dir: PathBuf::from("."),
            debug: false,
            detached: false,
            nordigen: NordigenConfig::default(),
            ynab: YnabConfig::default(),
            json: JsonConfig::default(),
        }
    }
}

impl Config {
    /// Load config from a JSON settings file. A missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse settings file {}", path.display()))
    }

    /// Delay between scheduled runs, `None` in single-shot mode
    pub fn interval(&self) -> Option<Duration> {
        (self.interval_secs > 0).then(|| Duration::from_secs(self.interval_secs))
    }

    /// Check the settings that every deployment needs
    pub fn validate(&self) -> Result<()> {
        if self.readers.is_empty() {
            anyhow::bail!("At least one reader must be configured");
        }
        if self.writers.is_empty() {
            anyhow::bail!("At least one writer must be configured");
        }
        Ok(())
    }
}

/// Nordigen (GoCardless Bank Account Data) settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NordigenConfig {
    /// Default institution id when a trigger names none
    pub bank_id: String,
    pub secret_id: String,
    pub secret_key: String,
    /// Executable invoked with `<status> <link>` when a requisition is created
    pub requisition_hook: Option<PathBuf>,
    /// Storage name override; replaces the bank id as the file name
    pub requisition_file: Option<String>,
    /// Fields tried in order when picking a payee
    pub payee_source: Vec<PayeeSource>,
    pub base_url: String,
    pub redirect: String,
    /// Seconds between requisition status polls
    pub poll_interval_secs: u64,
    pub max_polls: u32,
}

impl Default for NordigenConfig {
    fn default() -> Self {
        Self {
            bank_id: String::new(),
            secret_id: String::new(),
            secret_key: String::new(),
            requisition_hook: None,
            requisition_file: None,
            payee_source: vec![PayeeSource::Name, PayeeSource::Unstructured],
            base_url: DEFAULT_NORDIGEN_URL.to_string(),
            redirect: DEFAULT_REDIRECT.to_string(),
            poll_interval_secs: 60,
            max_polls: 5,
        }
    }
}

/// Where a transaction's payee text comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayeeSource {
    /// Creditor or debtor name
    Name,
    /// Unstructured remittance information
    Unstructured,
    /// Additional information
    Additional,
}

impl FromStr for PayeeSource {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "name" => Ok(Self::Name),
            "unstructured" => Ok(Self::Unstructured),
            "additional" => Ok(Self::Additional),
            other => anyhow::bail!("Unknown payee source: {}", other),
        }
    }
}

/// YNAB settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct YnabConfig {
    pub budget_id: String,
    pub token: String,
    /// Source account reference (IBAN) to YNAB account id
    pub account_map: HashMap<String, String>,
    /// Skip transactions dated before this day
    pub from_date: Option<NaiveDate>,
    pub cleared: ClearedStatus,
    pub base_url: String,
}

impl Default for YnabConfig {
    fn default() -> Self {
        Self {
            budget_id: String::new(),
            token: String::new(),
            account_map: HashMap::new(),
            from_date: None,
            cleared: ClearedStatus::Uncleared,
            base_url: DEFAULT_YNAB_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClearedStatus {
    Cleared,
    #[default]
    Uncleared,
    Reconciled,
}

impl FromStr for ClearedStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cleared" => Ok(Self::Cleared),
            "uncleared" => Ok(Self::Uncleared),
            "reconciled" => Ok(Self::Reconciled),
            other => anyhow::bail!("Unknown cleared status: {}", other),
        }
    }
}

/// JSON sink settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JsonConfig {
    /// Output file; stdout when unset
    pub path: Option<PathBuf>,
}
