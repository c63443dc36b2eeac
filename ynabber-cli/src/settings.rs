//! Environment variables and flags layered over the settings file

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::builder::BoolishValueParser;
use clap::Args;
use ynabber_core::config::{ClearedStatus, Config, PayeeSource};

#[derive(Args, Debug, Default)]
pub struct Overrides {
    /// Readers to fetch transactions from, comma separated
    #[arg(long, env = "YNABBER_READERS", value_delimiter = ',')]
    readers: Vec<String>,

    /// Writers to deliver transactions to, comma separated
    #[arg(long, env = "YNABBER_WRITERS", value_delimiter = ',')]
    writers: Vec<String>,

    /// Port for the run trigger
    #[arg(long, env = "YNABBER_PORT")]
    port: Option<u16>,

    /// Seconds between scheduled runs (0 = run once and exit)
    #[arg(long, env = "YNABBER_INTERVAL")]
    interval: Option<u64>,

    /// Directory for requisition files
    #[arg(long, env = "YNABBER_DATADIR")]
    data_dir: Option<PathBuf>,

    /// Debug logging
    #[arg(long, env = "YNABBER_DEBUG", value_parser = BoolishValueParser::new())]
    debug: bool,

    /// Answer /run immediately and sync in the background
    #[arg(long, env = "YNABBER_DETACHED", value_parser = BoolishValueParser::new())]
    detached: bool,

    /// Institution id of the bank to read
    #[arg(long, env = "NORDIGEN_BANKID")]
    nordigen_bank_id: Option<String>,

    #[arg(long, env = "NORDIGEN_SECRET_ID", hide_env_values = true)]
    nordigen_secret_id: Option<String>,

    #[arg(long, env = "NORDIGEN_SECRET_KEY", hide_env_values = true)]
    nordigen_secret_key: Option<String>,

    /// Executable called with (status, link) when consent is needed
    #[arg(long, env = "NORDIGEN_REQUISITION_HOOK")]
    nordigen_requisition_hook: Option<PathBuf>,

    /// Requisition file name overriding the bank id
    #[arg(long, env = "NORDIGEN_REQUISITION_FILE")]
    nordigen_requisition_file: Option<String>,

    /// Payee fields in priority order: name, unstructured, additional
    #[arg(long, env = "NORDIGEN_PAYEE_SOURCE", value_delimiter = ',')]
    nordigen_payee_source: Vec<String>,

    #[arg(long, env = "YNAB_BUDGETID")]
    ynab_budget_id: Option<String>,

    #[arg(long, env = "YNAB_TOKEN", hide_env_values = true)]
    ynab_token: Option<String>,

    /// JSON object mapping bank account references to YNAB account ids
    #[arg(long, env = "YNAB_ACCOUNTMAP")]
    ynab_account_map: Option<String>,

    /// Skip transactions booked before this date (YYYY-MM-DD)
    #[arg(long, env = "YNAB_FROM_DATE")]
    ynab_from_date: Option<NaiveDate>,

    /// cleared, uncleared or reconciled
    #[arg(long, env = "YNAB_CLEARED")]
    ynab_cleared: Option<String>,

    /// File for the json writer (stdout when unset)
    #[arg(long, env = "JSON_PATH")]
    json_path: Option<PathBuf>,
}

impl Overrides {
    pub fn debug(&self) -> bool {
        self.debug
    }

    /// Apply every value that was set; unset ones keep the file's value
    pub fn apply(self, config: &mut Config) -> Result<()> {
        if !self.readers.is_empty() {
            config.readers = trimmed(self.readers);
        }
        if !self.writers.is_empty() {
            config.writers = trimmed(self.writers);
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(interval) = self.interval {
            config.interval_secs = interval;
        }
        if let Some(dir) = self.data_dir {
            config.data_dir = dir;
        }
        config.debug |= self.debug;
        config.detached |= self.detached;

        let nordigen = &mut config.nordigen;
        if let Some(bank_id) = self.nordigen_bank_id {
            nordigen.bank_id = bank_id;
        }
        if let Some(id) = self.nordigen_secret_id {
            nordigen.secret_id = id;
        }
        if let Some(key) = self.nordigen_secret_key {
            nordigen.secret_key = key;
        }
        if let Some(hook) = self.nordigen_requisition_hook {
            nordigen.requisition_hook = Some(hook);
        }
        if let Some(file) = self.nordigen_requisition_file {
            nordigen.requisition_file = Some(file);
        }
        if !self.nordigen_payee_source.is_empty() {
            nordigen.payee_source = self
                .nordigen_payee_source
                .iter()
                .map(|s| s.parse::<PayeeSource>())
                .collect::<Result<_>>()
                .context("Invalid NORDIGEN_PAYEE_SOURCE")?;
        }

        let ynab = &mut config.ynab;
        if let Some(budget_id) = self.ynab_budget_id {
            ynab.budget_id = budget_id;
        }
        if let Some(token) = self.ynab_token {
            ynab.token = token;
        }
        if let Some(map) = self.ynab_account_map {
            ynab.account_map = serde_json::from_str::<HashMap<String, String>>(&map)
                .context("YNAB_ACCOUNTMAP must be a JSON object of strings")?;
        }
        if let Some(from) = self.ynab_from_date {
            ynab.from_date = Some(from);
        }
        if let Some(cleared) = self.ynab_cleared {
            ynab.cleared = cleared
                .parse::<ClearedStatus>()
                .context("Invalid YNAB_CLEARED")?;
        }

        if let Some(path) = self.json_path {
            config.json.path = Some(path);
        }

        Ok(())
    }
}

fn trimmed(names: Vec<String>) -> Vec<String> {
    names
        .into_iter()
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        overrides: Overrides,
    }

    fn parse(args: &[&str]) -> Overrides {
        let mut argv = vec!["ynabber"];
        argv.extend_from_slice(args);
        TestCli::parse_from(argv).overrides
    }

    #[test]
    fn test_unset_values_keep_config() {
        let mut config = Config::default();
        config.ynab.budget_id = "from-file".to_string();

        Overrides::default().apply(&mut config).unwrap();

        assert_eq!(config.readers, vec!["nordigen"]);
        assert_eq!(config.ynab.budget_id, "from-file");
        assert_eq!(config.port, 8080);
    }

    #[test]
    fn test_flags_override_config() {
        let overrides = parse(&[
            "--readers",
            "nordigen",
            "--writers",
            "ynab, json",
            "--port",
            "9000",
            "--interval",
            "21600",
            "--nordigen-payee-source",
            "unstructured,name",
            "--ynab-account-map",
            r#"{"DK50":"ynab-1"}"#,
            "--ynab-from-date",
            "2024-01-31",
            "--ynab-cleared",
            "cleared",
        ]);
        let mut config = Config::default();
        overrides.apply(&mut config).unwrap();

        assert_eq!(config.writers, vec!["ynab", "json"]);
        assert_eq!(config.port, 9000);
        assert_eq!(config.interval_secs, 21600);
        assert_eq!(
            config.nordigen.payee_source,
            vec![PayeeSource::Unstructured, PayeeSource::Name]
        );
        assert_eq!(config.ynab.account_map.get("DK50").map(String::as_str), Some("ynab-1"));
        assert_eq!(config.ynab.from_date, NaiveDate::from_ymd_opt(2024, 1, 31));
        assert_eq!(config.ynab.cleared, ClearedStatus::Cleared);
    }

    #[test]
    fn test_bad_account_map_is_rejected() {
        let overrides = parse(&["--ynab-account-map", "not json"]);
        let err = overrides.apply(&mut Config::default()).unwrap_err();
        assert!(err.to_string().contains("YNAB_ACCOUNTMAP"));
    }

    #[test]
    fn test_boolean_env_accepts_numeric_values() {
        std::env::set_var("YNABBER_DEBUG", "1");
        std::env::set_var("YNABBER_DETACHED", "0");
        let overrides = parse(&[]);
        std::env::remove_var("YNABBER_DEBUG");
        std::env::remove_var("YNABBER_DETACHED");

        assert!(overrides.debug());
        let mut config = Config::default();
        overrides.apply(&mut config).unwrap();
        assert!(config.debug);
        assert!(!config.detached);
    }
}
