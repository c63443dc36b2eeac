//! Transaction domain model

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sha2::{Digest, Sha256};

use super::result::{Error, Result};

/// Signed amount in minor currency units (cents for two-decimal currencies).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Amount(i64);

impl Amount {
    /// Largest magnitude accepted from parsed input
    pub const MAX_MINOR: i64 = i64::MAX / 10;

    pub const fn from_minor(minor: i64) -> Self {
        Self(minor)
    }

    pub const fn minor(self) -> i64 {
        self.0
    }

    /// Convert an exact decimal major-unit amount ("-12.34") to minor units.
    ///
    /// Sub-cent digits are rounded half away from zero. Amounts must stay
    /// within [`Amount::MAX_MINOR`] so they also fit in milliunits.
    pub fn from_decimal(value: Decimal) -> Result<Self> {
        let out_of_range = || Error::upstream(format!("amount out of range: {value}"));
        let minor = value
            .checked_mul(Decimal::ONE_HUNDRED)
            .ok_or_else(out_of_range)?
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_i64()
            .filter(|minor| minor.unsigned_abs() <= Self::MAX_MINOR as u64)
            .ok_or_else(out_of_range)?;
        Ok(Self(minor))
    }

    /// YNAB milliunits (1/1000 of the major unit)
    pub fn milliunits(self) -> Result<i64> {
        self.0
            .checked_mul(10)
            .ok_or_else(|| Error::upstream(format!("amount {} does not fit in milliunits", self)))
    }
}

impl FromStr for Amount {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let value = s
            .trim()
            .parse::<Decimal>()
            .map_err(|e| Error::upstream(format!("invalid amount {s:?}: {e}")))?;
        Self::from_decimal(value)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{}{}.{:02}", sign, abs / 100, abs % 100)
    }
}

/// A single booked transaction as read from a source.
///
/// Immutable once built; sources hand ownership to the orchestrator which
/// passes shared references on to each sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Bank-assigned identifier
    pub id: String,
    /// Account reference (IBAN when the bank reports one)
    pub account: String,
    pub payee: String,
    #[serde(default)]
    pub memo: String,
    pub amount: Amount,
    #[serde(default)]
    pub currency: String,
    pub date: NaiveDate,
    /// Untouched upstream payload for downstream mapping
    #[serde(default)]
    pub raw: JsonValue,
}

impl Transaction {
    pub fn new(
        id: impl Into<String>,
        account: impl Into<String>,
        payee: impl Into<String>,
        amount: Amount,
        date: NaiveDate,
    ) -> Self {
        Self {
            id: id.into(),
            account: account.into(),
            payee: payee.into(),
            memo: String::new(),
            amount,
            currency: String::new(),
            date,
            raw: JsonValue::Null,
        }
    }

    /// Stable import identifier used by ledgers to recognise re-deliveries.
    ///
    /// `YBBR:` followed by the first 31 hex chars of a SHA-256 over the fields
    /// that identify the booking; 36 characters total.
    pub fn import_id(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(
            format!(
                "{}|{}|{}|{}",
                self.id,
                self.account,
                self.date.format("%Y-%m-%d"),
                self.amount.minor()
            )
            .as_bytes(),
        );
        let digest = hex::encode(hasher.finalize());
        format!("YBBR:{}", &digest[..31])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_amount_parsing_is_exact() {
        assert_eq!("-12.34".parse::<Amount>().unwrap().minor(), -1234);
        assert_eq!("0.1".parse::<Amount>().unwrap().minor(), 10);
        assert_eq!("1000".parse::<Amount>().unwrap().minor(), 100_000);
        assert_eq!("0.005".parse::<Amount>().unwrap().minor(), 1);
        assert_eq!("-0.005".parse::<Amount>().unwrap().minor(), -1);
        assert!("twelve".parse::<Amount>().is_err());
    }

    #[test]
    fn test_amount_display_and_milliunits() {
        let amount = Amount::from_minor(-4250);
        assert_eq!(amount.to_string(), "-42.50");
        assert_eq!(amount.milliunits().unwrap(), -42_500);
        assert_eq!(Amount::from_minor(7).to_string(), "0.07");
    }

    #[test]
    fn test_huge_amounts_are_rejected_not_overflowed() {
        let limit = Amount::MAX_MINOR;
        let largest = Amount::from_decimal(Decimal::new(limit, 2)).unwrap();
        assert_eq!(largest.minor(), limit);
        assert_eq!(largest.milliunits().unwrap(), limit * 10);

        assert!(Amount::from_decimal(Decimal::new(limit + 1, 2)).is_err());
        assert!(Amount::from_decimal(Decimal::new(-(limit + 1), 2)).is_err());
        assert!(Amount::from_decimal(Decimal::MAX).is_err());
        assert!("92233720368547758.07".parse::<Amount>().is_err());

        assert!(Amount::from_minor(i64::MAX).milliunits().is_err());
        assert!(Amount::from_minor(i64::MIN).milliunits().is_err());
    }

    #[test]
    fn test_import_id_is_stable_and_bounded() {
        let tx = Transaction::new("tx-1", "DK1234", "Coffee", Amount::from_minor(-450), date(2024, 3, 1));
        let again = tx.clone();
        assert_eq!(tx.import_id(), again.import_id());
        assert_eq!(tx.import_id().len(), 36);
        assert!(tx.import_id().starts_with("YBBR:"));
    }

    #[test]
    fn test_import_id_differs_by_amount() {
        let a = Transaction::new("tx-1", "DK1234", "Coffee", Amount::from_minor(-450), date(2024, 3, 1));
        let b = Transaction::new("tx-1", "DK1234", "Coffee", Amount::from_minor(-451), date(2024, 3, 1));
        assert_ne!(a.import_id(), b.import_id());
    }
}
