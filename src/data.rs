use chrono::NaiveDate;
use clap::ValueEnum;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use std::{collections::BTreeSet, fmt, path::PathBuf, str::FromStr};
use thiserror::Error;

pub type AccountNumber = String;
pub type TxId = String;

/// Amounts strictly above this are flagged.
pub const LARGE_TRANSACTION_THRESHOLD: Decimal = dec!(10000);
pub const UNCOMMON_CURRENCIES: [&str; 2] = ["XRP", "LTC"];

const DATE_FORMAT: &str = "%Y-%m-%d";

/// One validated input record. Every column of the input file is required here, so
/// once a `Transaction` exists nobody downstream has to check for missing keys again.
/// It also serializes straight into a row of the suspicious transactions file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct Transaction {
    #[serde(rename = "Transaction ID")]
    pub id: TxId,
    #[serde(rename = "Account number")]
    pub account: AccountNumber,
    #[serde(rename = "Date")]
    pub date: TxDate,
    #[serde(rename = "Transaction type")]
    pub txtype: TxType,
    #[serde(rename = "Amount")]
    pub amount: Decimal,
    #[serde(rename = "Currency")]
    pub currency: String,
    #[serde(rename = "Description")]
    pub description: String,
}

/// When the transaction happened. Dates written `YYYY-MM-DD` are parsed, anything else
/// is kept as written: no rule looks at the date, so an odd format is no reason to
/// drop the record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub(crate) enum TxDate {
    Iso(NaiveDate),
    Raw(String),
}

impl TxDate {
    pub fn parse(text: &str) -> Self {
        match NaiveDate::parse_from_str(text, DATE_FORMAT) {
            Ok(date) => TxDate::Iso(date),
            Err(_) => TxDate::Raw(text.to_string()),
        }
    }
}

/// Different types of transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum TxType {
    Deposit,
    Withdrawal,
    /// Counted in the statistics only: no destination account is known, so a
    /// transfer never moves any balance.
    Transfer,
}

impl TxType {
    pub fn label(&self) -> &'static str {
        match self {
            TxType::Deposit => "deposit",
            TxType::Withdrawal => "withdrawal",
            TxType::Transfer => "transfer",
        }
    }
}

impl fmt::Display for TxType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for TxType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "deposit" => Ok(TxType::Deposit),
            "withdrawal" => Ok(TxType::Withdrawal),
            "transfer" => Ok(TxType::Transfer),
            other => Err(format!("unknown transaction type {other:?}")),
        }
    }
}

/// Running totals for one account. There is no stored `balance`: it is always
/// `total_deposits - total_withdrawals`, computed when asked for (and by
/// `AccountSummarySerializer` when written out), so it can't drift from the totals.
/// The balance may go negative, withdrawals are never checked against funds.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
#[serde(into = "AccountSummarySerializer")]
pub(crate) struct AccountSummary {
    pub account: AccountNumber,
    pub total_deposits: Decimal,
    pub total_withdrawals: Decimal,
}

impl AccountSummary {
    pub fn new(account: AccountNumber) -> Self {
        Self {
            account,
            ..Self::default()
        }
    }

    pub fn balance(&self) -> Decimal {
        self.total_deposits - self.total_withdrawals
    }

    pub fn field(&self, field: SummaryField) -> Decimal {
        match field {
            SummaryField::Balance => self.balance(),
            SummaryField::TotalDeposits => self.total_deposits,
            SummaryField::TotalWithdrawals => self.total_withdrawals,
        }
    }
}

/// Row of the account summaries file, with the "virtual" balance filled in.
#[derive(Serialize)]
pub(crate) struct AccountSummarySerializer {
    #[serde(rename = "Account number")]
    pub account: AccountNumber,
    #[serde(rename = "Balance")]
    pub balance: Decimal,
    #[serde(rename = "Total Deposits")]
    pub total_deposits: Decimal,
    #[serde(rename = "Total Withdrawals")]
    pub total_withdrawals: Decimal,
}

impl From<AccountSummary> for AccountSummarySerializer {
    fn from(summary: AccountSummary) -> Self {
        Self {
            balance: summary.balance(),
            account: summary.account,
            total_deposits: summary.total_deposits,
            total_withdrawals: summary.total_withdrawals,
        }
    }
}

/// Running totals for one transaction type.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TypeStatistics {
    pub total_amount: Decimal,
    pub transaction_count: u64,
}

/// Row of the transaction statistics file.
#[derive(Serialize)]
pub(crate) struct StatisticsRow {
    #[serde(rename = "Transaction type")]
    pub txtype: TxType,
    #[serde(rename = "Total amount")]
    pub total_amount: Decimal,
    #[serde(rename = "Transaction count")]
    pub transaction_count: u64,
}

/// Which account summary column a filter looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum SummaryField {
    Balance,
    TotalDeposits,
    TotalWithdrawals,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum FilterMode {
    /// value >= threshold
    #[value(name = "ge")]
    AtLeast,
    /// value <= threshold
    #[value(name = "le")]
    AtMost,
}

impl FilterMode {
    pub fn accepts(&self, value: Decimal, threshold: Decimal) -> bool {
        match self {
            FilterMode::AtLeast => value >= threshold,
            FilterMode::AtMost => value <= threshold,
        }
    }
}

/// Heuristics deciding whether a transaction ends up in the suspicious list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RiskRules {
    pub large_transaction_threshold: Decimal,
    pub uncommon_currencies: BTreeSet<String>,
}

impl Default for RiskRules {
    fn default() -> Self {
        Self {
            large_transaction_threshold: LARGE_TRANSACTION_THRESHOLD,
            uncommon_currencies: UNCOMMON_CURRENCIES.iter().map(|c| c.to_string()).collect(),
        }
    }
}

impl RiskRules {
    pub fn is_suspicious(&self, tx: &Transaction) -> bool {
        tx.amount > self.large_transaction_threshold
            || self.uncommon_currencies.contains(&tx.currency)
    }
}

/// Errors raised while reading, aggregating or writing transactions. Malformed input
/// records are not errors: the reader drops them before they get this far.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Input file {} does not exist", .0.display())]
    MissingResource(PathBuf),
    #[error("Unsupported file format: {0:?} (expected csv or json)")]
    UnsupportedFormat(String),
    #[error("Transaction {id} has a negative amount")]
    NegativeAmount { id: TxId },
    #[error("Amount overflow while aggregating transaction {id}")]
    Overflow { id: TxId },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Shorthand for building a record in tests; fields that the rules ignore get
    /// fixed values.
    pub(crate) fn tx(
        id: &str,
        account: &str,
        txtype: TxType,
        amount: Decimal,
        currency: &str,
    ) -> Transaction {
        Transaction {
            id: id.to_string(),
            account: account.to_string(),
            date: TxDate::Iso(NaiveDate::from_ymd_opt(2023, 3, 1).unwrap()),
            txtype,
            amount,
            currency: currency.to_string(),
            description: "Salary".to_string(),
        }
    }

    #[test]
    fn balance_is_derived() {
        let summary = AccountSummary {
            account: "1001".to_string(),
            total_deposits: dec!(1000),
            total_withdrawals: dec!(1200.50),
        };
        assert_eq!(summary.balance(), dec!(-200.50));
        assert_eq!(summary.field(SummaryField::Balance), dec!(-200.50));
        assert_eq!(summary.field(SummaryField::TotalDeposits), dec!(1000));
        assert_eq!(summary.field(SummaryField::TotalWithdrawals), dec!(1200.50));
    }

    #[test]
    fn dates_keep_what_they_cannot_parse() {
        assert_eq!(
            TxDate::parse("2023-03-14"),
            TxDate::Iso(NaiveDate::from_ymd_opt(2023, 3, 14).unwrap())
        );
        for text in ["2023/03/01", "14-03-2023", "2023-02-30", ""] {
            assert_eq!(TxDate::parse(text), TxDate::Raw(text.to_string()));
        }
    }

    #[test]
    fn txtype_labels() {
        for txtype in [TxType::Deposit, TxType::Withdrawal, TxType::Transfer] {
            assert_eq!(txtype.label().parse::<TxType>(), Ok(txtype));
            assert_eq!(txtype.to_string(), txtype.label());
        }
        assert!("Deposit".parse::<TxType>().is_err());
        assert!("refund".parse::<TxType>().is_err());
    }

    #[test]
    fn default_rules() {
        let rules = RiskRules::default();
        assert!(!rules.is_suspicious(&tx("1", "1001", TxType::Deposit, dec!(10000), "CAD")));
        assert!(rules.is_suspicious(&tx("2", "1001", TxType::Deposit, dec!(10000.01), "CAD")));
        assert!(rules.is_suspicious(&tx("3", "1001", TxType::Deposit, dec!(1), "XRP")));
        assert!(rules.is_suspicious(&tx("4", "1001", TxType::Transfer, dec!(0), "LTC")));
        // currency codes are matched exactly
        assert!(!rules.is_suspicious(&tx("5", "1001", TxType::Deposit, dec!(1), "xrp")));
    }

    #[test]
    fn filter_modes_are_inclusive() {
        assert!(FilterMode::AtLeast.accepts(dec!(100), dec!(100)));
        assert!(!FilterMode::AtLeast.accepts(dec!(99.99), dec!(100)));
        assert!(FilterMode::AtMost.accepts(dec!(100), dec!(100)));
        assert!(!FilterMode::AtMost.accepts(dec!(100.01), dec!(100)));
    }
}
