use crate::data::{Error, Transaction, TxDate, TxType};
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use std::{fs::File, io::BufReader, path::Path};
use tracing::{debug, info, warn};

/// Columns every input record must carry, in the order they are written back out.
pub(crate) const COLUMNS: [&str; 7] = [
    "Transaction ID",
    "Account number",
    "Date",
    "Transaction type",
    "Amount",
    "Currency",
    "Description",
];

/// Trait for doing something with a validated `Transaction` read from a file
/// (or received from elsewhere). Mostly used to collect the records before handing
/// them to the aggregator, but also for mock tests checking what the readers produce.
pub(crate) trait TransactionUser {
    fn use_tx(&mut self, tx: Transaction);
}

impl TransactionUser for Vec<Transaction> {
    fn use_tx(&mut self, tx: Transaction) {
        self.push(tx);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum InputFormat {
    Csv,
    Json,
}

impl InputFormat {
    /// Picks the reader from the file extension alone, without touching the file.
    pub fn from_path(path: &Path) -> Result<Self, Error> {
        let extension = path
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(|name| name.rsplit_once('.'))
            .map(|(_, extension)| extension)
            .unwrap_or_default();
        match extension {
            "csv" => Ok(InputFormat::Csv),
            "json" => Ok(InputFormat::Json),
            other => Err(Error::UnsupportedFormat(other.to_string())),
        }
    }
}

/// How many records made it through validation.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ReadReport {
    pub accepted: usize,
    pub rejected: usize,
}

/// Why a record was dropped. These never leave this module: a malformed record is
/// logged and skipped, it doesn't fail the run.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
enum Rejection {
    #[error("record is not an object")]
    NotAnObject,
    #[error("missing field {0:?}")]
    MissingField(&'static str),
    #[error("{0} is neither a string nor a number")]
    InvalidField(&'static str),
    #[error("amount {0:?} is not a number")]
    InvalidAmount(String),
    #[error("amount {0} is negative")]
    NegativeAmount(Decimal),
    #[error("{0}")]
    InvalidType(String),
}

/// Reads the whole input file and returns the records that passed validation.
pub(crate) fn read_input_file(path: &Path) -> Result<Vec<Transaction>, Error> {
    let format = InputFormat::from_path(path)?;
    let file = File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => Error::MissingResource(path.to_path_buf()),
        _ => Error::Io(e),
    })?;
    let mut transactions = Vec::new();
    let report = read_transactions(BufReader::new(file), format, &mut transactions)?;
    info!(
        path = %path.display(),
        accepted = report.accepted,
        rejected = report.rejected,
        "Input file read"
    );
    Ok(transactions)
}

/// Parses `reader` as `format` and feeds every well-formed record to `user`, in file
/// order. Malformed records are skipped; only an unreadable file is an error.
pub(crate) fn read_transactions<R: std::io::Read, U: TransactionUser>(
    reader: R,
    format: InputFormat,
    user: &mut U,
) -> Result<ReadReport, Error> {
    let records = match format {
        InputFormat::Csv => csv_records(reader)?,
        InputFormat::Json => json_records(reader)?,
    };
    let mut report = ReadReport::default();
    for (index, record) in records.iter().enumerate() {
        match validate(record) {
            Ok(tx) => {
                user.use_tx(tx);
                report.accepted += 1;
            }
            Err(reason) => {
                debug!(record = index + 1, %reason, "Skipping malformed record");
                report.rejected += 1;
            }
        }
    }
    if report.rejected > 0 {
        warn!(rejected = report.rejected, "Malformed records filtered out");
    }
    Ok(report)
}

/// CSV rows keyed by header. Rows shorter than the header get `null` for the trailing
/// columns: the header names them, so they aren't missing, just empty.
fn csv_records<R: std::io::Read>(reader: R) -> Result<Vec<Value>, Error> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);
    let headers = rdr.headers()?.clone();
    let mut records = Vec::new();
    for result in rdr.records() {
        let row = result?;
        let record: Map<String, Value> = headers
            .iter()
            .enumerate()
            .map(|(i, key)| {
                let field = row
                    .get(i)
                    .map_or(Value::Null, |field| Value::String(field.to_string()));
                (key.to_string(), field)
            })
            .collect();
        records.push(Value::Object(record));
    }
    Ok(records)
}

/// A JSON document holding an array of records.
fn json_records<R: std::io::Read>(reader: R) -> Result<Vec<Value>, Error> {
    Ok(serde_json::from_reader(reader)?)
}

fn validate(record: &Value) -> Result<Transaction, Rejection> {
    let record = record.as_object().ok_or(Rejection::NotAnObject)?;
    let [id, account, date, txtype, amount, currency, description] =
        COLUMNS.map(|key| record.get(key).ok_or(Rejection::MissingField(key)));
    let (id, account, date, txtype, amount, currency, description) =
        (id?, account?, date?, txtype?, amount?, currency?, description?);

    let amount = match amount {
        Value::String(text) => text.clone(),
        Value::Number(number) => number.to_string(),
        _ => return Err(Rejection::InvalidField("Amount")),
    };
    let amount = parse_amount(&amount).ok_or(Rejection::InvalidAmount(amount))?;
    if amount < Decimal::ZERO {
        return Err(Rejection::NegativeAmount(amount));
    }
    let txtype: TxType = text(txtype).parse().map_err(Rejection::InvalidType)?;

    Ok(Transaction {
        id: text(id),
        account: text(account),
        date: TxDate::parse(&text(date)),
        txtype,
        amount,
        currency: text(currency),
        description: text(description),
    })
}

/// Text of a field that no rule computes with. `null` is empty, any other JSON value
/// is kept as its JSON text.
fn text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn parse_amount(text: &str) -> Option<Decimal> {
    let text = text.trim();
    text.parse::<Decimal>()
        .or_else(|_| Decimal::from_scientific(text))
        .ok()
}
