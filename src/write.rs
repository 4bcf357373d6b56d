use crate::{
    compute::AggregationResult,
    data::{AccountSummary, Error, StatisticsRow, Transaction, TxType, TypeStatistics},
    read::COLUMNS,
};
use anyhow::Context;
use std::{
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

pub(crate) const ACCOUNT_SUMMARY_HEADER: [&str; 4] =
    ["Account number", "Balance", "Total Deposits", "Total Withdrawals"];
pub(crate) const STATISTICS_HEADER: [&str; 3] =
    ["Transaction type", "Total amount", "Transaction count"];

pub(crate) const DEFAULT_PREFIX: &str = "output_data";

/// CSV writer that has already written `header`. The header goes out even when no
/// row follows, which `csv`'s automatic headers wouldn't do.
fn headed_writer<W: Write>(writer: W, header: &[&str]) -> Result<csv::Writer<W>, Error> {
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    wtr.write_record(header)?;
    Ok(wtr)
}

pub(crate) fn write_account_summaries<'a, W, I>(writer: W, summaries: I) -> Result<(), Error>
where
    W: Write,
    I: IntoIterator<Item = &'a AccountSummary>,
{
    let mut wtr = headed_writer(writer, &ACCOUNT_SUMMARY_HEADER)?;
    for summary in summaries {
        wtr.serialize(summary)?;
    }
    wtr.flush()?;
    Ok(())
}

pub(crate) fn write_suspicious_transactions<W: Write>(
    writer: W,
    transactions: &[Transaction],
) -> Result<(), Error> {
    let mut wtr = headed_writer(writer, &COLUMNS)?;
    for tx in transactions {
        wtr.serialize(tx)?;
    }
    wtr.flush()?;
    Ok(())
}

pub(crate) fn write_transaction_statistics<'a, W, I>(writer: W, statistics: I) -> Result<(), Error>
where
    W: Write,
    I: IntoIterator<Item = (&'a TxType, &'a TypeStatistics)>,
{
    let mut wtr = headed_writer(writer, &STATISTICS_HEADER)?;
    for (txtype, stats) in statistics {
        wtr.serialize(StatisticsRow {
            txtype: *txtype,
            total_amount: stats.total_amount,
            transaction_count: stats.transaction_count,
        })?;
    }
    wtr.flush()?;
    Ok(())
}

/// The three files a run produces, `<dir>/<prefix>_<name>.csv`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct OutputFiles {
    pub account_summaries: PathBuf,
    pub suspicious_transactions: PathBuf,
    pub transaction_statistics: PathBuf,
}

impl OutputFiles {
    pub fn new(dir: &Path, prefix: &str) -> Self {
        let path = |name: &str| dir.join(format!("{prefix}_{name}.csv"));
        Self {
            account_summaries: path("account_summaries"),
            suspicious_transactions: path("suspicious_transactions"),
            transaction_statistics: path("transaction_statistics"),
        }
    }

    /// Writes every file, creating their directory if needed. `summaries` is passed
    /// separately from `result` so that callers can write a filtered subset.
    pub fn write(
        &self,
        summaries: &[&AccountSummary],
        result: &AggregationResult<'_>,
    ) -> Result<(), anyhow::Error> {
        if let Some(dir) = self.account_summaries.parent() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Unable to create output directory {}", dir.display()))?;
        }
        write_account_summaries(create(&self.account_summaries)?, summaries.iter().copied())
            .with_context(|| format!("Unable to write {}", self.account_summaries.display()))?;
        write_suspicious_transactions(
            create(&self.suspicious_transactions)?,
            result.suspicious_transactions,
        )
        .with_context(|| format!("Unable to write {}", self.suspicious_transactions.display()))?;
        write_transaction_statistics(
            create(&self.transaction_statistics)?,
            result.transaction_statistics,
        )
        .with_context(|| format!("Unable to write {}", self.transaction_statistics.display()))?;
        Ok(())
    }
}

fn create(path: &Path) -> Result<BufWriter<File>, anyhow::Error> {
    let file =
        File::create(path).with_context(|| format!("Unable to create {}", path.display()))?;
    Ok(BufWriter::new(file))
}
