use anyhow::Context;
use clap::Parser;
use compute::Aggregator;
use data::{AccountSummary, Error, FilterMode, RiskRules, SummaryField};
use read::read_input_file;
use rust_decimal::Decimal;
use std::{path::PathBuf, process::ExitCode};
use tracing::{error, info};
use write::{OutputFiles, DEFAULT_PREFIX};

mod compute;
mod data;
mod logging;
mod read;
mod write;

#[derive(Parser, Debug)]
#[command(
    name = "fdp",
    version,
    about = "Aggregate financial transactions into account summaries and statistics, and flag suspicious ones"
)]
struct Cli {
    /// Transactions file, .csv or .json
    input: PathBuf,

    /// Directory receiving the three output files
    #[arg(long, default_value = "output")]
    output_dir: PathBuf,

    /// Output file names are `<prefix>_<content>.csv`
    #[arg(long, default_value = DEFAULT_PREFIX)]
    prefix: String,

    /// Directory of the rotating log files
    #[arg(long, default_value = "logs")]
    log_dir: PathBuf,

    /// Amounts strictly above this are suspicious [default: 10000]
    #[arg(long, value_name = "AMOUNT")]
    large_threshold: Option<Decimal>,

    /// Currency flagged as suspicious, repeat for several [default: XRP and LTC]
    #[arg(long = "uncommon-currency", value_name = "CODE")]
    uncommon_currencies: Vec<String>,

    /// Only write the account summaries whose FIELD passes the threshold
    #[arg(long, value_enum, value_name = "FIELD", requires = "threshold", requires = "mode")]
    filter_field: Option<SummaryField>,

    #[arg(long, value_name = "AMOUNT", requires = "filter_field")]
    threshold: Option<Decimal>,

    #[arg(long, value_enum, requires = "filter_field")]
    mode: Option<FilterMode>,
}

impl Cli {
    fn rules(&self) -> RiskRules {
        let mut rules = RiskRules::default();
        if let Some(threshold) = self.large_threshold {
            rules.large_transaction_threshold = threshold;
        }
        if !self.uncommon_currencies.is_empty() {
            rules.uncommon_currencies = self.uncommon_currencies.iter().cloned().collect();
        }
        rules
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let _guard = match logging::init(&cli.log_dir) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Unable to set up logging in {}: {e:#}", cli.log_dir.display());
            return ExitCode::FAILURE;
        }
    };

    info!("Starting financial data processing");
    match run(&cli) {
        Ok(()) => {
            info!("Financial data processing completed successfully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            report(&e);
            ExitCode::FAILURE
        }
    }
}

/// Expected failures get a one-line message, anything else the whole cause chain.
fn report(e: &anyhow::Error) {
    match e.downcast_ref::<Error>() {
        Some(Error::MissingResource(path)) => error!("Input file not found: {}", path.display()),
        Some(err @ Error::UnsupportedFormat(_)) => error!("{err}"),
        _ => error!("An unexpected error occurred: {e:?}"),
    }
}

fn run(cli: &Cli) -> Result<(), anyhow::Error> {
    info!("Reading input data from {}", cli.input.display());
    let transactions = read_input_file(&cli.input)?;
    info!("Successfully read {} transactions", transactions.len());

    let mut aggregator = Aggregator::with_rules(cli.rules());
    aggregator
        .process(&transactions)
        .context("Unable to aggregate transactions")?;
    let result = aggregator.result();
    info!("Processed {} accounts", result.account_summaries.len());
    info!(
        "Found {} suspicious transactions",
        result.suspicious_transactions.len()
    );
    for (txtype, stats) in result.transaction_statistics {
        info!(
            "{txtype}: {} transactions, average amount {}",
            stats.transaction_count,
            aggregator.average_amount(*txtype).round_dp(2)
        );
    }

    let summaries: Vec<&AccountSummary> = match (cli.filter_field, cli.threshold, cli.mode) {
        (Some(field), Some(threshold), Some(mode)) => {
            let filtered = aggregator.filter_account_summaries(field, threshold, mode);
            info!(
                "{} of {} account summaries kept by the filter",
                filtered.len(),
                result.account_summaries.len()
            );
            filtered
        }
        _ => result.account_summaries.values().collect(),
    };

    let files = OutputFiles::new(&cli.output_dir, &cli.prefix);
    files.write(&summaries, &result)?;
    info!("Output files written to {:?}", files);
    Ok(())
}
