use crate::data::{
    AccountNumber, AccountSummary, Error, FilterMode, RiskRules, SummaryField, Transaction,
    TxType::{self, *},
    TypeStatistics,
};
use indexmap::IndexMap;
use rust_decimal::Decimal;
use tracing::debug;

/// This is where the aggregates live: account summaries and statistics buckets are
/// created on the fly the first time a transaction references them, and are kept in
/// first-seen order. The aggregator is an accumulator: every call to `process` adds
/// to what earlier calls left behind, nothing is ever reset or removed.
/// Single-threaded, so no protections for MT.
#[derive(Debug, Clone, Default)]
pub(crate) struct Aggregator {
    rules: RiskRules,
    accounts: IndexMap<AccountNumber, AccountSummary>,
    statistics: IndexMap<TxType, TypeStatistics>,
    suspicious: Vec<Transaction>,
}

/// What a batch changes: only the entries it touched, seeded from the aggregator's
/// current values, plus the records it flagged.
#[derive(Debug, Default)]
struct Batch {
    accounts: IndexMap<AccountNumber, AccountSummary>,
    statistics: IndexMap<TxType, TypeStatistics>,
    suspicious: Vec<Transaction>,
}

/// Read-only view over the three aggregates of an `Aggregator`.
#[derive(Debug, Clone, Copy)]
pub(crate) struct AggregationResult<'a> {
    pub account_summaries: &'a IndexMap<AccountNumber, AccountSummary>,
    pub suspicious_transactions: &'a [Transaction],
    pub transaction_statistics: &'a IndexMap<TxType, TypeStatistics>,
}

impl Aggregator {
    pub fn with_rules(rules: RiskRules) -> Self {
        Self {
            rules,
            ..Self::default()
        }
    }

    /// Applies `records` in order on top of the current state.
    ///
    /// All or nothing: the changes are staged in a `Batch` and merged only once every
    /// record went through, so on error the aggregator is exactly as it was before the
    /// call. Merging keeps the position of known entries and appends new ones.
    pub fn process(&mut self, records: &[Transaction]) -> Result<AggregationResult<'_>, Error> {
        let mut batch = Batch::default();
        for tx in records {
            self.apply(&mut batch, tx)?;
        }
        let touched = batch.accounts.len();
        self.accounts.extend(batch.accounts);
        self.statistics.extend(batch.statistics);
        self.suspicious.extend(batch.suspicious);
        debug!(
            records = records.len(),
            touched,
            accounts = self.accounts.len(),
            suspicious = self.suspicious.len(),
            "Batch aggregated"
        );
        Ok(self.result())
    }

    pub fn result(&self) -> AggregationResult<'_> {
        AggregationResult {
            account_summaries: &self.accounts,
            suspicious_transactions: &self.suspicious,
            transaction_statistics: &self.statistics,
        }
    }

    /// Mean amount of the transactions of this type seen so far, zero if there are none.
    pub fn average_amount(&self, txtype: TxType) -> Decimal {
        match self.statistics.get(&txtype) {
            Some(stats) if stats.transaction_count > 0 => {
                stats.total_amount / Decimal::from(stats.transaction_count)
            }
            _ => Decimal::ZERO,
        }
    }

    pub fn filter_account_summaries(
        &self,
        field: SummaryField,
        threshold: Decimal,
        mode: FilterMode,
    ) -> Vec<&AccountSummary> {
        self.accounts
            .values()
            .filter(|summary| mode.accepts(summary.field(field), threshold))
            .collect()
    }

    /// The three per-record rules; none of them short-circuits the others.
    fn apply(&self, batch: &mut Batch, tx: &Transaction) -> Result<(), Error> {
        if tx.amount < Decimal::ZERO {
            return Err(Error::NegativeAmount { id: tx.id.clone() });
        }
        let overflow = || Error::Overflow { id: tx.id.clone() };

        let account = batch.accounts.entry(tx.account.clone()).or_insert_with(|| {
            self.accounts
                .get(&tx.account)
                .cloned()
                .unwrap_or_else(|| AccountSummary::new(tx.account.clone()))
        });
        match tx.txtype {
            Deposit => {
                account.total_deposits = account
                    .total_deposits
                    .checked_add(tx.amount)
                    .ok_or_else(overflow)?;
            }
            Withdrawal => {
                account.total_withdrawals = account
                    .total_withdrawals
                    .checked_add(tx.amount)
                    .ok_or_else(overflow)?;
            }
            // FIXME: transfers carry no destination account, so they only count
            // in the statistics until a second leg is defined.
            Transfer => {}
        }

        if self.rules.is_suspicious(tx) {
            batch.suspicious.push(tx.clone());
        }

        let stats = batch
            .statistics
            .entry(tx.txtype)
            .or_insert_with(|| self.statistics.get(&tx.txtype).copied().unwrap_or_default());
        stats.total_amount = stats
            .total_amount
            .checked_add(tx.amount)
            .ok_or_else(overflow)?;
        stats.transaction_count += 1;
        Ok(())
    }
}
