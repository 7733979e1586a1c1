//! Fold the transaction log into one portfolio snapshot per transaction date.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use tracing::debug;

use crate::error::EvolutionError;
use crate::types::{PortfolioSnapshot, Transaction};

/// Snapshot effective at the end of each transaction date.
pub type SnapshotsByDate = BTreeMap<NaiveDate, PortfolioSnapshot>;

impl PortfolioSnapshot {
    /// State after applying `tx`. `self` is left untouched.
    pub fn apply(&self, tx: &Transaction) -> Result<PortfolioSnapshot, EvolutionError> {
        let mut next = self.clone();
        if tx.kind.is_trade() {
            let symbol = tx
                .symbol
                .as_deref()
                .ok_or_else(|| invalid(tx, "missing symbol"))?;
            let shares = tx.shares.ok_or_else(|| invalid(tx, "missing shares"))?;
            *next
                .holdings
                .entry(symbol.to_string())
                .or_insert(Decimal::ZERO) += shares;
        }
        if tx.kind.is_capital_flow() {
            next.invested += tx.amount;
        }
        next.cash += tx.amount;
        Ok(next)
    }

    /// Holdings that count towards market value.
    pub fn open_positions(&self) -> impl Iterator<Item = (&str, Decimal)> {
        self.holdings
            .iter()
            .filter(|(_, shares)| !shares.is_zero())
            .map(|(symbol, shares)| (symbol.as_str(), *shares))
    }
}

fn invalid(tx: &Transaction, reason: &str) -> EvolutionError {
    EvolutionError::InvalidInput {
        date: tx.date,
        kind: tx.kind.to_string(),
        reason: reason.to_string(),
    }
}

/// Replay `transactions` (already sorted by date) from an empty portfolio.
/// Same-day transactions collapse into the snapshot after the last of them.
pub fn build_snapshots(transactions: &[Transaction]) -> Result<SnapshotsByDate, EvolutionError> {
    let mut by_date = SnapshotsByDate::new();
    let mut current = PortfolioSnapshot::default();
    for tx in transactions {
        current = current.apply(tx)?;
        by_date.insert(tx.date, current.clone());
    }
    debug!(
        transactions = transactions.len(),
        dates = by_date.len(),
        "built portfolio snapshots"
    );
    Ok(by_date)
}
