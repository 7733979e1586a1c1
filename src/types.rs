//! Core domain types: transactions, snapshots, price series and evolution rows.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionType {
    Buy,
    Sell,
    Deposit,
    Withdrawal,
}

impl TransactionType {
    /// BUY / SELL move shares.
    pub fn is_trade(self) -> bool {
        matches!(self, TransactionType::Buy | TransactionType::Sell)
    }

    /// DEPOSIT / WITHDRAWAL move invested capital.
    pub fn is_capital_flow(self) -> bool {
        matches!(self, TransactionType::Deposit | TransactionType::Withdrawal)
    }
}

impl FromStr for TransactionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BUY" => Ok(TransactionType::Buy),
            "SELL" => Ok(TransactionType::Sell),
            "DEPOSIT" => Ok(TransactionType::Deposit),
            "WITHDRAWAL" => Ok(TransactionType::Withdrawal),
            other => Err(format!("unknown transaction type '{}'", other)),
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransactionType::Buy => "BUY",
            TransactionType::Sell => "SELL",
            TransactionType::Deposit => "DEPOSIT",
            TransactionType::Withdrawal => "WITHDRAWAL",
        };
        f.write_str(s)
    }
}

/// One row of the transaction log.
///
/// `amount` is the cash effect of the event for every type (negative when cash
/// leaves the account). `shares` is the signed share delta, only set for trades.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transaction {
    pub date: NaiveDate,
    pub kind: TransactionType,
    pub symbol: Option<String>,
    pub amount: Decimal,
    pub shares: Option<Decimal>,
}

/// Portfolio state as of the last transaction of a date.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PortfolioSnapshot {
    /// Net capital contributed (deposits minus withdrawals).
    pub invested: Decimal,
    /// Free cash, moved by every transaction.
    pub cash: Decimal,
    /// Share count per symbol. Symbols stay present once introduced, even at zero.
    pub holdings: BTreeMap<String, Decimal>,
}

/// Closing prices of one symbol, trading days only.
pub type PriceSeries = BTreeMap<NaiveDate, Decimal>;

/// Price series per symbol.
pub type PriceBook = HashMap<String, PriceSeries>;

/// Benchmark tracked alongside the portfolio.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexSpec {
    pub name: String,
    pub symbol: String,
}

/// One emitted day of the valuation history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvolutionRow {
    pub date: NaiveDate,
    pub invested_money: Decimal,
    pub cash: Decimal,
    pub market_value: Decimal,
    pub portfolio_value: Decimal,
    pub gain: Decimal,
    /// `None` while nothing is invested (the ratio is undefined).
    pub gain_percentage: Option<Decimal>,
    /// Closing price of each configured index that day, in index order.
    pub index_values: Vec<Option<Decimal>>,
}
