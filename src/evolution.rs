//! Project dated snapshots over a continuous daily calendar and value them
//! against closing prices.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::snapshot::SnapshotsByDate;
use crate::types::{EvolutionRow, PortfolioSnapshot, PriceBook, PriceSeries};
use crate::utils::date_key;

/// Why a day cannot be valued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unvalued<'a> {
    /// A held symbol has no close that day.
    MissingPrice(&'a str),
    /// A value does not fit in a `Decimal`.
    Overflow,
}

fn price_on(prices: &PriceBook, symbol: &str, day: NaiveDate) -> Option<Decimal> {
    prices.get(symbol).and_then(|series| series.get(&day)).copied()
}

/// Market value of open positions, provided every one of them is priced on `day`.
pub fn holdings_value<'a>(
    snapshot: &'a PortfolioSnapshot,
    prices: &PriceBook,
    day: NaiveDate,
) -> Result<Decimal, Unvalued<'a>> {
    snapshot
        .open_positions()
        .try_fold(Decimal::ZERO, |acc, (symbol, shares)| {
            let close = price_on(prices, symbol, day).ok_or(Unvalued::MissingPrice(symbol))?;
            shares
                .checked_mul(close)
                .and_then(|v| acc.checked_add(v))
                .ok_or(Unvalued::Overflow)
        })
}

fn row_for<'a>(
    snapshot: &'a PortfolioSnapshot,
    prices: &PriceBook,
    indexes: &[PriceSeries],
    day: NaiveDate,
) -> Result<EvolutionRow, Unvalued<'a>> {
    let market_value = holdings_value(snapshot, prices, day)?;
    let portfolio_value = market_value
        .checked_add(snapshot.cash)
        .ok_or(Unvalued::Overflow)?;
    let gain = portfolio_value
        .checked_sub(snapshot.invested)
        .ok_or(Unvalued::Overflow)?;
    Ok(EvolutionRow {
        date: day,
        invested_money: snapshot.invested,
        cash: snapshot.cash,
        market_value,
        portfolio_value,
        gain,
        // zero invested -> undefined
        gain_percentage: gain.checked_div(snapshot.invested),
        index_values: indexes.iter().map(|s| s.get(&day).copied()).collect(),
    })
}

/// Build the row for `day`, or `None` when a held symbol has no price that day
/// or the valuation overflows.
pub fn value_day(
    snapshot: &PortfolioSnapshot,
    prices: &PriceBook,
    indexes: &[PriceSeries],
    day: NaiveDate,
) -> Option<EvolutionRow> {
    match row_for(snapshot, prices, indexes, day) {
        Ok(row) => Some(row),
        Err(Unvalued::MissingPrice(symbol)) => {
            debug!(day = %date_key(day), symbol, "no close for held symbol, day skipped");
            None
        }
        Err(Unvalued::Overflow) => {
            warn!(day = %date_key(day), "valuation out of decimal range, day skipped");
            None
        }
    }
}

/// One row per calendar day in `[first, last]` whose holdings are fully priced.
///
/// The snapshot of the latest transaction date at or before each day is carried
/// forward. Days before any snapshot value an empty portfolio.
pub fn project(
    snapshots: &SnapshotsByDate,
    prices: &PriceBook,
    indexes: &[PriceSeries],
    first: NaiveDate,
    last: NaiveDate,
) -> Vec<EvolutionRow> {
    let empty = PortfolioSnapshot::default();
    let mut carried: Option<&PortfolioSnapshot> = snapshots
        .range(..first)
        .next_back()
        .map(|(_, s)| s);
    let mut rows = Vec::new();
    let mut skipped = 0usize;

    for day in first.iter_days().take_while(|d| *d <= last) {
        if let Some(s) = snapshots.get(&day) {
            carried = Some(s);
        }
        match value_day(carried.unwrap_or(&empty), prices, indexes, day) {
            Some(row) => rows.push(row),
            None => skipped += 1,
        }
    }

    debug!(
        from = %date_key(first),
        to = %date_key(last),
        rows = rows.len(),
        skipped,
        "projected daily evolution"
    );
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::build_snapshots;
    use crate::types::{Transaction, TransactionType};
    use rust_decimal_macros::dec;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn deposit(d: u32, amount: Decimal) -> Transaction {
        Transaction {
            date: day(d),
            kind: TransactionType::Deposit,
            symbol: None,
            amount,
            shares: None,
        }
    }

    fn buy(d: u32, symbol: &str, amount: Decimal, shares: Decimal) -> Transaction {
        Transaction {
            date: day(d),
            kind: TransactionType::Buy,
            symbol: Some(symbol.to_string()),
            amount,
            shares: Some(shares),
        }
    }

    fn series(points: &[(u32, Decimal)]) -> PriceSeries {
        points.iter().map(|(d, p)| (day(*d), *p)).collect()
    }

    fn book(symbol: &str, points: &[(u32, Decimal)]) -> PriceBook {
        let mut b = PriceBook::new();
        b.insert(symbol.to_string(), series(points));
        b
    }

    #[test]
    fn deposit_only_portfolio() {
        let snaps = build_snapshots(&[deposit(1, dec!(1000))]).unwrap();
        let rows = project(&snaps, &PriceBook::new(), &[], day(1), day(1));
        assert_eq!(rows.len(), 1);
        let r = &rows[0];
        assert_eq!(r.invested_money, dec!(1000));
        assert_eq!(r.cash, dec!(1000));
        assert_eq!(r.market_value, dec!(0));
        assert_eq!(r.portfolio_value, dec!(1000));
        assert_eq!(r.gain, dec!(0));
        assert_eq!(r.gain_percentage, Some(dec!(0)));
    }

    #[test]
    fn bought_position_is_valued_at_next_close() {
        let txs = [deposit(1, dec!(1000)), buy(1, "X", dec!(-500), dec!(10))];
        let snaps = build_snapshots(&txs).unwrap();
        let prices = book("X", &[(2, dec!(60))]);
        let rows = project(&snaps, &prices, &[], day(1), day(2));

        // day 1 has no close for X
        assert_eq!(rows.len(), 1);
        let r = &rows[0];
        assert_eq!(r.date, day(2));
        assert_eq!(r.cash, dec!(500));
        assert_eq!(r.market_value, dec!(600));
        assert_eq!(r.portfolio_value, dec!(1100));
        assert_eq!(r.gain, dec!(100));
        assert_eq!(r.gain_percentage, Some(dec!(0.1)));
    }

    #[test]
    fn missing_close_drops_the_day_and_carry_forward_resumes() {
        let txs = [deposit(1, dec!(1000)), buy(1, "X", dec!(-500), dec!(10))];
        let snaps = build_snapshots(&txs).unwrap();
        let prices = book("X", &[(1, dec!(50)), (3, dec!(55))]);
        let rows = project(&snaps, &prices, &[], day(1), day(3));

        let dates: Vec<_> = rows.iter().map(|r| r.date).collect();
        assert_eq!(dates, vec![day(1), day(3)]);
        let r3 = &rows[1];
        assert_eq!(r3.cash, dec!(500));
        assert_eq!(r3.invested_money, dec!(1000));
        assert_eq!(r3.market_value, dec!(550));
    }

    #[test]
    fn one_unpriced_symbol_drops_the_whole_day() {
        let txs = [
            deposit(1, dec!(1000)),
            buy(1, "X", dec!(-100), dec!(1)),
            buy(1, "Y", dec!(-100), dec!(1)),
        ];
        let snaps = build_snapshots(&txs).unwrap();
        let mut prices = book("X", &[(1, dec!(100)), (2, dec!(100))]);
        prices.insert("Y".to_string(), series(&[(1, dec!(100))]));
        let rows = project(&snaps, &prices, &[], day(1), day(2));
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].date, day(1));
    }

    #[test]
    fn symbol_without_any_series_excludes_held_days() {
        let txs = [deposit(1, dec!(100)), buy(2, "Z", dec!(-100), dec!(1))];
        let snaps = build_snapshots(&txs).unwrap();
        let rows = project(&snaps, &PriceBook::new(), &[], day(1), day(5));
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].date, day(1));
    }

    #[test]
    fn closed_position_needs_no_price() {
        let mut sell = buy(2, "X", dec!(120), dec!(-1));
        sell.kind = TransactionType::Sell;
        let txs = [deposit(1, dec!(100)), buy(1, "X", dec!(-100), dec!(1)), sell];
        let snaps = build_snapshots(&txs).unwrap();
        let prices = book("X", &[(1, dec!(100))]);
        let rows = project(&snaps, &prices, &[], day(1), day(4));
        let dates: Vec<_> = rows.iter().map(|r| r.date).collect();
        assert_eq!(dates, vec![day(1), day(2), day(3), day(4)]);
        assert_eq!(rows[3].cash, dec!(120));
        assert_eq!(rows[3].gain, dec!(20));
    }

    #[test]
    fn carried_snapshot_fills_days_without_transactions() {
        let txs = [deposit(1, dec!(100)), deposit(4, dec!(50))];
        let snaps = build_snapshots(&txs).unwrap();
        let rows = project(&snaps, &PriceBook::new(), &[], day(1), day(5));
        let invested: Vec<_> = rows.iter().map(|r| r.invested_money).collect();
        assert_eq!(invested, vec![dec!(100), dec!(100), dec!(100), dec!(150), dec!(150)]);
    }

    #[test]
    fn derived_fields_hold_exactly() {
        let txs = [
            deposit(1, dec!(1000.10)),
            buy(1, "X", dec!(-333.33), dec!(3.3)),
        ];
        let snaps = build_snapshots(&txs).unwrap();
        let prices = book("X", &[(1, dec!(101.01)), (2, dec!(99.97)), (3, dec!(102.5))]);
        for r in project(&snaps, &prices, &[], day(1), day(3)) {
            assert_eq!(r.portfolio_value, r.market_value + r.cash);
            assert_eq!(r.gain, r.portfolio_value - r.invested_money);
        }
    }

    #[test]
    fn gain_percentage_is_undefined_without_capital() {
        let snaps = build_snapshots(&[buy(1, "X", dec!(-10), dec!(1))]).unwrap();
        let prices = book("X", &[(1, dec!(12))]);
        let rows = project(&snaps, &prices, &[], day(1), day(1));
        assert_eq!(rows[0].invested_money, dec!(0));
        assert_eq!(rows[0].gain, dec!(2));
        assert_eq!(rows[0].gain_percentage, None);
    }

    #[test]
    fn days_before_first_snapshot_value_an_empty_portfolio() {
        let snaps = build_snapshots(&[deposit(3, dec!(100))]).unwrap();
        let rows = project(&snaps, &PriceBook::new(), &[], day(1), day(3));
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].cash, dec!(0));
        assert_eq!(rows[0].invested_money, dec!(0));
        assert_eq!(rows[0].gain_percentage, None);
        assert_eq!(rows[2].cash, dec!(100));
    }

    #[test]
    fn window_starting_after_a_transaction_uses_earlier_snapshot() {
        let snaps = build_snapshots(&[deposit(1, dec!(100))]).unwrap();
        let rows = project(&snaps, &PriceBook::new(), &[], day(3), day(3));
        assert_eq!(rows[0].cash, dec!(100));
    }

    #[test]
    fn index_prices_do_not_gate_rows() {
        let snaps = build_snapshots(&[deposit(1, dec!(100))]).unwrap();
        let idx = series(&[(1, dec!(4000)), (3, dec!(4100))]);
        let rows = project(&snaps, &PriceBook::new(), &[idx], day(1), day(3));
        let values: Vec<_> = rows.iter().map(|r| r.index_values[0]).collect();
        assert_eq!(values, vec![Some(dec!(4000)), None, Some(dec!(4100))]);
    }

    #[test]
    fn inverted_window_is_empty() {
        let snaps = build_snapshots(&[deposit(1, dec!(100))]).unwrap();
        assert!(project(&snaps, &PriceBook::new(), &[], day(5), day(1)).is_empty());
    }

    #[test]
    fn holdings_value_sums_open_positions() {
        let txs = [
            buy(1, "X", dec!(-10), dec!(2)),
            buy(1, "Y", dec!(-10), dec!(3)),
        ];
        let snaps = build_snapshots(&txs).unwrap();
        let mut prices = book("X", &[(1, dec!(10))]);
        prices.insert("Y".to_string(), series(&[(1, dec!(1.5))]));
        assert_eq!(holdings_value(&snaps[&day(1)], &prices, day(1)), Ok(dec!(24.5)));
        assert_eq!(
            holdings_value(&snaps[&day(1)], &prices, day(2)),
            Err(Unvalued::MissingPrice("X"))
        );
    }

    #[test]
    fn overflowing_valuation_drops_the_day() {
        let shares = Decimal::from(1_000_000_000_000_000i64);
        let close = Decimal::from(100_000_000_000_000i64);
        let txs = [deposit(1, dec!(100)), buy(1, "X", dec!(-1), shares)];
        let snaps = build_snapshots(&txs).unwrap();
        let prices = book("X", &[(1, close), (2, dec!(1))]);
        assert_eq!(
            holdings_value(&snaps[&day(1)], &prices, day(1)),
            Err(Unvalued::Overflow)
        );
        let rows = project(&snaps, &prices, &[], day(1), day(2));
        let dates: Vec<_> = rows.iter().map(|r| r.date).collect();
        assert_eq!(dates, vec![day(2)]);
        assert_eq!(rows[0].market_value, shares);
    }
}
