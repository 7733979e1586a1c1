//! Pure helpers over the transaction log: ordering, symbols, first date.

use chrono::NaiveDate;

use crate::types::Transaction;

/// Sort by date only. Stable, so same-day rows keep their sheet order.
pub fn sort_by_date(transactions: &mut [Transaction]) {
    transactions.sort_by_key(|t| t.date);
}

/// Distinct non-blank symbols in first-seen order.
pub fn distinct_symbols<I, S>(symbols: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for s in symbols {
        let s = s.as_ref().trim();
        if !s.is_empty() && !out.iter().any(|seen| seen == s) {
            out.push(s.to_string());
        }
    }
    out
}

pub fn first_transaction_date(transactions: &[Transaction]) -> Option<NaiveDate> {
    transactions.iter().map(|t| t.date).min()
}
