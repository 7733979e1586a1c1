//! Small helpers.

use chrono::{Datelike, NaiveDate};
use regex::Regex;
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::OnceLock;

/// Lookup key of a date as stored by the spreadsheet tool: `YYYY-M-D`, no padding.
pub fn date_key(d: NaiveDate) -> String {
    format!("{}-{}-{}", d.year(), d.month(), d.day())
}

/// Parse a date cell against each format in turn. `%m`/`%d` also accept unpadded values.
pub fn parse_date(s: &str, formats: &[String]) -> Option<NaiveDate> {
    let t = s.trim();
    if t.is_empty() {
        return None;
    }
    formats
        .iter()
        .find_map(|f| NaiveDate::parse_from_str(t, f).ok())
}

/// Parse a numeric cell. Plain and scientific notation are accepted.
pub fn parse_decimal(s: &str) -> Option<Decimal> {
    let t = s.trim();
    if t.is_empty() {
        return None;
    }
    Decimal::from_str(t)
        .or_else(|_| Decimal::from_scientific(t))
        .ok()
}

/// Cell value or `None` when blank.
pub fn non_empty(s: &str) -> Option<String> {
    let t = s.trim();
    if t.is_empty() {
        None
    } else {
        Some(t.to_string())
    }
}

/// File name for a symbol's price sheet, e.g. "EPA:CW8" -> "EPA_CW8".
pub fn sheet_file_stem(symbol: &str) -> String {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"[^A-Za-z0-9._-]").expect("constant pattern"));
    re.replace_all(symbol.trim(), "_").into_owned()
}
