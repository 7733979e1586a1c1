//! Directory of CSV sheets standing in for the spreadsheet: transactions,
//! indexes, one price sheet per symbol, and the evolution output.

use chrono::{Datelike, NaiveDate};
use csv::{ReaderBuilder, StringRecord, Trim, WriterBuilder};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::config::WorkbookCfg;
use crate::error::WorkbookError;
use crate::extract::{distinct_symbols, sort_by_date};
use crate::types::{EvolutionRow, IndexSpec, PriceSeries, Transaction, TransactionType};
use crate::utils::{non_empty, parse_date, parse_decimal, sheet_file_stem};

pub const EVOLUTION_HEADER: [&str; 7] = [
    "Date",
    "Invested Money",
    "Cash",
    "Market Value",
    "Portfolio Value",
    "Gain",
    "Gain Percentage",
];

const PRICE_HEADER: [&str; 2] = ["Date", "Close"];

/// Cell written for an undefined gain percentage.
pub const UNDEFINED_RATIO: &str = "NaN";

/// Fetch instructions stored next to a provisioned price sheet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PriceRequest {
    pub symbol: String,
    pub from: NaiveDate,
    pub interval: String,
    pub formula: String,
}

impl PriceRequest {
    pub fn daily(symbol: &str, from: NaiveDate) -> Self {
        let formula = format!(
            "GOOGLEFINANCE(\"{}\", \"price\", DATE({},{},{}), TODAY(), \"DAILY\")",
            symbol,
            from.year(),
            from.month(),
            from.day()
        );
        Self {
            symbol: symbol.to_string(),
            from,
            interval: "DAILY".to_string(),
            formula,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Workbook {
    dir: PathBuf,
    transactions: String,
    indexes: String,
    evolution: String,
    prices_dir: PathBuf,
    date_formats: Vec<String>,
}

impl Workbook {
    pub fn new(cfg: &WorkbookCfg, date_formats: Vec<String>) -> Self {
        Self {
            dir: cfg.dir.clone(),
            transactions: cfg.transactions.clone(),
            indexes: cfg.indexes.clone(),
            evolution: cfg.evolution.clone(),
            prices_dir: cfg.dir.join(&cfg.prices_dir),
            date_formats,
        }
    }

    pub fn sheet_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.csv", name))
    }

    pub fn price_sheet_path(&self, symbol: &str) -> PathBuf {
        self.prices_dir
            .join(format!("{}.csv", sheet_file_stem(symbol)))
    }

    pub fn price_request_path(&self, symbol: &str) -> PathBuf {
        self.prices_dir
            .join(format!("{}.request.yaml", sheet_file_stem(symbol)))
    }

    /// Transaction log, date ascending. Stops at the first blank line or empty date.
    pub fn read_transactions(&self) -> Result<Vec<Transaction>, WorkbookError> {
        let sheet = &self.transactions;
        let mut out = Vec::new();
        for (row, rec) in self.rows(sheet, Extent::UntilBlank)? {
            let Some(date_cell) = non_empty(field(&rec, 0)) else {
                break;
            };
            let date = parse_date(&date_cell, &self.date_formats)
                .ok_or_else(|| bad_cell(sheet, row, "date", &date_cell))?;
            let kind: TransactionType = field(&rec, 1)
                .parse()
                .map_err(|_| bad_cell(sheet, row, "type", field(&rec, 1)))?;
            let amount = parse_decimal(field(&rec, 3))
                .ok_or_else(|| bad_cell(sheet, row, "amount", field(&rec, 3)))?;
            let shares = match non_empty(field(&rec, 4)) {
                Some(s) => Some(parse_decimal(&s).ok_or_else(|| bad_cell(sheet, row, "shares", &s))?),
                None => None,
            };
            out.push(Transaction {
                date,
                kind,
                symbol: non_empty(field(&rec, 2)),
                amount,
                shares,
            });
        }
        sort_by_date(&mut out);
        info!(sheet = %sheet, count = out.len(), "read transactions");
        Ok(out)
    }

    /// Distinct symbols of the whole symbol column, first-seen order.
    pub fn read_symbols(&self) -> Result<Vec<String>, WorkbookError> {
        let rows = self.rows(&self.transactions, Extent::All)?;
        Ok(distinct_symbols(
            rows.iter().map(|(_, rec)| field(rec, 2)),
        ))
    }

    /// Closing prices of `symbol`. A missing sheet gives an empty series.
    pub fn read_price_series(&self, symbol: &str) -> Result<PriceSeries, WorkbookError> {
        let path = self.price_sheet_path(symbol);
        if !path.exists() {
            warn!(symbol, path = %path.display(), "no price sheet, symbol has no prices");
            return Ok(PriceSeries::new());
        }
        let mut series = PriceSeries::new();
        for (row, rec) in read_rows(&path, Extent::UntilBlank)? {
            let Some(date_cell) = non_empty(field(&rec, 0)) else {
                break;
            };
            let date = parse_date(&date_cell, &self.date_formats)
                .ok_or_else(|| bad_cell(symbol, row, "date", &date_cell))?;
            // blank close = no quote that day
            if let Some(close) = non_empty(field(&rec, 1)) {
                let close = parse_decimal(&close).ok_or_else(|| bad_cell(symbol, row, "close", &close))?;
                series.insert(date, close);
            }
        }
        info!(symbol, points = series.len(), "read price series");
        Ok(series)
    }

    /// Configured benchmarks. No sheet means no indexes.
    pub fn read_indexes(&self) -> Result<Vec<IndexSpec>, WorkbookError> {
        if !self.sheet_path(&self.indexes).exists() {
            return Ok(Vec::new());
        }
        let mut out = Vec::new();
        for (row, rec) in self.rows(&self.indexes, Extent::UntilBlank)? {
            let Some(name) = non_empty(field(&rec, 0)) else {
                break;
            };
            let symbol = non_empty(field(&rec, 1))
                .ok_or_else(|| bad_cell(&self.indexes, row, "symbol", ""))?;
            out.push(IndexSpec { name, symbol });
        }
        Ok(out)
    }

    /// Replace the evolution sheet with a header plus one line per row.
    pub fn write_evolution_table(
        &self,
        indexes: &[IndexSpec],
        rows: &[EvolutionRow],
    ) -> Result<PathBuf, WorkbookError> {
        let path = self.sheet_path(&self.evolution);
        ensure_parent(&path)?;
        let mut w = WriterBuilder::new()
            .from_path(&path)
            .map_err(|e| WorkbookError::csv(&path, e))?;

        let header: Vec<&str> = EVOLUTION_HEADER
            .iter()
            .copied()
            .chain(indexes.iter().map(|i| i.name.as_str()))
            .collect();
        w.write_record(&header)
            .map_err(|e| WorkbookError::csv(&path, e))?;

        for r in rows {
            let mut rec = vec![
                r.date.format("%Y-%m-%d").to_string(),
                r.invested_money.to_string(),
                r.cash.to_string(),
                r.market_value.to_string(),
                r.portfolio_value.to_string(),
                r.gain.to_string(),
                r.gain_percentage
                    .map(|p| p.to_string())
                    .unwrap_or_else(|| UNDEFINED_RATIO.to_string()),
            ];
            rec.extend(
                r.index_values
                    .iter()
                    .map(|v| v.map(|p| p.to_string()).unwrap_or_default()),
            );
            w.write_record(&rec)
                .map_err(|e| WorkbookError::csv(&path, e))?;
        }
        w.flush().map_err(|e| WorkbookError::io(&path, e))?;
        info!(sheet = %self.evolution, rows = rows.len(), "wrote evolution table");
        Ok(path)
    }

    /// Create (or clear) the price sheet of `symbol` and record its daily fetch
    /// request starting at `from`.
    pub fn provision_price_sheet(&self, symbol: &str, from: NaiveDate) -> Result<PathBuf, WorkbookError> {
        let path = self.price_sheet_path(symbol);
        ensure_parent(&path)?;
        let mut w = WriterBuilder::new()
            .from_path(&path)
            .map_err(|e| WorkbookError::csv(&path, e))?;
        w.write_record(PRICE_HEADER)
            .map_err(|e| WorkbookError::csv(&path, e))?;
        w.flush().map_err(|e| WorkbookError::io(&path, e))?;

        let req_path = self.price_request_path(symbol);
        let yaml = serde_yaml::to_string(&PriceRequest::daily(symbol, from))?;
        fs::write(&req_path, yaml).map_err(|e| WorkbookError::io(&req_path, e))?;
        info!(symbol, from = %from, path = %path.display(), "provisioned price sheet");
        Ok(path)
    }

    /// Delete the price sheet and request of `symbol`. Returns whether a sheet existed.
    pub fn remove_price_sheet(&self, symbol: &str) -> Result<bool, WorkbookError> {
        let mut removed = false;
        for path in [self.price_sheet_path(symbol), self.price_request_path(symbol)] {
            if path.exists() {
                fs::remove_file(&path).map_err(|e| WorkbookError::io(&path, e))?;
                removed = true;
            }
        }
        if removed {
            info!(symbol, "removed price sheet");
        }
        Ok(removed)
    }

    #[cfg(test)]
    pub fn read_price_request(&self, symbol: &str) -> Result<PriceRequest, WorkbookError> {
        let path = self.price_request_path(symbol);
        let s = fs::read_to_string(&path).map_err(|e| WorkbookError::io(&path, e))?;
        Ok(serde_yaml::from_str(&s)?)
    }

    fn rows(&self, sheet: &str, extent: Extent) -> Result<Vec<(u64, StringRecord)>, WorkbookError> {
        let path = self.sheet_path(sheet);
        if !path.exists() {
            return Err(WorkbookError::MissingSheet {
                name: sheet.to_string(),
                path,
            });
        }
        read_rows(&path, extent)
    }
}

/// How much of a sheet to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Extent {
    /// Data ends at the first blank line.
    UntilBlank,
    /// Every non-blank line, used for whole-column scans.
    All,
}

/// Data rows with their 1-based sheet line (the header is line 1).
fn read_rows(path: &Path, extent: Extent) -> Result<Vec<(u64, StringRecord)>, WorkbookError> {
    let text = fs::read_to_string(path).map_err(|e| WorkbookError::io(path, e))?;
    let text = match extent {
        Extent::UntilBlank => until_blank_line(&text),
        Extent::All => text.as_str(),
    };
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(text.as_bytes());
    let mut out = Vec::new();
    for rec in rdr.records() {
        let rec = rec.map_err(|e| WorkbookError::csv(path, e))?;
        let line = rec.position().map_or(0, |p| p.line());
        out.push((line, rec));
    }
    Ok(out)
}

/// Sheet text up to, not including, the first blank line after the header.
/// The csv reader drops blank lines, so the cut happens before parsing.
fn until_blank_line(text: &str) -> &str {
    let mut end = 0;
    for (i, line) in text.split_inclusive('\n').enumerate() {
        if i > 0 && line.trim().is_empty() {
            return &text[..end];
        }
        end += line.len();
    }
    text
}

fn field(rec: &StringRecord, i: usize) -> &str {
    rec.get(i).unwrap_or("")
}

fn bad_cell(sheet: &str, row: u64, column: &'static str, value: &str) -> WorkbookError {
    WorkbookError::InvalidCell {
        sheet: sheet.to_string(),
        row,
        column,
        value: value.to_string(),
    }
}

fn ensure_parent(path: &Path) -> Result<(), WorkbookError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| WorkbookError::io(parent, e))?;
    }
    Ok(())
}
