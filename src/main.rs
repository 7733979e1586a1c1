//! Entry point. Wires Workbook -> Snapshots -> Evolution -> Workbook.

mod config;
mod error;
mod evolution;
mod extract;
mod snapshot;
mod types;
mod utils;
mod workbook;

use anyhow::{anyhow, Context};
use chrono::{Local, NaiveDate};
use dotenvy::dotenv;
use serde::Serialize;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

use crate::config::AppConfig;
use crate::extract::{distinct_symbols, first_transaction_date};
use crate::snapshot::build_snapshots;
use crate::types::{IndexSpec, PortfolioSnapshot, PriceBook, PriceSeries};
use crate::utils::date_key;
use crate::workbook::Workbook;

const USAGE: &str = "usage: portfolio-evolution [evolution | provision-prices | provision-index-prices | remove-prices | snapshots]";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Evolution,
    ProvisionPrices,
    ProvisionIndexPrices,
    RemovePrices,
    Snapshots,
}

impl Command {
    fn parse(arg: Option<&str>) -> Option<Self> {
        match arg {
            None | Some("evolution") => Some(Command::Evolution),
            Some("provision-prices") => Some(Command::ProvisionPrices),
            Some("provision-index-prices") => Some(Command::ProvisionIndexPrices),
            Some("remove-prices") => Some(Command::RemovePrices),
            Some("snapshots") => Some(Command::Snapshots),
            Some(_) => None,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .init();

    let args: Vec<String> = std::env::args().collect();
    let Some(cmd) = Command::parse(args.get(1).map(String::as_str)) else {
        anyhow::bail!("{}", USAGE);
    };

    let cfg = AppConfig::discover()?;
    let wb = Arc::new(Workbook::new(&cfg.workbook, cfg.dates.formats.clone()));
    info!("Workbook at {}, command {:?}", cfg.workbook.dir.display(), cmd);

    let res = match cmd {
        Command::Evolution => generate_evolution(&cfg, wb).await,
        Command::ProvisionPrices => provision_symbol_prices(&wb),
        Command::ProvisionIndexPrices => provision_index_prices(&wb),
        Command::RemovePrices => remove_symbol_prices(&wb),
        Command::Snapshots => print_snapshots(&wb),
    };
    if let Err(e) = &res {
        error!("{:?} failed: {:#}", cmd, e);
    }
    res
}

/// Read everything, project from the first transaction to "today", write the table.
async fn generate_evolution(cfg: &AppConfig, wb: Arc<Workbook>) -> anyhow::Result<()> {
    let transactions = wb.read_transactions().context("read transactions")?;
    let Some(first) = first_transaction_date(&transactions) else {
        info!("No transactions, nothing to compute");
        wb.write_evolution_table(&[], &[])?;
        return Ok(());
    };
    let indexes = wb.read_indexes().context("read indexes")?;
    let snapshots = build_snapshots(&transactions)?;

    let symbols = wb.read_symbols().context("read symbols")?;
    let wanted = price_symbols(&symbols, &indexes);
    let prices = load_prices(Arc::clone(&wb), wanted).await?;

    let index_series: Vec<PriceSeries> = indexes
        .iter()
        .map(|i| prices.get(&i.symbol).cloned().unwrap_or_default())
        .collect();
    let last = cfg.evolution.until.unwrap_or_else(today);
    let rows = evolution::project(&snapshots, &prices, &index_series, first, last);

    let path = wb.write_evolution_table(&indexes, &rows)?;
    info!(
        "Evolution {} -> {}: {} rows written to {}",
        date_key(first),
        date_key(last),
        rows.len(),
        path.display()
    );
    Ok(())
}

/// Holding symbols then index symbols, each sheet once.
fn price_symbols(symbols: &[String], indexes: &[IndexSpec]) -> Vec<String> {
    distinct_symbols(symbols.iter().chain(indexes.iter().map(|i| &i.symbol)))
}

/// Price series are independent, so each sheet is read on the blocking pool.
async fn load_prices(wb: Arc<Workbook>, symbols: Vec<String>) -> anyhow::Result<PriceBook> {
    let mut set = JoinSet::new();
    for symbol in symbols {
        let wb = Arc::clone(&wb);
        set.spawn_blocking(move || {
            let series = wb.read_price_series(&symbol);
            (symbol, series)
        });
    }
    let mut book = PriceBook::new();
    while let Some(joined) = set.join_next().await {
        let (symbol, series) = joined.map_err(|e| anyhow!("price loader join error: {}", e))?;
        let series = series.with_context(|| format!("read prices of {}", symbol))?;
        book.insert(symbol, series);
    }
    Ok(book)
}

fn provision_symbol_prices(wb: &Workbook) -> anyhow::Result<()> {
    let from = first_date(wb)?;
    for symbol in wb.read_symbols()? {
        wb.provision_price_sheet(&symbol, from)?;
    }
    Ok(())
}

fn provision_index_prices(wb: &Workbook) -> anyhow::Result<()> {
    let from = first_date(wb)?;
    for index in wb.read_indexes()? {
        wb.provision_price_sheet(&index.symbol, from)?;
    }
    Ok(())
}

fn remove_symbol_prices(wb: &Workbook) -> anyhow::Result<()> {
    for symbol in wb.read_symbols()? {
        wb.remove_price_sheet(&symbol)?;
    }
    Ok(())
}

fn first_date(wb: &Workbook) -> anyhow::Result<NaiveDate> {
    let transactions = wb.read_transactions()?;
    first_transaction_date(&transactions).ok_or_else(|| anyhow!("no transactions in workbook"))
}

#[derive(Serialize)]
struct SnapshotView<'a> {
    date: String,
    #[serde(flatten)]
    snapshot: &'a PortfolioSnapshot,
}

fn print_snapshots(wb: &Workbook) -> anyhow::Result<()> {
    let transactions = wb.read_transactions()?;
    let snapshots = build_snapshots(&transactions)?;
    let view: Vec<SnapshotView> = snapshots
        .iter()
        .map(|(d, s)| SnapshotView {
            date: date_key(*d),
            snapshot: s,
        })
        .collect();
    println!("{}", serde_json::to_string_pretty(&view)?);
    Ok(())
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}
