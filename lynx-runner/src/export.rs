//! Reporting and export: JSON, CSV, and Parquet artifacts.
//!
//! Provides three export formats for backtest results:
//! - **JSON**: full round-trip serialization with schema versioning
//! - **CSV**: trade tape and equity curve for spreadsheets
//! - **Parquet / DataFrame**: columnar outputs through polars
//!
//! Persisted artifacts carry a `schema_version` field. Newer versions than
//! this build understands are rejected on load.

use std::fs::File;
use std::path::Path;

use anyhow::{bail, Context, Result};
use polars::prelude::{Column, DataFrame, ParquetWriter};

use lynx_core::domain::{EquitySnapshot, TradeRecord};

use crate::runner::{BacktestResult, SCHEMA_VERSION};

/// Trade tape columns, in output order.
pub const TRADE_COLUMNS: [&str; 10] = [
    "symbol",
    "entry_date",
    "entry_price",
    "exit_date",
    "exit_price",
    "exit_reason",
    "shares",
    "pnl",
    "return",
    "holding_days",
];

/// Equity curve columns, in output order.
pub const EQUITY_COLUMNS: [&str; 5] = ["date", "cash", "holdings", "equity", "daily_return"];

// ─── JSON export ────────────────────────────────────────────────────

/// Serialize a `BacktestResult` to pretty JSON.
pub fn export_json(result: &BacktestResult) -> Result<String> {
    serde_json::to_string_pretty(result).context("failed to serialize BacktestResult to JSON")
}

/// Deserialize a `BacktestResult` from JSON, rejecting unknown schema versions.
pub fn import_json(json: &str) -> Result<BacktestResult> {
    let result: BacktestResult =
        serde_json::from_str(json).context("failed to deserialize BacktestResult from JSON")?;
    if result.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            result.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(result)
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Export a trade list as CSV, one row per realized exit.
pub fn export_trades_csv(trades: &[TradeRecord]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(TRADE_COLUMNS)?;

    for t in trades {
        wtr.write_record([
            t.symbol.clone(),
            t.entry_date.to_string(),
            format!("{:.6}", t.entry_price),
            t.exit_date.to_string(),
            format!("{:.6}", t.exit_price),
            t.exit_reason.to_string(),
            t.shares.to_string(),
            format!("{:.2}", t.pnl),
            format!("{:.6}", t.return_pct),
            t.holding_days().to_string(),
        ])?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Export an equity curve as CSV, one row per date.
pub fn export_equity_csv(equity: &[EquitySnapshot]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(EQUITY_COLUMNS)?;
    for s in equity {
        wtr.write_record([
            s.date.to_string(),
            format!("{:.2}", s.cash),
            format!("{:.2}", s.holdings),
            format!("{:.2}", s.equity),
            format!("{:.8}", s.daily_return),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── DataFrames ─────────────────────────────────────────────────────

/// Trade tape as a DataFrame. Dates are ISO strings.
pub fn trades_frame(trades: &[TradeRecord]) -> Result<DataFrame> {
    let symbols: Vec<String> = trades.iter().map(|t| t.symbol.clone()).collect();
    let entry_dates: Vec<String> = trades.iter().map(|t| t.entry_date.to_string()).collect();
    let entry_prices: Vec<f64> = trades.iter().map(|t| t.entry_price).collect();
    let exit_dates: Vec<String> = trades.iter().map(|t| t.exit_date.to_string()).collect();
    let exit_prices: Vec<f64> = trades.iter().map(|t| t.exit_price).collect();
    let reasons: Vec<String> = trades
        .iter()
        .map(|t| t.exit_reason.as_str().to_string())
        .collect();
    let shares: Vec<u64> = trades.iter().map(|t| t.shares).collect();
    let pnl: Vec<f64> = trades.iter().map(|t| t.pnl).collect();
    let returns: Vec<f64> = trades.iter().map(|t| t.return_pct).collect();
    let holding: Vec<i64> = trades.iter().map(|t| t.holding_days()).collect();

    DataFrame::new(vec![
        Column::new(TRADE_COLUMNS[0].into(), symbols),
        Column::new(TRADE_COLUMNS[1].into(), entry_dates),
        Column::new(TRADE_COLUMNS[2].into(), entry_prices),
        Column::new(TRADE_COLUMNS[3].into(), exit_dates),
        Column::new(TRADE_COLUMNS[4].into(), exit_prices),
        Column::new(TRADE_COLUMNS[5].into(), reasons),
        Column::new(TRADE_COLUMNS[6].into(), shares),
        Column::new(TRADE_COLUMNS[7].into(), pnl),
        Column::new(TRADE_COLUMNS[8].into(), returns),
        Column::new(TRADE_COLUMNS[9].into(), holding),
    ])
    .context("failed to build trades dataframe")
}

/// Equity curve as a DataFrame. Dates are ISO strings.
pub fn equity_frame(equity: &[EquitySnapshot]) -> Result<DataFrame> {
    let dates: Vec<String> = equity.iter().map(|s| s.date.to_string()).collect();
    let cash: Vec<f64> = equity.iter().map(|s| s.cash).collect();
    let holdings: Vec<f64> = equity.iter().map(|s| s.holdings).collect();
    let values: Vec<f64> = equity.iter().map(|s| s.equity).collect();
    let returns: Vec<f64> = equity.iter().map(|s| s.daily_return).collect();

    DataFrame::new(vec![
        Column::new(EQUITY_COLUMNS[0].into(), dates),
        Column::new(EQUITY_COLUMNS[1].into(), cash),
        Column::new(EQUITY_COLUMNS[2].into(), holdings),
        Column::new(EQUITY_COLUMNS[3].into(), values),
        Column::new(EQUITY_COLUMNS[4].into(), returns),
    ])
    .context("failed to build equity dataframe")
}

// ─── Parquet ────────────────────────────────────────────────────────

fn write_parquet(path: &Path, df: &mut DataFrame, what: &str) -> Result<()> {
    let mut file = File::create(path)
        .with_context(|| format!("failed to create {what} parquet {}", path.display()))?;
    ParquetWriter::new(&mut file)
        .finish(df)
        .with_context(|| format!("failed to write {what} parquet"))?;
    Ok(())
}

pub fn write_equity_parquet(path: &Path, equity: &[EquitySnapshot]) -> Result<()> {
    let mut df = equity_frame(equity)?;
    write_parquet(path, &mut df, "equity")
}

pub fn write_trades_parquet(path: &Path, trades: &[TradeRecord]) -> Result<()> {
    let mut df = trades_frame(trades)?;
    write_parquet(path, &mut df, "trades")
}
