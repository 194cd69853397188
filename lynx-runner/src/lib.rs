//! Lynx Runner: backtest orchestration around `lynx-core`.
//!
//! This crate provides:
//! - TOML run configuration
//! - Wide-CSV loading of price and signal tables
//! - Single-backtest runner with run fingerprinting and summary metrics
//! - JSON, CSV and Parquet export
//! - A directory-backed run store
//! - Parallel parameter sweeps

pub mod config;
pub mod data_loader;
pub mod export;
pub mod runner;
pub mod store;
pub mod sweep;

pub use config::{BacktestConfig, ConfigError};
pub use data_loader::{load_table_csv, parse_table_csv, LoadError};
pub use export::{
    equity_frame, export_equity_csv, export_json, export_trades_csv, import_json, trades_frame,
    write_equity_parquet, write_trades_parquet,
};
pub use runner::{run_backtest_from_tables, BacktestResult, RunError, SCHEMA_VERSION};
pub use store::{DirectoryStore, RunStore, StoreError};
pub use sweep::{best_by_total_return, run_sweep, SweepGrid};
