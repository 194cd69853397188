//! Integration tests for the runner: TOML config and CSV tables in, a
//! fingerprinted result and its export artifacts out.

use std::path::Path;

use lynx_core::domain::ExitReason;
use lynx_runner::config::BacktestConfig;
use lynx_runner::data_loader::load_table_csv;
use lynx_runner::export::{
    export_equity_csv, export_json, export_trades_csv, import_json, write_equity_parquet,
    write_trades_parquet, EQUITY_COLUMNS,
};
use lynx_runner::runner::{run_backtest_from_tables, BacktestResult, RunError};

const CONFIG: &str = r#"
strategy_name = "stop_demo"
initial_capital = 10000.0
stop_loss = 0.1

[fees.".US"]
commission_rate = 0.0
slippage = 0.0
"#;

const PRICES: &str = "\
date,AAPL.US
2024-01-02,100
2024-01-03,95
2024-01-04,88
2024-01-05,85
";

const ENTRY: &str = "\
date,AAPL.US
2024-01-02,1
2024-01-03,0
2024-01-04,0
2024-01-05,0
";

const EXIT: &str = "\
date,AAPL.US
2024-01-02,0
2024-01-03,0
2024-01-04,0
2024-01-05,0
";

fn write(dir: &Path, name: &str, text: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, text).unwrap();
    path
}

fn run_from_files(dir: &Path, config_text: &str) -> Result<BacktestResult, RunError> {
    let config = BacktestConfig::load(&write(dir, "run.toml", config_text)).unwrap();
    let prices = load_table_csv(&write(dir, "prices.csv", PRICES)).unwrap();
    let entry = load_table_csv(&write(dir, "entry.csv", ENTRY)).unwrap();
    let exit = load_table_csv(&write(dir, "exit.csv", EXIT)).unwrap();
    run_backtest_from_tables(&config, &prices, &entry, &exit)
}

#[test]
fn stop_loss_run_from_files() {
    let dir = tempfile::tempdir().unwrap();
    let result = run_from_files(dir.path(), CONFIG).unwrap();

    // Triggered on the 88 close, executed on the next date at 85.
    assert_eq!(result.trades.len(), 1);
    let trade = &result.trades[0];
    assert_eq!(trade.exit_reason, ExitReason::StopLoss);
    assert_eq!(trade.shares, 100);
    assert_eq!(trade.exit_price, 85.0);
    assert_eq!(trade.exit_date.to_string(), "2024-01-05");
    assert!((trade.pnl + 1_500.0).abs() < 1e-9);

    assert!((result.final_equity - 8_500.0).abs() < 1e-9);
    assert!((result.total_return() + 0.15).abs() < 1e-12);
    assert!((result.max_drawdown() - 0.15).abs() < 1e-12);
    assert_eq!(result.win_rate(), 0.0);
    assert_eq!(result.equity.len(), 4);
}

#[test]
fn run_id_is_stable_and_parameter_sensitive() {
    let dir = tempfile::tempdir().unwrap();
    let a = run_from_files(dir.path(), CONFIG).unwrap();
    let b = run_from_files(dir.path(), CONFIG).unwrap();
    assert_eq!(a.run_id, b.run_id);
    assert_eq!(a, b);

    let looser = CONFIG.replace("stop_loss = 0.1", "stop_loss = 0.2");
    let c = run_from_files(dir.path(), &looser).unwrap();
    assert_ne!(a.run_id, c.run_id);
    assert_eq!(a.dataset_hash, c.dataset_hash);
    assert_eq!(c.trades[0].exit_reason, ExitReason::EndOfData);
}

#[test]
fn json_export_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let result = run_from_files(dir.path(), CONFIG).unwrap();

    let json = export_json(&result).unwrap();
    assert!(json.contains("\"exit_reason\": \"stop_loss\""));
    let back = import_json(&json).unwrap();
    assert_eq!(back, result);
}

#[test]
fn newer_schema_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let mut result = run_from_files(dir.path(), CONFIG).unwrap();
    result.schema_version += 1;
    let json = export_json(&result).unwrap();
    assert!(import_json(&json).is_err());
}

#[test]
fn csv_exports_have_one_row_per_record() {
    let dir = tempfile::tempdir().unwrap();
    let result = run_from_files(dir.path(), CONFIG).unwrap();

    let trades = export_trades_csv(&result.trades).unwrap();
    assert_eq!(trades.lines().count(), 1 + result.trades.len());
    assert!(trades.lines().nth(1).unwrap().contains(",stop_loss,100,"));

    let equity = export_equity_csv(&result.equity).unwrap();
    let mut lines = equity.lines();
    assert_eq!(lines.next().unwrap(), EQUITY_COLUMNS.join(","));
    assert_eq!(lines.next().unwrap(), "2024-01-02,0.00,10000.00,10000.00,0.00000000");
    assert_eq!(lines.count(), 3);
}

#[test]
fn parquet_artifacts_are_written() {
    let dir = tempfile::tempdir().unwrap();
    let result = run_from_files(dir.path(), CONFIG).unwrap();

    let equity_path = dir.path().join("equity.parquet");
    let trades_path = dir.path().join("trades.parquet");
    write_equity_parquet(&equity_path, &result.equity).unwrap();
    write_trades_parquet(&trades_path, &result.trades).unwrap();
    assert!(std::fs::metadata(&equity_path).unwrap().len() > 0);
    assert!(std::fs::metadata(&trades_path).unwrap().len() > 0);
}

#[test]
fn signal_out_of_range_is_rejected_before_running() {
    let dir = tempfile::tempdir().unwrap();
    let config = BacktestConfig::from_toml_str(CONFIG).unwrap();
    let prices = load_table_csv(&write(dir.path(), "prices.csv", PRICES)).unwrap();
    let entry = load_table_csv(&write(
        dir.path(),
        "entry.csv",
        &ENTRY.replace("2024-01-02,1", "2024-01-02,1.5"),
    ))
    .unwrap();
    let exit = load_table_csv(&write(dir.path(), "exit.csv", EXIT)).unwrap();

    let err = run_backtest_from_tables(&config, &prices, &entry, &exit).unwrap_err();
    assert!(matches!(err, RunError::Validation(_)));
}
