//! Backtest runner: wires together configuration, input validation, the
//! engine and run fingerprinting.
//!
//! `run_backtest_from_tables()` takes pre-loaded tables and does no I/O, so
//! sweeps can call it from many threads against the same data.

use chrono::NaiveDate;
use log::info;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use lynx_core::data::{validate_backtest_inputs, PriceTable, SignalTable, ValidationError};
use lynx_core::domain::{EquitySnapshot, TradeRecord};
use lynx_core::engine::{run_backtest, EngineError};
use lynx_core::fingerprint::{dataset_hash, run_id, RunParams};

use crate::config::{BacktestConfig, ConfigError};

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("input validation failed: {0}")]
    Validation(#[from] ValidationError),
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),
}

/// Current schema version for persisted artifacts.
pub const SCHEMA_VERSION: u32 = 1;

/// Complete result of a single backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    /// Schema version for forward-compatible deserialization.
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub run_id: String,
    pub strategy_name: String,
    pub params: RunParams,
    pub dataset_hash: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub initial_capital: f64,
    pub final_equity: f64,
    pub trades: Vec<TradeRecord>,
    pub equity: Vec<EquitySnapshot>,
}

/// Default schema version for serde deserialization of older JSON without the field.
fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

impl BacktestResult {
    /// `final_equity / initial_capital - 1`.
    pub fn total_return(&self) -> f64 {
        self.final_equity / self.initial_capital - 1.0
    }

    /// Fraction of trades with positive PnL; 0 when there are none.
    pub fn win_rate(&self) -> f64 {
        if self.trades.is_empty() {
            return 0.0;
        }
        let wins = self.trades.iter().filter(|t| t.is_winner()).count();
        wins as f64 / self.trades.len() as f64
    }

    /// Largest peak-to-trough equity decline, as a positive fraction.
    pub fn max_drawdown(&self) -> f64 {
        let mut peak = self.initial_capital;
        let mut worst = 0.0_f64;
        for snap in &self.equity {
            peak = peak.max(snap.equity);
            if peak > 0.0 {
                worst = worst.max(1.0 - snap.equity / peak);
            }
        }
        worst
    }
}

/// Validate inputs, run the engine, and fingerprint the run.
///
/// The three tables must share the same symbol set, signals must lie in
/// `[0, 1]` and prices must be positive; otherwise nothing is simulated.
pub fn run_backtest_from_tables(
    config: &BacktestConfig,
    prices: &PriceTable,
    entry: &SignalTable,
    exit: &SignalTable,
) -> Result<BacktestResult, RunError> {
    config.validate()?;
    validate_backtest_inputs(entry, exit, prices)?;

    let engine_config = config.to_engine_config();
    let params = RunParams::from(&engine_config);
    let dataset = dataset_hash(prices);
    let id = run_id(&config.strategy_name, &params.full_hash(), &dataset);

    info!(
        "run {id}: {} symbols x {} dates, stop_loss={:?} take_profit={:?} conflict_mode={}",
        prices.symbols().len(),
        prices.len(),
        config.stop_loss,
        config.take_profit,
        config.conflict_mode
    );

    let run = run_backtest(prices, entry, exit, &engine_config)?;

    // validate_backtest_inputs guarantees at least one date.
    let dates = prices.dates();
    let result = BacktestResult {
        schema_version: SCHEMA_VERSION,
        run_id: id,
        strategy_name: config.strategy_name.clone(),
        params,
        dataset_hash: dataset.0,
        start_date: dates[0],
        end_date: dates[dates.len() - 1],
        initial_capital: config.initial_capital,
        final_equity: run.final_equity,
        trades: run.trades,
        equity: run.equity,
    };

    info!(
        "run {} finished: {} trades, final equity {:.2} ({:+.2}%)",
        result.run_id,
        result.trades.len(),
        result.final_equity,
        result.total_return() * 100.0
    );
    Ok(result)
}
