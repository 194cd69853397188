//! Backtesting engine: date-by-date simulation over aligned price and signal tables.
//!
//! The engine consumes a price table plus entry and exit signal tables, then
//! runs the five-phase date loop:
//!
//! 1. Queued stop-loss/take-profit exits fill at today's price
//! 2. New stop-loss/take-profit triggers are queued for the next date
//! 3. Exit signals, subject to the same-day conflict mode
//! 4. Entry signals, allocating cash by relative weight in whole lots
//! 5. Mark-to-market equity snapshot

pub mod cost_model;
pub mod loop_runner;
pub mod state;

pub use cost_model::{buy_cost, buy_multiplier, sell_multiplier, sell_proceeds};
pub use loop_runner::run_backtest;
pub use state::{ConflictMode, EngineConfig, EngineError, EngineState, RunResult};
