//! Engine configuration, mutable state, and run result types.

use crate::domain::{EquitySnapshot, ExitReason, Portfolio, TradeRecord};
use crate::fees::{FeeOverrides, LotSizeOverrides};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum EngineError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid price {price} for '{symbol}' on {date}: prices must be positive")]
    InvalidPrice {
        symbol: String,
        date: NaiveDate,
        price: f64,
    },

    #[error("price table has no dates or no symbols")]
    EmptyPriceTable,
}

/// What to do when a held symbol has both an entry and an exit signal on the
/// same date.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictMode {
    /// Exit first; the entry step may then reopen the symbol.
    #[default]
    ExitFirst,
    /// Skip the exit.
    EntryFirst,
    /// Skip both the exit and the entry for that symbol and date.
    Ignore,
}

impl ConflictMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictMode::ExitFirst => "exit_first",
            ConflictMode::EntryFirst => "entry_first",
            ConflictMode::Ignore => "ignore",
        }
    }
}

impl fmt::Display for ConflictMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConflictMode {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "exit_first" => Ok(ConflictMode::ExitFirst),
            "entry_first" => Ok(ConflictMode::EntryFirst),
            "ignore" => Ok(ConflictMode::Ignore),
            other => Err(EngineError::InvalidConfig(format!(
                "unknown conflict_mode '{other}' (expected exit_first, entry_first or ignore)"
            ))),
        }
    }
}

/// Configuration for a single backtest run.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub initial_capital: f64,
    /// Exit when the price return since entry falls to `-stop_loss` or below.
    pub stop_loss: Option<f64>,
    /// Exit when the price return since entry reaches `take_profit`.
    pub take_profit: Option<f64>,
    pub conflict_mode: ConflictMode,
    pub fee_overrides: FeeOverrides,
    pub lot_size_overrides: LotSizeOverrides,
}

impl EngineConfig {
    pub fn new(initial_capital: f64) -> Self {
        Self {
            initial_capital,
            stop_loss: None,
            take_profit: None,
            conflict_mode: ConflictMode::default(),
            fee_overrides: FeeOverrides::new(),
            lot_size_overrides: LotSizeOverrides::new(),
        }
    }

    pub fn with_stop_loss(mut self, stop_loss: f64) -> Self {
        self.stop_loss = Some(stop_loss);
        self
    }

    pub fn with_take_profit(mut self, take_profit: f64) -> Self {
        self.take_profit = Some(take_profit);
        self
    }

    pub fn with_conflict_mode(mut self, mode: ConflictMode) -> Self {
        self.conflict_mode = mode;
        self
    }

    pub fn with_fee_overrides(mut self, overrides: FeeOverrides) -> Self {
        self.fee_overrides = overrides;
        self
    }

    pub fn with_lot_size_overrides(mut self, overrides: LotSizeOverrides) -> Self {
        self.lot_size_overrides = overrides;
        self
    }

    /// Reject configurations that cannot be simulated.
    pub fn validate(&self) -> Result<(), EngineError> {
        if !(self.initial_capital.is_finite() && self.initial_capital > 0.0) {
            return Err(EngineError::InvalidConfig(format!(
                "initial_capital must be positive, got {}",
                self.initial_capital
            )));
        }
        for (name, value) in [("stop_loss", self.stop_loss), ("take_profit", self.take_profit)] {
            if let Some(v) = value {
                if !(v.is_finite() && v > 0.0) {
                    return Err(EngineError::InvalidConfig(format!(
                        "{name} must be positive when set, got {v}"
                    )));
                }
            }
        }
        for (market, over) in &self.fee_overrides {
            for (field, v) in over.set_fields() {
                if !(v.is_finite() && v >= 0.0) {
                    return Err(EngineError::InvalidConfig(format!(
                        "fee override {market}.{field} must be a non-negative fraction, got {v}"
                    )));
                }
            }
        }
        for (market, &lot) in &self.lot_size_overrides {
            if lot == 0 {
                return Err(EngineError::InvalidConfig(format!(
                    "lot size override for {market} must be at least 1"
                )));
            }
        }
        Ok(())
    }
}

/// Mutable state that evolves date-by-date during the engine loop.
///
/// Owned exclusively by one run; nothing here is shared across runs.
#[derive(Debug)]
pub struct EngineState {
    pub portfolio: Portfolio,
    /// Stop-loss/take-profit exits detected on the previous date, executed at
    /// the next date's price.
    pub pending_exits: HashMap<String, ExitReason>,
    pub trades: Vec<TradeRecord>,
    pub equity: Vec<EquitySnapshot>,
}

impl EngineState {
    pub fn new(initial_capital: f64) -> Self {
        Self {
            portfolio: Portfolio::new(initial_capital),
            pending_exits: HashMap::new(),
            trades: Vec::new(),
            equity: Vec::new(),
        }
    }

    /// Equity of the last snapshot, or initial capital before the first one.
    pub fn previous_equity(&self) -> f64 {
        self.equity
            .last()
            .map_or(self.portfolio.initial_capital, |s| s.equity)
    }
}

/// Result of a complete backtest run.
#[derive(Debug, Clone)]
pub struct RunResult {
    /// Realized exits in the order they happened.
    pub trades: Vec<TradeRecord>,
    /// One snapshot per price-table date, ascending.
    pub equity: Vec<EquitySnapshot>,
    /// Cash after the end-of-data liquidation.
    pub final_equity: f64,
    pub date_count: usize,
}
