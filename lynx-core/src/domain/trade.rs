//! TradeRecord: one realized exit event.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a position (or part of it) was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    Signal,
    StopLoss,
    TakeProfit,
    EndOfData,
}

impl ExitReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExitReason::Signal => "signal",
            ExitReason::StopLoss => "stop_loss",
            ExitReason::TakeProfit => "take_profit",
            ExitReason::EndOfData => "end_of_data",
        }
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A realized exit. A position exited in parts produces one record per part.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub symbol: String,

    // ── Entry ──
    pub entry_date: NaiveDate,
    pub entry_price: f64,

    // ── Exit ──
    pub exit_date: NaiveDate,
    pub exit_price: f64,
    pub exit_reason: ExitReason,

    // ── Size ──
    pub shares: u64,

    // ── PnL ──
    /// Net sale proceeds minus the pro-rata entry cost of the exited shares.
    pub pnl: f64,
    /// `pnl` as a fraction of the pro-rata entry cost.
    #[serde(rename = "return")]
    pub return_pct: f64,
}

impl TradeRecord {
    pub fn holding_days(&self) -> i64 {
        (self.exit_date - self.entry_date).num_days()
    }

    pub fn is_winner(&self) -> bool {
        self.pnl > 0.0
    }
}
