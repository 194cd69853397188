use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// End-of-date account state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquitySnapshot {
    pub date: NaiveDate,
    pub cash: f64,
    /// Mark-to-market value of open positions at the date's price.
    pub holdings: f64,
    pub equity: f64,
    /// Return relative to the previous snapshot's equity (initial capital for the first date).
    pub daily_return: f64,
}

impl EquitySnapshot {
    pub fn new(date: NaiveDate, cash: f64, holdings: f64, previous_equity: f64) -> Self {
        let equity = cash + holdings;
        let daily_return = if previous_equity != 0.0 {
            equity / previous_equity - 1.0
        } else {
            0.0
        };
        Self {
            date,
            cash,
            holdings,
            equity,
            daily_return,
        }
    }
}
