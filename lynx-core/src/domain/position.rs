//! Position: one open holding in a single symbol.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// An open long position.
///
/// Shares are whole units. The engine removes a position from its open set
/// the moment `shares` reaches zero, so a live position always has
/// `shares > 0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    pub shares: u64,
    pub entry_price: f64,
    pub entry_date: NaiveDate,
    /// Acquisition cost still attributed to the remaining shares
    /// (`price * shares * cost multiplier` at entry, reduced pro-rata on partial exits).
    pub entry_cost: f64,
}

impl Position {
    pub fn new(
        symbol: String,
        shares: u64,
        entry_price: f64,
        entry_date: NaiveDate,
        entry_cost: f64,
    ) -> Self {
        Self {
            symbol,
            shares,
            entry_price,
            entry_date,
            entry_cost,
        }
    }

    pub fn current_value(&self, price: f64) -> f64 {
        self.shares as f64 * price
    }

    /// Price return since entry, ignoring fees.
    pub fn return_pct(&self, price: f64) -> f64 {
        (price - self.entry_price) / self.entry_price
    }

    /// Reduce the holding by up to `requested` shares.
    ///
    /// The request is clamped to the shares held. Returns the number of shares
    /// actually removed; callers compare it against the request to detect
    /// truncation.
    pub fn reduce(&mut self, requested: u64) -> u64 {
        let actual = requested.min(self.shares);
        self.shares -= actual;
        actual
    }

    /// Detach the share of `entry_cost` attributable to `exited` shares out of
    /// `held_before`, returning it.
    pub fn release_cost(&mut self, exited: u64, held_before: u64) -> f64 {
        if held_before == 0 || exited == 0 {
            return 0.0;
        }
        let released = if exited >= held_before {
            self.entry_cost
        } else {
            self.entry_cost * exited as f64 / held_before as f64
        };
        self.entry_cost -= released;
        released
    }

    pub fn is_flat(&self) -> bool {
        self.shares == 0
    }
}
