//! Portfolio: aggregate state of cash + all open positions.

use super::position::Position;
use std::collections::HashMap;

/// Aggregate portfolio state.
///
/// The equity identity holds at every date: `equity == cash + holdings_value`.
/// At most one position exists per symbol.
#[derive(Debug, Clone)]
pub struct Portfolio {
    pub cash: f64,
    pub initial_capital: f64,
    pub positions: HashMap<String, Position>,
}

impl Portfolio {
    pub fn new(initial_capital: f64) -> Self {
        Self {
            cash: initial_capital,
            initial_capital,
            positions: HashMap::new(),
        }
    }

    /// Mark-to-market value of all open positions.
    ///
    /// `price_of` returns the current price for a symbol.
    pub fn holdings_value<F>(&self, price_of: F) -> f64
    where
        F: Fn(&str) -> f64,
    {
        self.positions
            .values()
            .map(|pos| pos.current_value(price_of(&pos.symbol)))
            .sum()
    }

    pub fn has_position(&self, symbol: &str) -> bool {
        self.positions.get(symbol).is_some_and(|p| !p.is_flat())
    }

    pub fn get_position(&self, symbol: &str) -> Option<&Position> {
        self.positions.get(symbol).filter(|p| !p.is_flat())
    }

    pub fn get_position_mut(&mut self, symbol: &str) -> Option<&mut Position> {
        self.positions.get_mut(symbol).filter(|p| !p.is_flat())
    }

    /// Insert a new position. Returns `false` (and leaves the portfolio
    /// untouched) if the symbol is already held.
    pub fn open(&mut self, position: Position) -> bool {
        if self.has_position(&position.symbol) {
            return false;
        }
        self.positions.insert(position.symbol.clone(), position);
        true
    }

    /// Drop the position for `symbol` if it has gone flat.
    pub fn remove_if_flat(&mut self, symbol: &str) {
        if self.positions.get(symbol).is_some_and(|p| p.is_flat()) {
            self.positions.remove(symbol);
        }
    }
}
