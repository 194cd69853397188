//! Date × symbol tables consumed by the engine.
//!
//! The price table defines the simulation's date axis. Signal tables are
//! reindexed onto it: dates or symbols a signal table does not carry read as
//! 0.0, and signal columns the price table lacks are dropped.

use chrono::NaiveDate;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum TableError {
    #[error("column '{symbol}' has {actual} values but the table has {expected} dates")]
    LengthMismatch {
        symbol: String,
        expected: usize,
        actual: usize,
    },

    #[error("dates must be strictly ascending ({previous} followed by {next})")]
    UnsortedDates { previous: NaiveDate, next: NaiveDate },

    #[error("duplicate column '{0}'")]
    DuplicateSymbol(String),
}

/// Dense dates × symbols matrix of `f64`, stored column-wise.
///
/// Column order is preserved; it is the order in which the engine visits
/// symbols within a date.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    dates: Vec<NaiveDate>,
    symbols: Vec<String>,
    columns: HashMap<String, Vec<f64>>,
}

impl Table {
    pub fn new(
        dates: Vec<NaiveDate>,
        columns: Vec<(String, Vec<f64>)>,
    ) -> Result<Self, TableError> {
        for pair in dates.windows(2) {
            if pair[1] <= pair[0] {
                return Err(TableError::UnsortedDates {
                    previous: pair[0],
                    next: pair[1],
                });
            }
        }

        let mut symbols = Vec::with_capacity(columns.len());
        let mut map = HashMap::with_capacity(columns.len());
        for (symbol, values) in columns {
            if values.len() != dates.len() {
                return Err(TableError::LengthMismatch {
                    symbol,
                    expected: dates.len(),
                    actual: values.len(),
                });
            }
            if map.contains_key(&symbol) {
                return Err(TableError::DuplicateSymbol(symbol));
            }
            symbols.push(symbol.clone());
            map.insert(symbol, values);
        }

        Ok(Self {
            dates,
            symbols,
            columns: map,
        })
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty() || self.symbols.is_empty()
    }

    pub fn column(&self, symbol: &str) -> Option<&[f64]> {
        self.columns.get(symbol).map(|c| c.as_slice())
    }

    /// Value at (`symbol`, date index). `None` if the symbol is unknown or the
    /// index is out of range.
    pub fn get(&self, symbol: &str, index: usize) -> Option<f64> {
        self.columns.get(symbol).and_then(|c| c.get(index)).copied()
    }

    /// Iterate `(symbol, column)` in column order.
    pub fn iter_columns(&self) -> impl Iterator<Item = (&str, &[f64])> {
        self.symbols
            .iter()
            .map(move |s| (s.as_str(), self.columns[s].as_slice()))
    }

    /// Reindex this signal table onto `prices`. See [`AlignedSignals::align`].
    pub fn align_to(&self, prices: &PriceTable) -> AlignedSignals {
        AlignedSignals::align(self, prices)
    }
}

/// Closing prices. Every value must be positive and finite for a run to start.
pub type PriceTable = Table;

/// Entry or exit signal strength in `[0, 1]`.
pub type SignalTable = Table;

/// A signal table reindexed onto a price table's dates and symbols.
#[derive(Debug, Clone)]
pub struct AlignedSignals {
    symbols: Vec<String>,
    columns: HashMap<String, Vec<f64>>,
    len: usize,
}

impl AlignedSignals {
    /// Reindex `signals` onto `prices`.
    pub fn align(signals: &SignalTable, prices: &PriceTable) -> Self {
        let index_of: HashMap<NaiveDate, usize> = signals
            .dates()
            .iter()
            .enumerate()
            .map(|(i, d)| (*d, i))
            .collect();

        let columns = prices
            .symbols()
            .iter()
            .map(|symbol| {
                let values = match signals.column(symbol) {
                    Some(col) => prices
                        .dates()
                        .iter()
                        .map(|d| index_of.get(d).map_or(0.0, |&i| col[i]))
                        .collect(),
                    None => vec![0.0; prices.len()],
                };
                (symbol.clone(), values)
            })
            .collect();

        Self {
            symbols: prices.symbols().to_vec(),
            columns,
            len: prices.len(),
        }
    }

    /// Signal for `symbol` at date index `index`; 0.0 when absent.
    pub fn value(&self, symbol: &str, index: usize) -> f64 {
        self.columns
            .get(symbol)
            .and_then(|c| c.get(index))
            .copied()
            .unwrap_or(0.0)
    }

    /// Sum of positive signal values across all symbols at `index`.
    pub fn row_sum(&self, index: usize) -> f64 {
        self.symbols
            .iter()
            .map(|s| self.value(s, index))
            .filter(|v| *v > 0.0)
            .sum()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}
