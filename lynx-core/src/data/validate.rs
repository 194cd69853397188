//! Input validation run before the engine.
//!
//! The engine itself only refuses non-positive prices. Everything about the
//! shape of the three tables (matching symbol sets, signal ranges) is checked
//! here so callers can reject bad input before any simulation starts.

use super::table::{PriceTable, SignalTable};
use chrono::NaiveDate;
use std::collections::BTreeSet;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("price table cannot be empty")]
    EmptyPrices,

    #[error(
        "all table columns must match: entry_signal {entry:?}, exit_signal {exit:?}, price {price:?}"
    )]
    ColumnMismatch {
        entry: Vec<String>,
        exit: Vec<String>,
        price: Vec<String>,
    },

    #[error("{table} values must be between 0 and 1 (got {value} for '{symbol}' on {date})")]
    SignalOutOfRange {
        table: &'static str,
        symbol: String,
        date: NaiveDate,
        value: f64,
    },

    #[error("price values must be positive (got {value} for '{symbol}' on {date})")]
    NonPositivePrice {
        symbol: String,
        date: NaiveDate,
        value: f64,
    },
}

fn symbol_set(table: &SignalTable) -> BTreeSet<String> {
    table.symbols().iter().cloned().collect()
}

fn check_signal_range(table: &SignalTable, name: &'static str) -> Result<(), ValidationError> {
    for (symbol, column) in table.iter_columns() {
        for (value, date) in column.iter().zip(table.dates()) {
            // NaN fails this comparison and is rejected too.
            if !(0.0..=1.0).contains(value) {
                return Err(ValidationError::SignalOutOfRange {
                    table: name,
                    symbol: symbol.to_string(),
                    date: *date,
                    value: *value,
                });
            }
        }
    }
    Ok(())
}

/// Check that the entry, exit and price tables are usable together.
///
/// - the price table has at least one date and one symbol
/// - the three tables share exactly the same symbol set
/// - signal values are within `[0, 1]`
/// - prices are positive and finite
pub fn validate_backtest_inputs(
    entry: &SignalTable,
    exit: &SignalTable,
    prices: &PriceTable,
) -> Result<(), ValidationError> {
    if prices.is_empty() {
        return Err(ValidationError::EmptyPrices);
    }

    let entry_cols = symbol_set(entry);
    let exit_cols = symbol_set(exit);
    let price_cols = symbol_set(prices);
    if entry_cols != exit_cols || entry_cols != price_cols {
        return Err(ValidationError::ColumnMismatch {
            entry: entry_cols.into_iter().collect(),
            exit: exit_cols.into_iter().collect(),
            price: price_cols.into_iter().collect(),
        });
    }

    check_signal_range(entry, "entry_signal")?;
    check_signal_range(exit, "exit_signal")?;

    for (symbol, column) in prices.iter_columns() {
        for (value, date) in column.iter().zip(prices.dates()) {
            if !(value.is_finite() && *value > 0.0) {
                return Err(ValidationError::NonPositivePrice {
                    symbol: symbol.to_string(),
                    date: *date,
                    value: *value,
                });
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::table::Table;

    fn dates() -> Vec<NaiveDate> {
        (1..=3)
            .map(|d| NaiveDate::from_ymd_opt(2024, 1, d).unwrap())
            .collect()
    }

    fn table(cols: &[(&str, [f64; 3])]) -> Table {
        Table::new(
            dates(),
            cols.iter().map(|(s, v)| (s.to_string(), v.to_vec())).collect(),
        )
        .unwrap()
    }

    fn valid() -> (Table, Table, Table) {
        (
            table(&[("2330.TW", [0.5, 0.0, 0.0]), ("2317.TW", [0.5, 0.0, 0.0])]),
            table(&[("2330.TW", [0.0, 0.0, 1.0]), ("2317.TW", [0.0, 0.0, 1.0])]),
            table(&[("2330.TW", [580.0, 585.0, 590.0]), ("2317.TW", [112.0, 113.0, 114.0])]),
        )
    }

    #[test]
    fn accepts_valid_inputs() {
        let (entry, exit, price) = valid();
        assert_eq!(validate_backtest_inputs(&entry, &exit, &price), Ok(()));
    }

    #[test]
    fn rejects_empty_prices() {
        let (entry, exit, _) = valid();
        let empty = Table::new(vec![], vec![]).unwrap();
        assert_eq!(
            validate_backtest_inputs(&entry, &exit, &empty),
            Err(ValidationError::EmptyPrices)
        );
    }

    #[test]
    fn rejects_mismatched_columns() {
        let (entry, _, price) = valid();
        let exit = table(&[("2330.TW", [0.0, 0.0, 1.0])]);
        let err = validate_backtest_inputs(&entry, &exit, &price).unwrap_err();
        assert!(err.to_string().contains("columns must match"));
    }

    #[test]
    fn rejects_signal_out_of_range() {
        let (_, exit, price) = valid();
        let entry = table(&[("2330.TW", [1.5, 0.0, 0.0]), ("2317.TW", [0.5, 0.0, 0.0])]);
        assert!(matches!(
            validate_backtest_inputs(&entry, &exit, &price),
            Err(ValidationError::SignalOutOfRange { table: "entry_signal", value, .. }) if value == 1.5
        ));

        let (entry, _, price) = valid();
        let exit = table(&[("2330.TW", [0.0, -0.1, 0.0]), ("2317.TW", [0.0, 0.0, 0.0])]);
        assert!(matches!(
            validate_backtest_inputs(&entry, &exit, &price),
            Err(ValidationError::SignalOutOfRange { table: "exit_signal", .. })
        ));
    }

    #[test]
    fn rejects_nan_signal() {
        let (_, exit, price) = valid();
        let entry = table(&[("2330.TW", [f64::NAN, 0.0, 0.0]), ("2317.TW", [0.5, 0.0, 0.0])]);
        assert!(validate_backtest_inputs(&entry, &exit, &price).is_err());
    }

    #[test]
    fn rejects_non_positive_price() {
        let (entry, exit, _) = valid();
        let price = table(&[("2330.TW", [580.0, 0.0, 590.0]), ("2317.TW", [112.0, 113.0, 114.0])]);
        let err = validate_backtest_inputs(&entry, &exit, &price).unwrap_err();
        assert!(matches!(err, ValidationError::NonPositivePrice { ref symbol, .. } if symbol == "2330.TW"));
        assert!(err.to_string().contains("must be positive"));
    }
}
