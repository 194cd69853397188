//! Wide CSV loading for price and signal tables.
//!
//! Layout: a `date` column (`YYYY-MM-DD`) followed by one column per symbol.
//!
//! ```text
//! date,2330.TW,2317.TW
//! 2024-01-02,580.0,112.0
//! 2024-01-03,585.0,113.5
//! ```
//!
//! Blank cells read as 0.0, which is what a missing signal means. For price
//! tables the engine rejects the resulting zero with a precise error.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use log::debug;
use thiserror::Error;

use lynx_core::data::{Table, TableError};

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("first column must be 'date', found '{0}'")]
    MissingDateColumn(String),

    #[error("row {row}: cannot parse date '{value}'")]
    BadDate { row: usize, value: String },

    #[error("row {row}, column '{column}': cannot parse '{value}' as a number")]
    BadValue {
        row: usize,
        column: String,
        value: String,
    },

    #[error("invalid table: {0}")]
    Table(#[from] TableError),
}

/// Load a wide CSV file into a [`Table`].
pub fn load_table_csv(path: &Path) -> Result<Table, LoadError> {
    let text = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let table = parse_table_csv(&text)?;
    debug!(
        "loaded {}: {} symbols x {} dates",
        path.display(),
        table.symbols().len(),
        table.len()
    );
    Ok(table)
}

/// Parse wide CSV text into a [`Table`].
pub fn parse_table_csv(text: &str) -> Result<Table, LoadError> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers = rdr.headers()?.clone();
    let first = headers.get(0).unwrap_or("");
    if first != "date" {
        return Err(LoadError::MissingDateColumn(first.to_string()));
    }
    let symbols: Vec<String> = headers.iter().skip(1).map(str::to_string).collect();

    let mut dates = Vec::new();
    let mut columns: Vec<Vec<f64>> = vec![Vec::new(); symbols.len()];

    for (i, record) in rdr.records().enumerate() {
        let record = record?;
        // Header is line 1.
        let row = i + 2;
        let raw_date = record.get(0).unwrap_or("");
        let date = NaiveDate::parse_from_str(raw_date, "%Y-%m-%d").map_err(|_| {
            LoadError::BadDate {
                row,
                value: raw_date.to_string(),
            }
        })?;
        dates.push(date);

        for (j, symbol) in symbols.iter().enumerate() {
            let cell = record.get(j + 1).unwrap_or("");
            let value = if cell.is_empty() {
                0.0
            } else {
                cell.parse::<f64>().map_err(|_| LoadError::BadValue {
                    row,
                    column: symbol.clone(),
                    value: cell.to_string(),
                })?
            };
            columns[j].push(value);
        }
    }

    Ok(Table::new(dates, symbols.into_iter().zip(columns).collect())?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_wide_csv() {
        let table = parse_table_csv(
            "date,2330.TW,AAPL.US\n2024-01-02,580,190.5\n2024-01-03,585.5,192\n",
        )
        .unwrap();
        assert_eq!(table.symbols(), &["2330.TW".to_string(), "AAPL.US".to_string()]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.get("2330.TW", 1), Some(585.5));
        assert_eq!(table.get("AAPL.US", 0), Some(190.5));
    }

    #[test]
    fn blank_cells_read_as_zero() {
        let table = parse_table_csv("date,A.US\n2024-01-02,\n2024-01-03,1\n").unwrap();
        assert_eq!(table.column("A.US"), Some(&[0.0, 1.0][..]));
    }

    #[test]
    fn rejects_missing_date_header() {
        let err = parse_table_csv("day,A.US\n2024-01-02,1\n").unwrap_err();
        assert!(matches!(err, LoadError::MissingDateColumn(ref h) if h == "day"));
    }

    #[test]
    fn reports_bad_cells_with_position() {
        let err = parse_table_csv("date,A.US\n2024-01-02,1\n2024-13-01,1\n").unwrap_err();
        assert!(matches!(err, LoadError::BadDate { row: 3, .. }));

        let err = parse_table_csv("date,A.US\n2024-01-02,abc\n").unwrap_err();
        assert!(err.to_string().contains("column 'A.US'"));
    }

    #[test]
    fn unsorted_rows_are_a_table_error() {
        let err = parse_table_csv("date,A.US\n2024-01-03,1\n2024-01-02,1\n").unwrap_err();
        assert!(matches!(err, LoadError::Table(TableError::UnsortedDates { .. })));
    }
}
