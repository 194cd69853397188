//! Price and signal tables, and input validation

pub mod table;
pub mod validate;

pub use table::{AlignedSignals, PriceTable, SignalTable, Table, TableError};
pub use validate::{validate_backtest_inputs, ValidationError};
