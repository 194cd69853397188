//! Domain types for Lynx

pub mod equity;
pub mod portfolio;
pub mod position;
pub mod trade;

pub use equity::EquitySnapshot;
pub use portfolio::Portfolio;
pub use position::Position;
pub use trade::{ExitReason, TradeRecord};

/// Symbol type alias
pub type Symbol = String;
