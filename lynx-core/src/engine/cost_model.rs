//! Cost model: buy cost and sell proceeds under a fee schedule.
//!
//! Commission (after discount) and slippage are charged on both sides; sell
//! tax only on the way out. Results are never clamped: a schedule whose rates
//! add up to more than 100% yields negative proceeds, which points at a bad
//! configuration rather than a runtime failure.

use crate::fees::FeeSchedule;

/// Multiplier applied to notional when buying.
pub fn buy_multiplier(fees: &FeeSchedule) -> f64 {
    1.0 + fees.effective_commission() + fees.slippage
}

/// Multiplier applied to notional when selling.
pub fn sell_multiplier(fees: &FeeSchedule) -> f64 {
    1.0 - fees.effective_commission() - fees.tax_sell - fees.slippage
}

/// Total cash needed to buy `shares` at `price`.
///
/// `price * shares * (1 + commission_rate * commission_discount + slippage)`
pub fn buy_cost(price: f64, shares: u64, fees: &FeeSchedule) -> f64 {
    price * shares as f64 * buy_multiplier(fees)
}

/// Net cash received for selling `shares` at `price`.
///
/// `price * shares * (1 - commission_rate * commission_discount - tax_sell - slippage)`
pub fn sell_proceeds(price: f64, shares: u64, fees: &FeeSchedule) -> f64 {
    price * shares as f64 * sell_multiplier(fees)
}
