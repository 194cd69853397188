//! Per-market fee schedules and lot sizes.
//!
//! A symbol's market is identified by its suffix (`2330.TW` → `.TW`).
//! Resolution starts from the built-in schedule for that market and merges
//! caller overrides on top of it field by field. Symbols without a suffix, or
//! with a suffix nobody knows about, fall back to [`DEFAULT_MARKET`].

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Sentinel market key used when a symbol's suffix is absent or unknown.
pub const DEFAULT_MARKET: &str = "_default";

/// Lot size used when neither overrides nor the built-in table name one.
pub const DEFAULT_LOT_SIZE: u64 = 1;

/// Markets with a built-in fee schedule and lot size.
pub const BUILTIN_MARKETS: [&str; 3] = [".TW", ".US", DEFAULT_MARKET];

/// Commission, tax and slippage rates applied to one side of a trade.
///
/// All rates are non-negative fractions of notional.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeeSchedule {
    pub commission_rate: f64,
    /// Multiplier applied to `commission_rate` (0.6 = 40% broker discount).
    pub commission_discount: f64,
    pub tax_buy: f64,
    pub tax_sell: f64,
    pub slippage: f64,
}

impl FeeSchedule {
    /// No commission, no tax, no slippage.
    pub fn zero() -> Self {
        Self {
            commission_rate: 0.0,
            commission_discount: 1.0,
            tax_buy: 0.0,
            tax_sell: 0.0,
            slippage: 0.0,
        }
    }

    /// Commission rate after the broker discount.
    pub fn effective_commission(&self) -> f64 {
        self.commission_rate * self.commission_discount
    }

    /// Built-in schedule for a market key, if there is one.
    pub fn for_market(market: &str) -> Option<Self> {
        match market {
            ".TW" => Some(Self {
                commission_rate: 0.001425,
                commission_discount: 0.6,
                tax_buy: 0.0,
                tax_sell: 0.003,
                slippage: 0.001,
            }),
            ".US" => Some(Self {
                commission_rate: 0.0,
                commission_discount: 1.0,
                tax_buy: 0.0,
                tax_sell: 0.0,
                slippage: 0.001,
            }),
            DEFAULT_MARKET => Some(Self::default_market()),
            _ => None,
        }
    }

    /// Built-in fallback schedule.
    pub fn default_market() -> Self {
        Self {
            commission_rate: 0.001,
            commission_discount: 1.0,
            tax_buy: 0.0,
            tax_sell: 0.0,
            slippage: 0.001,
        }
    }
}

/// Partial fee schedule. Unset fields keep the base value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FeeOverride {
    pub commission_rate: Option<f64>,
    pub commission_discount: Option<f64>,
    pub tax_buy: Option<f64>,
    pub tax_sell: Option<f64>,
    pub slippage: Option<f64>,
}

impl FeeOverride {
    /// Override every field with zero fees. Handy for frictionless tests.
    pub fn zero() -> Self {
        let z = FeeSchedule::zero();
        Self {
            commission_rate: Some(z.commission_rate),
            commission_discount: Some(z.commission_discount),
            tax_buy: Some(z.tax_buy),
            tax_sell: Some(z.tax_sell),
            slippage: Some(z.slippage),
        }
    }

    /// Shallow-merge onto `base`.
    pub fn apply_to(&self, base: FeeSchedule) -> FeeSchedule {
        FeeSchedule {
            commission_rate: self.commission_rate.unwrap_or(base.commission_rate),
            commission_discount: self.commission_discount.unwrap_or(base.commission_discount),
            tax_buy: self.tax_buy.unwrap_or(base.tax_buy),
            tax_sell: self.tax_sell.unwrap_or(base.tax_sell),
            slippage: self.slippage.unwrap_or(base.slippage),
        }
    }

    /// `(field, value)` pairs for every set field.
    pub fn set_fields(&self) -> Vec<(&'static str, f64)> {
        [
            ("commission_rate", self.commission_rate),
            ("commission_discount", self.commission_discount),
            ("tax_buy", self.tax_buy),
            ("tax_sell", self.tax_sell),
            ("slippage", self.slippage),
        ]
        .into_iter()
        .filter_map(|(name, v)| v.map(|v| (name, v)))
        .collect()
    }
}

/// Fee overrides keyed by market suffix (`".TW"`, `"_default"`, ...).
pub type FeeOverrides = HashMap<String, FeeOverride>;

/// Lot-size overrides keyed by market suffix.
pub type LotSizeOverrides = HashMap<String, u64>;

/// Raw suffix of a symbol: everything from the last `.` on, or `None`.
pub fn symbol_suffix(symbol: &str) -> Option<&str> {
    symbol.rfind('.').map(|idx| &symbol[idx..])
}

fn is_builtin(market: &str) -> bool {
    BUILTIN_MARKETS.contains(&market)
}

/// Market key a symbol resolves to.
///
/// The raw suffix is kept when the built-in table or one of the supplied
/// override tables knows it; otherwise the symbol maps to [`DEFAULT_MARKET`].
pub fn market_key<'a>(
    symbol: &'a str,
    fee_overrides: Option<&FeeOverrides>,
    lot_overrides: Option<&LotSizeOverrides>,
) -> &'a str {
    match symbol_suffix(symbol) {
        Some(suffix)
            if is_builtin(suffix)
                || fee_overrides.is_some_and(|o| o.contains_key(suffix))
                || lot_overrides.is_some_and(|o| o.contains_key(suffix)) =>
        {
            suffix
        }
        _ => DEFAULT_MARKET,
    }
}

/// Effective fee schedule for `symbol`.
pub fn resolve_fees(symbol: &str, overrides: Option<&FeeOverrides>) -> FeeSchedule {
    let market = market_key(symbol, overrides, None);
    let base = FeeSchedule::for_market(market).unwrap_or_else(FeeSchedule::default_market);
    match overrides.and_then(|o| o.get(market)) {
        Some(over) => over.apply_to(base),
        None => base,
    }
}

/// Built-in lot size for a market key, if there is one.
pub fn builtin_lot_size(market: &str) -> Option<u64> {
    match market {
        ".TW" => Some(1000),
        ".US" => Some(1),
        DEFAULT_MARKET => Some(DEFAULT_LOT_SIZE),
        _ => None,
    }
}

/// Minimum tradable share increment for `symbol`.
///
/// An override registered for the market wins verbatim.
pub fn resolve_lot_size(symbol: &str, overrides: Option<&LotSizeOverrides>) -> u64 {
    let market = market_key(symbol, None, overrides);
    if let Some(&lot) = overrides.and_then(|o| o.get(market)) {
        return lot;
    }
    builtin_lot_size(market).unwrap_or(DEFAULT_LOT_SIZE)
}

/// Round `shares` down to a whole number of lots.
pub fn round_to_lot(shares: u64, lot_size: u64) -> u64 {
    if lot_size <= 1 {
        return shares;
    }
    (shares / lot_size) * lot_size
}
