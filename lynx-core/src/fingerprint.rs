//! Run fingerprinting: deterministic identification of backtest runs.
//!
//! - `RunParams`: every engine parameter, in canonical (sorted) form.
//! - `ParamsHash`: exact identity of a parameter set.
//! - `DatasetHash`: content hash of a price table.
//! - `run_id`: `"{strategy}_{12 hex}"` derived from all three, so rerunning
//!   the same strategy with the same parameters on the same data reuses the id.

use crate::data::PriceTable;
use crate::engine::{ConflictMode, EngineConfig};
use crate::fees::FeeOverride;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Hex characters of the content hash kept in a run id.
pub const RUN_ID_HASH_LEN: usize = 12;

/// BLAKE3 hash of a canonical parameter encoding.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParamsHash(pub String);

/// BLAKE3 hash of a price table's dates, symbols and values.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DatasetHash(pub String);

impl fmt::Display for ParamsHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for DatasetHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Serializable record of the parameters a run was executed with.
///
/// Uses `BTreeMap` so overrides serialize and hash in a fixed key order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunParams {
    pub initial_capital: f64,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub conflict_mode: ConflictMode,
    #[serde(default)]
    pub fee_overrides: BTreeMap<String, FeeOverride>,
    #[serde(default)]
    pub lot_size_overrides: BTreeMap<String, u64>,
}

impl From<&EngineConfig> for RunParams {
    fn from(config: &EngineConfig) -> Self {
        Self {
            initial_capital: config.initial_capital,
            stop_loss: config.stop_loss,
            take_profit: config.take_profit,
            conflict_mode: config.conflict_mode,
            fee_overrides: config
                .fee_overrides
                .iter()
                .map(|(k, v)| (k.clone(), *v))
                .collect(),
            lot_size_overrides: config
                .lot_size_overrides
                .iter()
                .map(|(k, v)| (k.clone(), *v))
                .collect(),
        }
    }
}

impl RunParams {
    /// Rebuild the engine configuration these parameters describe.
    pub fn to_engine_config(&self) -> EngineConfig {
        EngineConfig {
            initial_capital: self.initial_capital,
            stop_loss: self.stop_loss,
            take_profit: self.take_profit,
            conflict_mode: self.conflict_mode,
            fee_overrides: self.fee_overrides.clone().into_iter().collect(),
            lot_size_overrides: self.lot_size_overrides.clone().into_iter().collect(),
        }
    }

    /// Exact identity of this parameter set.
    ///
    /// Floats are hashed by bit pattern, so `0.1` and `0.1000000001` differ.
    pub fn full_hash(&self) -> ParamsHash {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.initial_capital.to_le_bytes());
        hash_option(&mut hasher, self.stop_loss);
        hash_option(&mut hasher, self.take_profit);
        hasher.update(self.conflict_mode.as_str().as_bytes());

        for (market, over) in &self.fee_overrides {
            hasher.update(b"fee:");
            hasher.update(market.as_bytes());
            for value in [
                over.commission_rate,
                over.commission_discount,
                over.tax_buy,
                over.tax_sell,
                over.slippage,
            ] {
                hash_option(&mut hasher, value);
            }
        }
        for (market, lot) in &self.lot_size_overrides {
            hasher.update(b"lot:");
            hasher.update(market.as_bytes());
            hasher.update(&lot.to_le_bytes());
        }
        ParamsHash(hasher.finalize().to_hex().to_string())
    }
}

fn hash_option(hasher: &mut blake3::Hasher, value: Option<f64>) {
    match value {
        Some(v) => {
            hasher.update(&[1u8]);
            hasher.update(&v.to_le_bytes());
        }
        None => {
            hasher.update(&[0u8]);
        }
    }
}

/// Content hash of a price table.
///
/// Covers dates, symbols (in column order) and the bit pattern of every value.
pub fn dataset_hash(prices: &PriceTable) -> DatasetHash {
    let mut hasher = blake3::Hasher::new();
    for date in prices.dates() {
        hasher.update(date.to_string().as_bytes());
        hasher.update(b"\n");
    }
    for (symbol, column) in prices.iter_columns() {
        hasher.update(symbol.as_bytes());
        hasher.update(b"\0");
        for value in column {
            hasher.update(&value.to_le_bytes());
        }
    }
    DatasetHash(hasher.finalize().to_hex().to_string())
}

/// Deterministic run id: `"{strategy}_{first 12 hex of the combined hash}"`.
pub fn run_id(strategy: &str, params: &ParamsHash, dataset: &DatasetHash) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(strategy.as_bytes());
    hasher.update(b"\0");
    hasher.update(params.0.as_bytes());
    hasher.update(b"\0");
    hasher.update(dataset.0.as_bytes());
    let hex = hasher.finalize().to_hex().to_string();
    format!("{strategy}_{}", &hex[..RUN_ID_HASH_LEN])
}
