//! TOML run configuration.
//!
//! ```toml
//! strategy_name = "momentum"
//! initial_capital = 1000000.0
//! stop_loss = 0.10
//! take_profit = 0.25
//! conflict_mode = "exit_first"
//!
//! [fees.".TW"]
//! commission_discount = 0.28
//!
//! [lot_size]
//! ".TW" = 1000
//! ```
//!
//! Every field except `initial_capital` is optional. Fee override tables only
//! need the fields they change; unknown keys are rejected.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use lynx_core::engine::{ConflictMode, EngineConfig};
use lynx_core::fees::FeeOverride;

/// Errors from loading or validating a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

fn default_strategy_name() -> String {
    "backtest".to_string()
}

/// Serializable configuration for a single backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BacktestConfig {
    /// Prefix of the run id; letters, digits, `_` and `-` only.
    #[serde(default = "default_strategy_name")]
    pub strategy_name: String,
    pub initial_capital: f64,
    #[serde(default)]
    pub stop_loss: Option<f64>,
    #[serde(default)]
    pub take_profit: Option<f64>,
    #[serde(default)]
    pub conflict_mode: ConflictMode,
    /// Fee overrides keyed by market suffix.
    #[serde(default)]
    pub fees: BTreeMap<String, FeeOverride>,
    /// Lot-size overrides keyed by market suffix.
    #[serde(default)]
    pub lot_size: BTreeMap<String, u64>,
}

impl BacktestConfig {
    pub fn new(strategy_name: impl Into<String>, initial_capital: f64) -> Self {
        Self {
            strategy_name: strategy_name.into(),
            initial_capital,
            stop_loss: None,
            take_profit: None,
            conflict_mode: ConflictMode::default(),
            fees: BTreeMap::new(),
            lot_size: BTreeMap::new(),
        }
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Serialize back to TOML.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid(format!("serialize: {e}")))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.strategy_name.is_empty()
            || !self
                .strategy_name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(ConfigError::Invalid(format!(
                "strategy_name '{}' must be non-empty and use only letters, digits, '_' or '-'",
                self.strategy_name
            )));
        }
        self.to_engine_config()
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    pub fn to_engine_config(&self) -> EngineConfig {
        EngineConfig {
            initial_capital: self.initial_capital,
            stop_loss: self.stop_loss,
            take_profit: self.take_profit,
            conflict_mode: self.conflict_mode,
            fee_overrides: self.fees.clone().into_iter().collect(),
            lot_size_overrides: self.lot_size.clone().into_iter().collect(),
        }
    }
}
