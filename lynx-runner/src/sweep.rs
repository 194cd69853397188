//! Parameter sweeps over stop-loss, take-profit and conflict mode.
//!
//! Every grid point runs against the same shared tables with its own engine
//! state, so points are independent and can run on the rayon pool.

use log::info;
use rayon::prelude::*;

use lynx_core::data::{PriceTable, SignalTable};
use lynx_core::engine::ConflictMode;

use crate::config::BacktestConfig;
use crate::runner::{run_backtest_from_tables, BacktestResult, RunError};

/// Parameter grid specification.
///
/// An empty axis keeps the base config's value for that parameter. `None`
/// entries on the threshold axes mean "disabled".
#[derive(Debug, Clone, Default)]
pub struct SweepGrid {
    pub stop_losses: Vec<Option<f64>>,
    pub take_profits: Vec<Option<f64>>,
    pub conflict_modes: Vec<ConflictMode>,
}

fn axis<T: Copy>(values: &[T], base: T) -> Vec<T> {
    if values.is_empty() {
        vec![base]
    } else {
        values.to_vec()
    }
}

impl SweepGrid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stop_losses(mut self, values: impl IntoIterator<Item = Option<f64>>) -> Self {
        self.stop_losses = values.into_iter().collect();
        self
    }

    pub fn with_take_profits(mut self, values: impl IntoIterator<Item = Option<f64>>) -> Self {
        self.take_profits = values.into_iter().collect();
        self
    }

    pub fn with_conflict_modes(mut self, values: impl IntoIterator<Item = ConflictMode>) -> Self {
        self.conflict_modes = values.into_iter().collect();
        self
    }

    /// Number of configurations the grid expands to.
    pub fn size(&self) -> usize {
        self.stop_losses.len().max(1)
            * self.take_profits.len().max(1)
            * self.conflict_modes.len().max(1)
    }

    /// Expand the grid over `base`.
    ///
    /// Order is stop-loss outermost, then take-profit, then conflict mode.
    pub fn generate_configs(&self, base: &BacktestConfig) -> Vec<BacktestConfig> {
        let mut configs = Vec::with_capacity(self.size());
        for stop_loss in axis(&self.stop_losses, base.stop_loss) {
            for take_profit in axis(&self.take_profits, base.take_profit) {
                for mode in axis(&self.conflict_modes, base.conflict_mode) {
                    let mut config = base.clone();
                    config.stop_loss = stop_loss;
                    config.take_profit = take_profit;
                    config.conflict_mode = mode;
                    configs.push(config);
                }
            }
        }
        configs
    }
}

/// Run every configuration in the grid.
///
/// Results come back in [`SweepGrid::generate_configs`] order whether or not
/// the sweep runs in parallel. The first failing configuration aborts the
/// sweep.
pub fn run_sweep(
    grid: &SweepGrid,
    base: &BacktestConfig,
    prices: &PriceTable,
    entry: &SignalTable,
    exit: &SignalTable,
    parallel: bool,
) -> Result<Vec<BacktestResult>, RunError> {
    let configs = grid.generate_configs(base);
    info!(
        "sweep over {} configurations ({})",
        configs.len(),
        if parallel { "parallel" } else { "sequential" }
    );

    let run = |config: &BacktestConfig| run_backtest_from_tables(config, prices, entry, exit);
    if parallel {
        configs.par_iter().map(run).collect()
    } else {
        configs.iter().map(run).collect()
    }
}

/// The result with the highest total return. Ties keep the earliest.
pub fn best_by_total_return(results: &[BacktestResult]) -> Option<&BacktestResult> {
    results.iter().fold(None, |best, r| match best {
        Some(b) if b.total_return() >= r.total_return() => Some(b),
        _ => Some(r),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_grid_is_the_base_config() {
        let base = BacktestConfig::new("base", 1_000.0);
        let configs = SweepGrid::new().generate_configs(&base);
        assert_eq!(configs, vec![base]);
    }

    #[test]
    fn grid_size_matches_expansion() {
        let grid = SweepGrid::new()
            .with_stop_losses([None, Some(0.05), Some(0.1)])
            .with_conflict_modes([ConflictMode::ExitFirst, ConflictMode::Ignore]);
        let configs = grid.generate_configs(&BacktestConfig::new("g", 1_000.0));
        assert_eq!(grid.size(), 6);
        assert_eq!(configs.len(), 6);
    }

    #[test]
    fn expansion_order_is_stop_loss_major() {
        let mut base = BacktestConfig::new("g", 1_000.0);
        base.take_profit = Some(0.3);
        let grid = SweepGrid::new()
            .with_stop_losses([Some(0.05), Some(0.1)])
            .with_conflict_modes([ConflictMode::EntryFirst, ConflictMode::Ignore]);

        let got: Vec<(Option<f64>, Option<f64>, ConflictMode)> = grid
            .generate_configs(&base)
            .into_iter()
            .map(|c| (c.stop_loss, c.take_profit, c.conflict_mode))
            .collect();
        assert_eq!(
            got,
            vec![
                (Some(0.05), Some(0.3), ConflictMode::EntryFirst),
                (Some(0.05), Some(0.3), ConflictMode::Ignore),
                (Some(0.1), Some(0.3), ConflictMode::EntryFirst),
                (Some(0.1), Some(0.3), ConflictMode::Ignore),
            ]
        );
    }

    #[test]
    fn best_of_nothing_is_none() {
        assert!(best_by_total_return(&[]).is_none());
    }
}
