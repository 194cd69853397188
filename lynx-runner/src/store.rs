//! Run persistence keyed by run id.
//!
//! Run ids are content hashes of strategy, parameters and data, so saving the
//! same run twice overwrites identical artifacts.

use std::path::{Path, PathBuf};

use log::{debug, info};
use thiserror::Error;

use crate::export::{export_equity_csv, export_json, export_trades_csv, import_json};
use crate::runner::BacktestResult;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("run '{0}' not found")]
    RunNotFound(String),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Artifact(#[from] anyhow::Error),
}

/// Where backtest results go after a run.
pub trait RunStore: Send + Sync {
    /// Persist a result and return its run id.
    fn save(&self, result: &BacktestResult) -> Result<String, StoreError>;

    fn load(&self, run_id: &str) -> Result<BacktestResult, StoreError>;

    /// Stored run ids, sorted.
    fn list(&self) -> Result<Vec<String>, StoreError>;

    /// Remove a stored run and all of its artifacts.
    fn delete(&self, run_id: &str) -> Result<(), StoreError>;
}

const MANIFEST: &str = "manifest.json";
const TRADES_CSV: &str = "trades.csv";
const EQUITY_CSV: &str = "equity.csv";

/// One directory per run under a root:
///
/// ```text
/// <root>/<run_id>/manifest.json   full BacktestResult
/// <root>/<run_id>/trades.csv      trade tape
/// <root>/<run_id>/equity.csv      equity curve
/// ```
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: PathBuf,
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> StoreError + '_ {
    move |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Run ids are used as directory names; anything else is never stored.
fn is_valid_run_id(run_id: &str) -> bool {
    !run_id.is_empty()
        && run_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

impl DirectoryStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, StoreError> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root).map_err(io_err(&root))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn run_dir(&self, run_id: &str) -> PathBuf {
        self.root.join(run_id)
    }

    pub fn contains(&self, run_id: &str) -> bool {
        is_valid_run_id(run_id) && self.run_dir(run_id).join(MANIFEST).is_file()
    }

    fn write(&self, path: &Path, contents: &str) -> Result<(), StoreError> {
        std::fs::write(path, contents).map_err(io_err(path))
    }
}

impl RunStore for DirectoryStore {
    fn save(&self, result: &BacktestResult) -> Result<String, StoreError> {
        if !is_valid_run_id(&result.run_id) {
            return Err(StoreError::Artifact(anyhow::anyhow!(
                "run id '{}' is not usable as a directory name",
                result.run_id
            )));
        }
        let dir = self.run_dir(&result.run_id);
        std::fs::create_dir_all(&dir).map_err(io_err(&dir))?;

        self.write(&dir.join(MANIFEST), &export_json(result)?)?;
        self.write(&dir.join(TRADES_CSV), &export_trades_csv(&result.trades)?)?;
        self.write(&dir.join(EQUITY_CSV), &export_equity_csv(&result.equity)?)?;

        info!("saved run {} to {}", result.run_id, dir.display());
        Ok(result.run_id.clone())
    }

    fn load(&self, run_id: &str) -> Result<BacktestResult, StoreError> {
        if !self.contains(run_id) {
            return Err(StoreError::RunNotFound(run_id.to_string()));
        }
        let path = self.run_dir(run_id).join(MANIFEST);
        let json = std::fs::read_to_string(&path).map_err(io_err(&path))?;
        debug!("loaded run {run_id} from {}", path.display());
        Ok(import_json(&json)?)
    }

    fn list(&self) -> Result<Vec<String>, StoreError> {
        let mut ids = Vec::new();
        for entry in std::fs::read_dir(&self.root).map_err(io_err(&self.root))? {
            let entry = entry.map_err(io_err(&self.root))?;
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if self.contains(&name) {
                ids.push(name);
            }
        }
        ids.sort();
        Ok(ids)
    }

    fn delete(&self, run_id: &str) -> Result<(), StoreError> {
        if !self.contains(run_id) {
            return Err(StoreError::RunNotFound(run_id.to_string()));
        }
        let dir = self.run_dir(run_id);
        std::fs::remove_dir_all(&dir).map_err(io_err(&dir))?;
        info!("deleted run {run_id}");
        Ok(())
    }
}
