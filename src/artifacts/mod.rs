pub mod logger;
pub mod plot;

use std::{
    fs::{self, File},
    io::BufWriter,
    path::{Path, PathBuf},
    time::{SystemTime, UNIX_EPOCH},
};

use crate::{Result, TrainErr, training::History};

const LOG_FILE: &str = "train.log";
const PLOT_FILE: &str = "perf.svg";
const HISTORY_FILE: &str = "history.json";
const WEIGHTS_DIR: &str = "weights";

/// The directory every artifact of a run is written to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunDir {
    root: PathBuf,
}

impl RunDir {
    /// Creates `<experiments>/<unix seconds>/`.
    pub fn create(experiments: &Path) -> Result<Self> {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| TrainErr::InvalidConfig(format!("system clock before 1970: {e}")))?
            .as_secs();

        Self::at(experiments.join(secs.to_string()))
    }

    /// Uses `root` as the run directory, creating it if missing.
    pub fn at(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn log_path(&self) -> PathBuf {
        self.root.join(LOG_FILE)
    }

    pub fn plot_path(&self) -> PathBuf {
        self.root.join(PLOT_FILE)
    }

    pub fn history_path(&self) -> PathBuf {
        self.root.join(HISTORY_FILE)
    }

    /// Returns where the final parameters of a run on `dataset` are saved.
    pub fn weights_path(&self, dataset: &str, epochs: usize) -> PathBuf {
        self.root
            .join(WEIGHTS_DIR)
            .join(format!("{dataset}_latest_epoch_{epochs}.safetensors"))
    }

    /// Writes every committed epoch as a JSON array.
    pub fn write_history(&self, history: &History) -> Result<PathBuf> {
        let path = self.history_path();
        let writer = BufWriter::new(File::create(&path)?);
        serde_json::to_writer_pretty(writer, history.entries())
            .map_err(|e| TrainErr::Io(e.into()))?;

        Ok(path)
    }
}
