use std::{num::NonZeroUsize, path::PathBuf};

use clap::{ArgAction, Parser};
use datasets::DatasetKind;

use crate::{Result, TrainErr};

/// Command line arguments of a training run.
#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "pose-orchestra", about = "Trains and evaluates a skeleton action classifier")]
pub struct Args {
    /// Input batch size for training
    #[arg(long, default_value_t = 64, value_name = "N")]
    pub batch_size: usize,

    /// Input batch size for testing
    #[arg(long, default_value_t = 1000, value_name = "N")]
    pub test_batch_size: usize,

    /// Number of epochs to train
    #[arg(long, default_value_t = 199, value_name = "N")]
    pub epochs: usize,

    /// Learning rate
    #[arg(long, default_value_t = 0.01, value_name = "LR")]
    pub lr: f32,

    /// Factor the learning rate is multiplied by on a plateau
    #[arg(long, default_value_t = 0.5, value_name = "M")]
    pub gamma: f32,

    /// Disables the parallel backend
    #[arg(long)]
    pub no_cuda: bool,

    /// Quickly check a single pass
    #[arg(long)]
    pub dry_run: bool,

    /// How many batches to wait before logging training status
    #[arg(long, default_value_t = 2, value_name = "N")]
    pub log_interval: usize,

    /// Saves the trained parameters
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    pub save_model: bool,

    /// 0 for JHMDB, 1 for SHREC coarse, 2 for SHREC fine
    #[arg(long, value_name = "N")]
    pub dataset: u8,

    /// Measures the inference time per example on every backend
    #[arg(long, alias = "calc_time")]
    pub calc_time: bool,

    /// Directory holding the dataset exports
    #[arg(long, default_value = "data")]
    pub data_dir: PathBuf,

    /// Directory the run directories are created in
    #[arg(long, default_value = "experiments")]
    pub experiments_dir: PathBuf,

    /// Seeds the initialization, dropout and shuffling
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Background threads assembling batches, 0 assembles them inline
    #[arg(long, default_value_t = 0)]
    pub workers: usize,

    /// Threads of the parallel backend, 0 uses every core
    #[arg(long, default_value_t = 0)]
    pub threads: usize,
}

/// A validated training configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingConfig {
    pub dataset: DatasetKind,
    pub batch_size: NonZeroUsize,
    pub test_batch_size: NonZeroUsize,
    pub epochs: NonZeroUsize,
    pub lr: f32,
    pub gamma: f32,
    pub use_accelerator: bool,
    pub dry_run: bool,
    pub log_interval: NonZeroUsize,
    pub save_model: bool,
    pub calc_time: bool,
    pub data_dir: PathBuf,
    pub experiments_dir: PathBuf,
    pub seed: u64,
    pub workers: usize,
    pub threads: usize,
}

impl Args {
    /// Validates the arguments.
    ///
    /// # Arguments
    /// * `dataset` - The already resolved dataset selector.
    ///
    /// # Returns
    /// The training configuration or `TrainErr::InvalidConfig` naming the first invalid flag.
    pub fn into_config(self, dataset: DatasetKind) -> Result<TrainingConfig> {
        let non_zero = |flag: &str, value: usize| {
            NonZeroUsize::new(value)
                .ok_or_else(|| TrainErr::InvalidConfig(format!("--{flag} must be greater than 0")))
        };

        if !(self.lr.is_finite() && self.lr > 0.) {
            return Err(TrainErr::InvalidConfig(format!(
                "--lr must be a positive number, got {}",
                self.lr
            )));
        }

        if !(self.gamma > 0. && self.gamma < 1.) {
            return Err(TrainErr::InvalidConfig(format!(
                "--gamma must be in (0, 1), got {}",
                self.gamma
            )));
        }

        Ok(TrainingConfig {
            dataset,
            batch_size: non_zero("batch-size", self.batch_size)?,
            test_batch_size: non_zero("test-batch-size", self.test_batch_size)?,
            epochs: non_zero("epochs", self.epochs)?,
            lr: self.lr,
            gamma: self.gamma,
            use_accelerator: !self.no_cuda,
            dry_run: self.dry_run,
            log_interval: non_zero("log-interval", self.log_interval)?,
            save_model: self.save_model,
            calc_time: self.calc_time,
            data_dir: self.data_dir,
            experiments_dir: self.experiments_dir,
            seed: self.seed,
            workers: self.workers,
            threads: self.threads,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> Args {
        let mut argv = vec!["pose-orchestra"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn defaults_follow_the_reference_run() {
        let args = parse(&["--dataset", "1"]);

        assert_eq!(args.batch_size, 64);
        assert_eq!(args.test_batch_size, 1000);
        assert_eq!(args.epochs, 199);
        assert_eq!(args.lr, 0.01);
        assert_eq!(args.gamma, 0.5);
        assert_eq!(args.log_interval, 2);
        assert!(args.save_model);
        assert!(!args.no_cuda && !args.dry_run && !args.calc_time);
    }

    #[test]
    fn dataset_is_required() {
        assert!(Args::try_parse_from(["pose-orchestra"]).is_err());
    }

    #[test]
    fn flags_are_parsed() {
        let args = parse(&[
            "--dataset",
            "0",
            "--no-cuda",
            "--dry-run",
            "--calc_time",
            "--save-model",
            "false",
            "--epochs",
            "3",
        ]);
        let config = args.into_config(DatasetKind::Jhmdb).unwrap();

        assert!(!config.use_accelerator && config.dry_run && config.calc_time);
        assert!(!config.save_model);
        assert_eq!(config.epochs.get(), 3);
    }

    #[test]
    fn zero_sizes_are_rejected() {
        let err = parse(&["--dataset", "0", "--batch-size", "0"])
            .into_config(DatasetKind::Jhmdb)
            .unwrap_err();

        assert!(matches!(err, TrainErr::InvalidConfig(msg) if msg.contains("batch-size")));
    }

    #[test]
    fn gamma_must_shrink_the_rate() {
        let err = parse(&["--dataset", "0", "--gamma", "1.5"])
            .into_config(DatasetKind::Jhmdb)
            .unwrap_err();

        assert!(matches!(err, TrainErr::InvalidConfig(_)));
    }
}
