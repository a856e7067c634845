use std::{path::PathBuf, sync::Arc};

use datasets::DatasetAdapter;
use log::{info, warn};
use machine_learning::{
    arch::{Model, PoseNet, loss::CrossEntropy},
    checkpoint,
    dataloader::DataLoader,
    device::{Backend, Device},
    optimization::{Adam, Optimizer},
};

use crate::{
    Result,
    artifacts::{RunDir, plot},
    config::TrainingConfig,
    timing::{self, TimingReport},
    training::{self, History, PlateauConfig, PlateauScheduler, TrainOptions},
};

/// What a finished run leaves behind.
#[derive(Debug)]
pub struct RunReport {
    pub history: History,
    pub checkpoint: Option<PathBuf>,
    pub timings: Vec<TimingReport>,
}

/// A training run on one dataset, from loading the data to writing the artifacts.
pub struct Session<'a, A: DatasetAdapter> {
    adapter: A,
    config: &'a TrainingConfig,
    run_dir: &'a RunDir,
}

impl<'a, A: DatasetAdapter> Session<'a, A> {
    /// Creates a new `Session`.
    ///
    /// # Arguments
    /// * `adapter` - Loads and preprocesses the dataset.
    /// * `config` - The validated run configuration.
    /// * `run_dir` - Where the artifacts are written.
    pub fn new(adapter: A, config: &'a TrainingConfig, run_dir: &'a RunDir) -> Self {
        Self {
            adapter,
            config,
            run_dir,
        }
    }

    /// Trains and evaluates a model for every configured epoch, then writes the artifacts.
    pub fn run(self) -> Result<RunReport> {
        let config = self.config;
        let device = self.select_device();

        let (train, test, encoder) = self.adapter.load()?;
        let train = Arc::new(self.adapter.generate(&train, &encoder)?);
        let test = Arc::new(self.adapter.generate(&test, &encoder)?);

        let mut train_loader = DataLoader::new(Arc::clone(&train), config.batch_size)
            .shuffled(config.seed)
            .with_workers(config.workers);
        let mut test_loader =
            DataLoader::new(Arc::clone(&test), config.test_batch_size).with_workers(config.workers);

        let mut model = PoseNet::new(self.adapter.config().model_config(), config.seed)?;
        model.to_device(device.clone());
        if let Some(first) = model.parameters().first() {
            info!("Parameter {} is on {}", first.name, model.device());
        }

        let mut optimizer = Adam::with_defaults(model.size(), config.lr);
        let mut scheduler = PlateauScheduler::new(PlateauConfig::new(config.gamma), config.lr)?;
        let loss_fn = CrossEntropy::new();
        let options = TrainOptions {
            log_interval: config.log_interval,
            dry_run: config.dry_run,
        };

        let mut history = History::new();
        for epoch in 1..=config.epochs.get() {
            let train_loss = training::train_epoch(
                &mut model,
                &mut train_loader,
                &mut optimizer,
                &loss_fn,
                epoch,
                &options,
                &mut history,
            )?;
            training::evaluate(&mut model, &mut test_loader, &mut history)?;

            let lr = scheduler.step(train_loss);
            optimizer.set_learning_rate(lr);
        }

        model.eval_mode();
        let confusion = training::confusion_matrix(&model, &mut test_loader)?;
        plot::render(&self.run_dir.plot_path(), &history, &confusion)?;
        self.run_dir.write_history(&history)?;

        let mut checkpoint = None;
        if config.save_model {
            let path = self
                .run_dir
                .weights_path(config.dataset.name(), config.epochs.get());
            checkpoint::save(&model, &path)?;
            info!("Latest model saved to {}", path.display());
            checkpoint = Some(path);
        }

        let mut timings = Vec::new();
        if config.calc_time {
            let candidates = [
                (Backend::Cpu, Ok(Device::cpu())),
                (Backend::Parallel, self.accelerator(&device)),
            ];
            timings = timing::time_inference(&mut model, &test, candidates)?;
        }

        Ok(RunReport {
            history,
            checkpoint,
            timings,
        })
    }

    /// Picks the parallel backend unless disabled or unavailable.
    fn select_device(&self) -> Device {
        if !self.config.use_accelerator {
            info!("parallel backend disabled, training on the cpu");
            return Device::cpu();
        }

        match Device::probe(self.config.threads) {
            Ok(device) => device,
            Err(e) => {
                warn!("{e}, training on the cpu");
                Device::cpu()
            }
        }
    }

    /// Reuses the training device if it's an accelerator, otherwise tries to bring one up.
    fn accelerator(&self, device: &Device) -> machine_learning::Result<Device> {
        if device.is_accelerator() {
            Ok(device.clone())
        } else {
            Device::probe(self.config.threads)
        }
    }
}
