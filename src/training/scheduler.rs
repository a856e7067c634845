use log::info;

use crate::{Result, TrainErr};

/// The knobs of a `PlateauScheduler`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlateauConfig {
    /// What the learning rate is multiplied by on a plateau.
    pub factor: f32,
    /// Non-improving epochs tolerated before reducing.
    pub patience: usize,
    /// Epochs after a reduction during which the metric isn't tracked.
    pub cooldown: usize,
    pub min_lr: f32,
    /// Relative improvement needed for a metric to count as better.
    pub threshold: f32,
    /// Reductions smaller than this are ignored.
    pub eps: f32,
}

impl PlateauConfig {
    pub fn new(factor: f32) -> Self {
        Self {
            factor,
            ..Self::default()
        }
    }
}

impl Default for PlateauConfig {
    fn default() -> Self {
        Self {
            factor: 0.5,
            patience: 5,
            cooldown: 1,
            min_lr: 5e-6,
            threshold: 1e-4,
            eps: 1e-8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Tracking,
    /// Holds the amount of epochs left before tracking again.
    Cooldown(usize),
}

/// Reduces the learning rate once a minimized metric stops improving.
///
/// On every `step`:
///   1. While cooling down, the metric is ignored and the cooldown counter goes down by one.
///   2. Otherwise the metric improves if it's lower than `best * (1 - threshold)`, NaN never
///      does.
///   3. More than `patience` bad epochs multiply the rate by `factor`, floored at `min_lr`, and
///      start a cooldown.
#[derive(Debug, Clone)]
pub struct PlateauScheduler {
    config: PlateauConfig,
    lr: f32,
    best: f32,
    num_bad_epochs: usize,
    cooldown_counter: usize,
}

impl PlateauScheduler {
    /// Creates a new `PlateauScheduler`.
    ///
    /// # Arguments
    /// * `config` - The reduction policy.
    /// * `lr` - The initial learning rate. A rate already below `config.min_lr` is kept as is.
    pub fn new(config: PlateauConfig, lr: f32) -> Result<Self> {
        if !(config.factor > 0. && config.factor < 1.) {
            return Err(TrainErr::InvalidConfig(format!(
                "plateau factor must be in (0, 1), got {}",
                config.factor
            )));
        }

        if !(config.min_lr >= 0. && lr.is_finite() && lr > 0.) {
            return Err(TrainErr::InvalidConfig(format!(
                "learning rate {lr} and floor {} must be positive",
                config.min_lr
            )));
        }

        Ok(Self {
            config,
            lr,
            best: f32::INFINITY,
            num_bad_epochs: 0,
            cooldown_counter: 0,
        })
    }

    /// Observes the epoch's metric.
    ///
    /// # Returns
    /// The learning rate for the next epoch.
    pub fn step(&mut self, metric: f32) -> f32 {
        if self.cooldown_counter > 0 {
            self.cooldown_counter -= 1;
            return self.lr;
        }

        if metric < self.best * (1. - self.config.threshold) {
            self.best = metric;
            self.num_bad_epochs = 0;
        } else {
            self.num_bad_epochs += 1;
        }

        if self.num_bad_epochs > self.config.patience {
            let reduced = (self.lr * self.config.factor).max(self.config.min_lr);
            if self.lr - reduced > self.config.eps {
                info!("reducing learning rate from {:.4e} to {reduced:.4e}", self.lr);
                self.lr = reduced;
            }

            self.cooldown_counter = self.config.cooldown;
            self.num_bad_epochs = 0;
        }

        self.lr
    }

    pub fn lr(&self) -> f32 {
        self.lr
    }

    pub fn best(&self) -> f32 {
        self.best
    }

    pub fn num_bad_epochs(&self) -> usize {
        self.num_bad_epochs
    }

    pub fn state(&self) -> SchedulerState {
        match self.cooldown_counter {
            0 => SchedulerState::Tracking,
            n => SchedulerState::Cooldown(n),
        }
    }

    pub fn in_cooldown(&self) -> bool {
        self.cooldown_counter > 0
    }
}
