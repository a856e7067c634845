mod eval_loop;
mod history;
mod scheduler;
mod train_loop;

pub use eval_loop::{EvalSummary, confusion_matrix, evaluate};
pub use history::{EpochMetrics, History};
pub use scheduler::{PlateauConfig, PlateauScheduler, SchedulerState};
pub use train_loop::{TrainOptions, train_epoch};
