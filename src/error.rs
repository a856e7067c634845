use std::{error::Error, fmt, io};

use datasets::DatasetErr;
use machine_learning::MlErr;

/// The result type used across the training orchestration.
pub type Result<T> = std::result::Result<T, TrainErr>;

/// All errors that can stop a training run.
#[derive(Debug)]
pub enum TrainErr {
    /// Invalid configuration, caught before anything is allocated.
    InvalidConfig(String),
    /// A model, loss, optimizer or checkpoint failure.
    Ml(MlErr),
    Dataset(DatasetErr),
    /// The performance plot couldn't be rendered.
    Plot(String),
    Io(io::Error),
}

impl fmt::Display for TrainErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidConfig(msg) => write!(f, "invalid config: {msg}"),
            Self::Ml(e) => write!(f, "{e}"),
            Self::Dataset(e) => write!(f, "dataset error: {e}"),
            Self::Plot(msg) => write!(f, "plot error: {msg}"),
            Self::Io(e) => write!(f, "io error: {e}"),
        }
    }
}

impl Error for TrainErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Ml(e) => Some(e),
            Self::Dataset(e) => Some(e),
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<MlErr> for TrainErr {
    fn from(e: MlErr) -> Self {
        Self::Ml(e)
    }
}

impl From<DatasetErr> for TrainErr {
    fn from(e: DatasetErr) -> Self {
        Self::Dataset(e)
    }
}

impl From<io::Error> for TrainErr {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}
