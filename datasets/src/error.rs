use std::{error::Error, fmt, io, path::PathBuf};

use machine_learning::MlErr;

/// The result type used in the entire datasets crate.
pub type Result<T> = std::result::Result<T, DatasetErr>;

/// All errors that can occur while loading or preparing a dataset.
#[derive(Debug)]
pub enum DatasetErr {
    /// The dataset selector doesn't name a known dataset.
    Unsupported(u8),
    Read {
        path: PathBuf,
        source: io::Error,
    },
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    /// A split's columns or a sequence's shape disagree with the dataset configuration.
    InvalidPose {
        index: usize,
        reason: String,
    },
    /// A label that wasn't seen when fitting the encoder.
    UnknownLabel(String),
    Ml(MlErr),
}

impl fmt::Display for DatasetErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unsupported(id) => write!(f, "unsupported dataset selector {id}"),
            Self::Read { path, source } => {
                write!(f, "cannot read '{}': {source}", path.display())
            }
            Self::Parse { path, source } => {
                write!(f, "invalid dataset export '{}': {source}", path.display())
            }
            Self::InvalidPose { index, reason } => write!(f, "sequence {index}: {reason}"),
            Self::UnknownLabel(label) => write!(f, "unknown label {label}"),
            Self::Ml(e) => write!(f, "{e}"),
        }
    }
}

impl Error for DatasetErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Read { source, .. } => Some(source),
            Self::Parse { source, .. } => Some(source),
            Self::Ml(e) => Some(e),
            _ => None,
        }
    }
}

impl From<MlErr> for DatasetErr {
    fn from(value: MlErr) -> Self {
        Self::Ml(value)
    }
}
