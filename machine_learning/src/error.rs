use std::{
    error::Error,
    fmt::{self, Display},
    io,
};

use safetensors::SafeTensorError;

/// The result type used in the entire machine learning module.
pub type Result<T> = std::result::Result<T, MlErr>;

/// The machine learning module's error type.
#[derive(Debug)]
pub enum MlErr {
    /// Two tensors that should agree on their extents do not.
    ShapeMismatch {
        what: &'static str,
        got: Vec<usize>,
        expected: Vec<usize>,
    },
    LabelOutOfRange {
        label: usize,
        classes: usize,
    },
    /// A batch was handed to a model living on another backend.
    DeviceMismatch {
        model: String,
        input: String,
    },
    BackendUnavailable {
        backend: &'static str,
        reason: String,
    },
    InvalidConfig(String),
    EmptyDataset,
    BackwardBeforeForward,
    MissingParameter {
        name: String,
    },
    Checkpoint(String),
    Io(io::Error),
}

impl Display for MlErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MlErr::ShapeMismatch {
                what,
                got,
                expected,
            } => write!(
                f,
                "There's a shape mismatch for {what}, got {got:?} and expected {expected:?}"
            ),
            MlErr::LabelOutOfRange { label, classes } => write!(
                f,
                "Label {label} is out of range for a model with {classes} classes"
            ),
            MlErr::DeviceMismatch { model, input } => write!(
                f,
                "The model lives on {model} but the input is resident on {input}"
            ),
            MlErr::BackendUnavailable { backend, reason } => {
                write!(f, "The {backend} backend is unavailable: {reason}")
            }
            MlErr::InvalidConfig(msg) => write!(f, "invalid configuration: {msg}"),
            MlErr::EmptyDataset => write!(f, "The dataset has no examples"),
            MlErr::BackwardBeforeForward => {
                write!(f, "Tried to run a backward pass without a previous forward pass")
            }
            MlErr::MissingParameter { name } => {
                write!(f, "The checkpoint has no tensor named {name}")
            }
            MlErr::Checkpoint(msg) => write!(f, "checkpoint error: {msg}"),
            MlErr::Io(e) => write!(f, "io error: {e}"),
        }
    }
}

impl Error for MlErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            MlErr::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for MlErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<SafeTensorError> for MlErr {
    fn from(value: SafeTensorError) -> Self {
        Self::Checkpoint(format!("{value:?}"))
    }
}
