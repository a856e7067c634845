pub mod arch;
pub mod checkpoint;
pub mod dataloader;
pub mod dataset;
pub mod device;
pub mod error;
pub mod optimization;
pub mod tensor;

pub use error::{MlErr, Result};
