pub mod artifacts;
pub mod config;
pub mod error;
pub mod session;
pub mod timing;
pub mod training;

pub use error::{Result, TrainErr};
