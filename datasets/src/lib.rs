mod adapter;
mod config;
mod error;
mod jhmdb;
mod kind;
mod label;
mod shrec;
pub mod transform;

pub use adapter::{DatasetAdapter, Sample, Split};
pub use config::DatasetConfig;
pub use error::{DatasetErr, Result};
pub use jhmdb::Jhmdb;
pub use kind::DatasetKind;
pub use label::LabelEncoder;
pub use shrec::{Shrec, ShrecLabel};
