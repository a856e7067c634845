use std::fmt;

use crate::{DatasetConfig, DatasetErr};

/// The datasets a model can be trained on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatasetKind {
    Jhmdb,
    ShrecCoarse,
    ShrecFine,
}

impl DatasetKind {
    pub fn config(self) -> DatasetConfig {
        match self {
            DatasetKind::Jhmdb => DatasetConfig::jhmdb(),
            DatasetKind::ShrecCoarse => DatasetConfig::shrec_coarse(),
            DatasetKind::ShrecFine => DatasetConfig::shrec_fine(),
        }
    }

    /// Returns the name used in artifact file names.
    pub fn name(self) -> &'static str {
        self.config().name
    }
}

impl TryFrom<u8> for DatasetKind {
    type Error = DatasetErr;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(DatasetKind::Jhmdb),
            1 => Ok(DatasetKind::ShrecCoarse),
            2 => Ok(DatasetKind::ShrecFine),
            other => Err(DatasetErr::Unsupported(other)),
        }
    }
}

impl fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
