use std::path::PathBuf;

use log::info;
use ndarray::Array3;
use serde::Deserialize;

use crate::{
    DatasetConfig, DatasetErr, LabelEncoder, Result, Sample, Split,
    adapter::{self, DatasetAdapter},
    transform,
};

const TRAIN_FILE: &str = "train.json";
const TEST_FILE: &str = "test.json";

/// Which of the two SHREC'17 gesture vocabularies to classify.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShrecLabel {
    /// 14 gestures.
    Coarse,
    /// 28 gestures, each coarse one performed with one or with all fingers.
    Fine,
}

/// A SHREC split export: one `(T, 66)` pose per sequence and both 1-based labels.
#[derive(Debug, Deserialize)]
struct Export {
    pose: Vec<Vec<Vec<f32>>>,
    coarse_label: Vec<u32>,
    fine_label: Vec<u32>,
}

/// The SHREC'17 adapter, reading `train.json` and `test.json` from `dir`.
#[derive(Debug, Clone)]
pub struct Shrec {
    dir: PathBuf,
    label: ShrecLabel,
    config: DatasetConfig,
}

impl Shrec {
    pub fn new(dir: impl Into<PathBuf>, label: ShrecLabel) -> Self {
        let config = match label {
            ShrecLabel::Coarse => DatasetConfig::shrec_coarse(),
            ShrecLabel::Fine => DatasetConfig::shrec_fine(),
        };

        Self {
            dir: dir.into(),
            label,
            config,
        }
    }

    fn read_split(&self, file: &str) -> Result<Split<u32>> {
        let path = self.dir.join(file);
        let export: Export = adapter::read_json(&path)?;
        adapter::check_columns(
            export.pose.len(),
            &[
                ("coarse_label", export.coarse_label.len()),
                ("fine_label", export.fine_label.len()),
            ],
        )?;

        let labels = match self.label {
            ShrecLabel::Coarse => export.coarse_label,
            ShrecLabel::Fine => export.fine_label,
        };

        let (j, d) = (self.config.joint_n, self.config.joint_d);
        let samples = export
            .pose
            .into_iter()
            .zip(labels)
            .enumerate()
            .map(|(i, (frames, label))| {
                let t = frames.len();
                if let Some(frame) = frames.iter().position(|f| f.len() != j * d) {
                    return Err(DatasetErr::InvalidPose {
                        index: i,
                        reason: format!("frame {frame} doesn't hold {} coordinates", j * d),
                    });
                }

                let flat: Vec<f32> = frames.into_iter().flatten().collect();
                let pose = Array3::from_shape_vec((t, j, d), flat).map_err(|_| {
                    DatasetErr::InvalidPose {
                        index: i,
                        reason: format!("frames must hold {} coordinates", j * d),
                    }
                })?;

                Ok(Sample { pose, label })
            })
            .collect::<Result<_>>()?;

        Ok(Split { samples })
    }
}

impl DatasetAdapter for Shrec {
    type Label = u32;

    fn config(&self) -> &DatasetConfig {
        &self.config
    }

    fn load(&self) -> Result<(Split<u32>, Split<u32>, LabelEncoder<u32>)> {
        let train = self.read_split(TRAIN_FILE)?;
        let test = self.read_split(TEST_FILE)?;

        // The gestures are numbered from 1, whether a split contains all of them or not.
        let classes = self.config.class_count as u32;
        let encoder = LabelEncoder::fit(1..=classes);

        info!(
            "loaded {} from {}: {} train and {} test sequences",
            self.config.name,
            self.dir.display(),
            train.len(),
            test.len()
        );

        Ok((train, test, encoder))
    }

    fn prepare(&self, pose: &Array3<f32>) -> Array3<f32> {
        let mut zoomed = transform::zoom(pose.view(), self.config.frame_l);
        transform::norm_scale(&mut zoomed);
        zoomed
    }
}
