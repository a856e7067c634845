use std::path::{Path, PathBuf};

use log::info;
use ndarray::Array3;
use serde::Deserialize;

use crate::{
    DatasetConfig, DatasetErr, LabelEncoder, Result, Sample, Split,
    adapter::{self, DatasetAdapter},
    transform,
};

const TRAIN_FILE: &str = "GT_train_1.json";
const TEST_FILE: &str = "GT_test_1.json";

/// A JHMDB split export: one `(T, 15, 2)` pose per sequence and its action name.
#[derive(Debug, Deserialize)]
struct Export {
    pose: Vec<Vec<Vec<Vec<f32>>>>,
    label: Vec<String>,
}

/// The JHMDB adapter, reading the first official split from `dir`.
#[derive(Debug, Clone)]
pub struct Jhmdb {
    dir: PathBuf,
    config: DatasetConfig,
}

impl Jhmdb {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            config: DatasetConfig::jhmdb(),
        }
    }

    fn read_split(&self, file: &str) -> Result<Split<String>> {
        let path = self.dir.join(file);
        let export: Export = adapter::read_json(&path)?;
        adapter::check_columns(export.pose.len(), &[("label", export.label.len())])?;

        let samples = export
            .pose
            .into_iter()
            .zip(export.label)
            .enumerate()
            .map(|(i, (frames, label))| {
                Ok(Sample {
                    pose: to_array(i, frames, &path)?,
                    label,
                })
            })
            .collect::<Result<_>>()?;

        Ok(Split { samples })
    }
}

/// Packs nested `[T][J][D]` coordinates into an array, every frame must have the same shape.
fn to_array(index: usize, frames: Vec<Vec<Vec<f32>>>, path: &Path) -> Result<Array3<f32>> {
    let t = frames.len();
    let j = frames.first().map_or(0, Vec::len);
    let d = frames.first().and_then(|f| f.first()).map_or(0, Vec::len);

    let ragged = frames
        .iter()
        .enumerate()
        .find(|(_, frame)| frame.len() != j || frame.iter().any(|joint| joint.len() != d));

    if let Some((frame, _)) = ragged {
        return Err(DatasetErr::InvalidPose {
            index,
            reason: format!(
                "frame {frame} isn't shaped ({j}, {d}) like the first one in {}",
                path.display()
            ),
        });
    }

    let flat: Vec<f32> = frames.into_iter().flatten().flatten().collect();

    Array3::from_shape_vec((t, j, d), flat).map_err(|_| DatasetErr::InvalidPose {
        index,
        reason: format!("ragged frames in {}", path.display()),
    })
}

impl DatasetAdapter for Jhmdb {
    type Label = String;

    fn config(&self) -> &DatasetConfig {
        &self.config
    }

    fn load(&self) -> Result<(Split<String>, Split<String>, LabelEncoder<String>)> {
        let train = self.read_split(TRAIN_FILE)?;
        let test = self.read_split(TEST_FILE)?;
        let encoder = LabelEncoder::fit(train.labels().cloned());

        info!(
            "loaded JHMDB from {}: {} train and {} test sequences, {} actions",
            self.dir.display(),
            train.len(),
            test.len(),
            encoder.len()
        );

        Ok((train, test, encoder))
    }

    fn prepare(&self, pose: &Array3<f32>) -> Array3<f32> {
        let mut centered = pose.clone();
        transform::center_xy(&mut centered);
        transform::zoom(centered.view(), self.config.frame_l)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_must_share_a_shape() {
        let path = Path::new("GT_train_1.json");
        let frames = vec![vec![vec![1., 2.], vec![3., 4.]], vec![vec![5., 6., 7., 8.]]];

        let err = to_array(0, frames, path).unwrap_err();
        assert!(matches!(err, DatasetErr::InvalidPose { index: 0, .. }));

        let even = vec![vec![vec![1., 2.], vec![3., 4.]]; 3];
        assert_eq!(to_array(0, even, path).unwrap().shape(), &[3, 2, 2]);
    }
}
