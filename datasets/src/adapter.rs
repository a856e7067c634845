use std::{fmt::Debug, fs::File, io::BufReader, path::Path};

use log::debug;
use machine_learning::dataset::TensorDataset;
use ndarray::{Array1, Array3, Array4, Axis};
use serde::de::DeserializeOwned;

use crate::{DatasetConfig, DatasetErr, LabelEncoder, Result, transform};

/// A raw labeled pose sequence, shaped `(T, J, D)` with `T` varying between sequences.
#[derive(Debug, Clone)]
pub struct Sample<L> {
    pub pose: Array3<f32>,
    pub label: L,
}

/// The raw sequences of one split of a dataset.
#[derive(Debug, Clone)]
pub struct Split<L> {
    pub samples: Vec<Sample<L>>,
}

impl<L> Split<L> {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn labels(&self) -> impl Iterator<Item = &L> {
        self.samples.iter().map(|s| &s.label)
    }
}

/// Turns a dataset's on-disk splits into tensors a model can consume.
pub trait DatasetAdapter {
    type Label: Ord + Clone + Debug;

    fn config(&self) -> &DatasetConfig;

    /// Reads the train and test splits and fits the label encoder.
    ///
    /// # Returns
    /// The train split, the test split and the encoder, in that order.
    fn load(&self) -> Result<(Split<Self::Label>, Split<Self::Label>, LabelEncoder<Self::Label>)>;

    /// Preprocesses a single raw sequence into `config().frame_l` frames.
    fn prepare(&self, pose: &Array3<f32>) -> Array3<f32>;

    /// Builds the tensors of `split`.
    ///
    /// # Returns
    /// A dataset with features shaped `(N, frame_l, feat_d)`, geometry shaped
    /// `(N, frame_l, joint_n, joint_d)` and labels encoded by `encoder`.
    fn generate(
        &self,
        split: &Split<Self::Label>,
        encoder: &LabelEncoder<Self::Label>,
    ) -> Result<TensorDataset> {
        let config = self.config();
        let n = split.len();
        let (t, j, d, f) = (config.frame_l, config.joint_n, config.joint_d, config.feat_d);

        let mut features = Array3::zeros((n, t, f));
        let mut geometry = Array4::zeros((n, t, j, d));
        let mut labels = Array1::zeros(n);

        for (i, sample) in split.samples.iter().enumerate() {
            if sample.pose.len_of(Axis(0)) == 0 || sample.pose.shape()[1..] != [j, d] {
                return Err(DatasetErr::InvalidPose {
                    index: i,
                    reason: format!(
                        "expected (T > 0, {j}, {d}) coordinates, got {:?}",
                        sample.pose.shape()
                    ),
                });
            }

            let pose = self.prepare(&sample.pose);
            let m = transform::jcd(pose.view());

            features.index_axis_mut(Axis(0), i).assign(&m);
            geometry.index_axis_mut(Axis(0), i).assign(&pose);
            labels[i] = encoder.transform(&sample.label)?;
        }

        debug!("generated {n} {} sequences", config.name);
        Ok(TensorDataset::new(features, geometry, labels)?)
    }
}

/// Deserializes the JSON export at `path`.
pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path).map_err(|source| DatasetErr::Read {
        path: path.to_path_buf(),
        source,
    })?;

    serde_json::from_reader(BufReader::new(file)).map_err(|source| DatasetErr::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Fails unless every column of a split export has `expected` entries.
pub(crate) fn check_columns(expected: usize, columns: &[(&str, usize)]) -> Result<()> {
    match columns.iter().find(|(_, len)| *len != expected) {
        Some((name, len)) => Err(DatasetErr::InvalidPose {
            index: expected.min(*len),
            reason: format!("{name} has {len} entries but there are {expected} poses"),
        }),
        None => Ok(()),
    }
}
