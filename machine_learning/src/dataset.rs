use ndarray::{Array1, Array3, Array4, ArrayView1, ArrayView2, ArrayView3, Axis};

use crate::{MlErr, Result, tensor::PoseBatch};

/// A single labeled pose sequence borrowed from a `TensorDataset`.
#[derive(Debug, Clone, Copy)]
pub struct Example<'a> {
    pub features: ArrayView2<'a, f32>,
    pub geometry: ArrayView3<'a, f32>,
    pub label: usize,
}

/// An in-memory dataset of fixed-shape pose sequences.
#[derive(Debug, Clone)]
pub struct TensorDataset {
    features: Array3<f32>,
    geometry: Array4<f32>,
    labels: Array1<usize>,
}

impl TensorDataset {
    /// Creates a new `TensorDataset`.
    ///
    /// # Arguments
    /// * `features` - The feature streams, shaped `(N, T, F)`.
    /// * `geometry` - The joint coordinates, shaped `(N, T, J, D)`.
    /// * `labels` - The class of every example, shaped `(N,)`.
    ///
    /// # Returns
    /// The dataset or an error if it's empty or the tensors disagree on `N` or `T`.
    pub fn new(features: Array3<f32>, geometry: Array4<f32>, labels: Array1<usize>) -> Result<Self> {
        if labels.is_empty() {
            return Err(MlErr::EmptyDataset);
        }

        // Reuses the batch validation, a dataset is just one big batch.
        let (features, geometry, labels) = PoseBatch::new(features, geometry, labels)?.into_parts();

        Ok(Self {
            features,
            geometry,
            labels,
        })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn labels(&self) -> ArrayView1<'_, usize> {
        self.labels.view()
    }

    /// Returns the `index`-th example, or `None` if out of bounds.
    pub fn get(&self, index: usize) -> Option<Example<'_>> {
        if index >= self.len() {
            return None;
        }

        Some(Example {
            features: self.features.index_axis(Axis(0), index),
            geometry: self.geometry.index_axis(Axis(0), index),
            label: self.labels[index],
        })
    }

    /// Packs the examples at `indices` into a host-resident batch.
    ///
    /// # Panics
    /// If any index is out of bounds.
    pub fn batch(&self, indices: &[usize]) -> PoseBatch {
        let features = self.features.select(Axis(0), indices);
        let geometry = self.geometry.select(Axis(0), indices);
        let labels = self.labels.select(Axis(0), indices);

        // The extents were validated once in `new`.
        PoseBatch::from_parts(features, geometry, labels)
    }

    /// Packs the whole dataset into a single host-resident batch.
    pub fn full(&self) -> PoseBatch {
        let indices: Vec<_> = (0..self.len()).collect();
        self.batch(&indices)
    }
}
