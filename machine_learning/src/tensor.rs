use log::trace;
use ndarray::{Array1, Array3, Array4, ArrayView1, ArrayView3, ArrayView4, Axis};

use crate::{MlErr, Result, device::Device};

/// A mini-batch of pose sequences.
///
/// * `features` - The frame-level feature stream, shaped `(B, T, F)`.
/// * `geometry` - The joint coordinates, shaped `(B, T, J, D)`.
/// * `labels` - The class of every example, shaped `(B,)`.
#[derive(Debug, Clone)]
pub struct PoseBatch {
    features: Array3<f32>,
    geometry: Array4<f32>,
    labels: Array1<usize>,
    device: Device,
}

impl PoseBatch {
    /// Creates a new `PoseBatch` resident on the host.
    ///
    /// # Returns
    /// The batch, or a shape mismatch if the three tensors disagree on the batch extent or the
    /// streams disagree on the sequence length.
    pub fn new(features: Array3<f32>, geometry: Array4<f32>, labels: Array1<usize>) -> Result<Self> {
        let b = labels.len();

        if features.len_of(Axis(0)) != b || geometry.len_of(Axis(0)) != b {
            return Err(MlErr::ShapeMismatch {
                what: "batch extents (features, geometry, labels)",
                got: vec![features.len_of(Axis(0)), geometry.len_of(Axis(0)), b],
                expected: vec![b, b, b],
            });
        }

        if features.len_of(Axis(1)) != geometry.len_of(Axis(1)) {
            return Err(MlErr::ShapeMismatch {
                what: "sequence length (features, geometry)",
                got: vec![features.len_of(Axis(1)), geometry.len_of(Axis(1))],
                expected: vec![features.len_of(Axis(1)); 2],
            });
        }

        Ok(Self {
            features,
            geometry,
            labels,
            device: Device::cpu(),
        })
    }

    /// Builds a host-resident batch from tensors already known to agree on their extents.
    pub(crate) fn from_parts(
        features: Array3<f32>,
        geometry: Array4<f32>,
        labels: Array1<usize>,
    ) -> Self {
        Self {
            features,
            geometry,
            labels,
            device: Device::cpu(),
        }
    }

    pub(crate) fn into_parts(self) -> (Array3<f32>, Array4<f32>, Array1<usize>) {
        (self.features, self.geometry, self.labels)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn features(&self) -> ArrayView3<'_, f32> {
        self.features.view()
    }

    pub fn geometry(&self) -> ArrayView4<'_, f32> {
        self.geometry.view()
    }

    pub fn labels(&self) -> ArrayView1<'_, usize> {
        self.labels.view()
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Makes this batch resident on `device`.
    ///
    /// The tensors are laid out contiguously on arrival, a batch already resident on `device`
    /// is returned untouched.
    pub fn to_device(self, device: &Device) -> Self {
        if self.device == *device {
            return self;
        }

        trace!("moving batch of {} from {} to {device}", self.len(), self.device);

        let Self {
            features,
            geometry,
            labels,
            ..
        } = self;

        Self {
            features: features.as_standard_layout().into_owned(),
            geometry: geometry.as_standard_layout().into_owned(),
            labels,
            device: device.clone(),
        }
    }

    /// Returns the `index`-th example as a batch of one, resident on the same device.
    pub fn example(&self, index: usize) -> Option<Self> {
        if index >= self.len() {
            return None;
        }

        Some(self.select(&[index]))
    }

    /// Gathers the examples at `indices` into a new batch on the same device.
    ///
    /// # Panics
    /// If any index is out of bounds.
    pub fn select(&self, indices: &[usize]) -> Self {
        Self {
            features: self.features.select(Axis(0), indices),
            geometry: self.geometry.select(Axis(0), indices),
            labels: self.labels.select(Axis(0), indices),
            device: self.device.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(b: usize) -> PoseBatch {
        PoseBatch::new(
            Array3::from_shape_fn((b, 4, 3), |(i, t, f)| (i * 100 + t * 10 + f) as f32),
            Array4::zeros((b, 4, 2, 2)),
            Array1::from_iter(0..b),
        )
        .unwrap()
    }

    #[test]
    fn rejects_disagreeing_batch_extents() {
        let err = PoseBatch::new(
            Array3::zeros((3, 4, 3)),
            Array4::zeros((2, 4, 2, 2)),
            Array1::zeros(3),
        )
        .unwrap_err();

        match err {
            MlErr::ShapeMismatch { got, .. } => assert_eq!(got, vec![3, 2, 3]),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn rejects_disagreeing_sequence_lengths() {
        let err = PoseBatch::new(
            Array3::zeros((2, 4, 3)),
            Array4::zeros((2, 5, 2, 2)),
            Array1::zeros(2),
        )
        .unwrap_err();

        assert!(matches!(err, MlErr::ShapeMismatch { .. }));
    }

    #[test]
    fn example_is_a_batch_of_one() {
        let b = batch(3);
        let one = b.example(2).unwrap();

        assert_eq!(one.len(), 1);
        assert_eq!(one.labels()[0], 2);
        assert_eq!(one.features()[[0, 1, 2]], 212.0);
        assert!(b.example(3).is_none());
    }

    #[test]
    fn to_device_changes_residency() {
        let device = Device::parallel(2).unwrap();
        let b = batch(2).to_device(&device);

        assert_eq!(b.device(), &device);
        assert_eq!(b.example(0).unwrap().device(), &device);
    }
}
