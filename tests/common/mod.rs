#![allow(dead_code)]

use std::{
    num::NonZeroUsize,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use machine_learning::{
    Result,
    arch::{Model, ParamView, ParamViewMut, PoseNetConfig, check_residency},
    dataloader::DataLoader,
    dataset::TensorDataset,
    device::Device,
    tensor::PoseBatch,
};
use ndarray::{Array1, Array2, Array3, Array4, ArrayView2, Axis};

pub const CONFIG: PoseNetConfig = PoseNetConfig {
    frame_l: 4,
    joint_n: 3,
    joint_d: 2,
    feat_d: 3,
    filters: 8,
    class_count: 3,
};

/// Scores every example the same: one point for `predict` plus a trainable bias per class.
pub struct ConstantModel {
    predict: usize,
    bias: Vec<f32>,
    grad: Vec<f32>,
    device: Device,
    training: bool,
    pub forwards: Arc<AtomicUsize>,
    pub inferences: Arc<AtomicUsize>,
}

impl ConstantModel {
    pub fn new(classes: usize, predict: usize) -> Self {
        Self {
            predict,
            bias: vec![0.; classes],
            grad: vec![0.; classes],
            device: Device::cpu(),
            training: true,
            forwards: Arc::default(),
            inferences: Arc::default(),
        }
    }

    pub fn forwards(&self) -> usize {
        self.forwards.load(Ordering::SeqCst)
    }

    pub fn inferences(&self) -> usize {
        self.inferences.load(Ordering::SeqCst)
    }

    fn scores(&self, batch: &PoseBatch) -> Result<Array2<f32>> {
        check_residency(&self.device, batch)?;

        let classes = self.bias.len();
        Ok(Array2::from_shape_fn((batch.len(), classes), |(_, c)| {
            self.bias[c] + if c == self.predict { 1. } else { 0. }
        }))
    }
}

impl Model for ConstantModel {
    fn size(&self) -> usize {
        self.bias.len()
    }

    fn class_count(&self) -> usize {
        self.bias.len()
    }

    fn device(&self) -> &Device {
        &self.device
    }

    fn to_device(&mut self, device: Device) {
        self.device = device;
    }

    fn is_training(&self) -> bool {
        self.training
    }

    fn set_training(&mut self, training: bool) {
        self.training = training;
    }

    fn forward(&mut self, batch: &PoseBatch) -> Result<Array2<f32>> {
        self.forwards.fetch_add(1, Ordering::SeqCst);
        self.scores(batch)
    }

    fn backward(&mut self, d: ArrayView2<f32>) -> Result<()> {
        for (g, d) in self.grad.iter_mut().zip(d.sum_axis(Axis(0))) {
            *g += d;
        }
        Ok(())
    }

    fn infer(&self, batch: &PoseBatch) -> Result<Array2<f32>> {
        self.inferences.fetch_add(1, Ordering::SeqCst);
        self.scores(batch)
    }

    fn zero_grad(&mut self) {
        self.grad.fill(0.);
    }

    fn params_and_grad(&mut self) -> (&mut [f32], &[f32]) {
        (&mut self.bias, &self.grad)
    }

    fn parameters(&self) -> Vec<ParamView<'_>> {
        vec![ParamView {
            name: "bias".into(),
            shape: vec![self.bias.len()],
            values: &self.bias,
        }]
    }

    fn parameters_mut(&mut self) -> Vec<ParamViewMut<'_>> {
        vec![ParamViewMut {
            name: "bias".into(),
            shape: vec![self.bias.len()],
            values: &mut self.bias,
        }]
    }
}

/// Builds a dataset shaped for `CONFIG` with the given labels.
pub fn dataset(labels: &[usize]) -> Arc<TensorDataset> {
    let n = labels.len();
    let features = Array3::from_shape_fn((n, 4, 3), |(i, t, f)| {
        ((i * 7 + t * 3 + f) % 11) as f32 * 0.1 + labels[i] as f32
    });
    let geometry = Array4::from_shape_fn((n, 4, 3, 2), |(i, t, j, d)| {
        ((i + 1) * (t + j + d)) as f32 * 0.05 - labels[i] as f32
    });

    let ds = TensorDataset::new(features, geometry, Array1::from_vec(labels.to_vec())).unwrap();
    Arc::new(ds)
}

pub fn loader(dataset: &Arc<TensorDataset>, batch_size: usize) -> DataLoader {
    DataLoader::new(Arc::clone(dataset), NonZeroUsize::new(batch_size).unwrap())
}

/// Ten examples, three of them of class 0.
pub fn ten_examples() -> Arc<TensorDataset> {
    dataset(&[0, 1, 2, 0, 1, 2, 0, 1, 2, 1])
}
