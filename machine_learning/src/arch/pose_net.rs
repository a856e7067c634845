use log::debug;
use ndarray::{Array1, Array2, ArrayView2, ArrayView3, ArrayView4, ArrayViewMut1, Axis, Zip, s};
use rand::{SeedableRng, rngs::StdRng};

use super::{
    Sequential,
    activations::ActFn,
    layers::Layer,
    model::{self, Model, ParamView, ParamViewMut},
};
use crate::{MlErr, Result, device::Device, tensor::PoseBatch};

const LEAKY_SLOPE: f32 = 0.2;
const DROPOUT_RATE: f32 = 0.1;

/// The shape of the data a `PoseNet` consumes and the width of its hidden layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoseNetConfig {
    /// Frames per sequence.
    pub frame_l: usize,
    /// Joints per frame.
    pub joint_n: usize,
    /// Coordinates per joint.
    pub joint_d: usize,
    /// Width of the frame-level feature stream.
    pub feat_d: usize,
    pub filters: usize,
    pub class_count: usize,
}

impl PoseNetConfig {
    /// Returns the width of the per-sequence descriptor fed to the classifier head.
    pub fn descriptor_len(&self) -> usize {
        self.feat_d + 3 * self.joint_n * self.joint_d
    }

    fn validate(&self) -> Result<()> {
        let fields = [
            ("frame_l", self.frame_l),
            ("joint_n", self.joint_n),
            ("joint_d", self.joint_d),
            ("feat_d", self.feat_d),
            ("filters", self.filters),
            ("class_count", self.class_count),
        ];

        match fields.iter().find(|(_, v)| *v == 0) {
            Some((name, _)) => Err(MlErr::InvalidConfig(format!("{name} must be positive"))),
            None => Ok(()),
        }
    }
}

/// A reference pose sequence classifier.
///
/// Every sequence is summarized into a fixed descriptor: the time-averaged feature stream,
/// the mean pose, and the mean magnitude of the slow (one frame) and fast (two frame) joint
/// motion. The descriptor goes through a leaky relu MLP with dropout that outputs one score per
/// class.
#[derive(Debug, Clone)]
pub struct PoseNet {
    config: PoseNetConfig,
    head: Sequential,
    params: Vec<f32>,
    grad: Vec<f32>,
    device: Device,
    training: bool,
}

impl PoseNet {
    /// Creates a new `PoseNet` resident on the host, in training mode.
    ///
    /// # Arguments
    /// * `config` - The data shape and hidden widths.
    /// * `seed` - Seeds the parameter initialization and the dropout masks.
    pub fn new(config: PoseNetConfig, seed: u64) -> Result<Self> {
        config.validate()?;

        let (input, f) = (config.descriptor_len(), config.filters);
        let head = Sequential::new([
            Layer::dense((input, 2 * f), Some(ActFn::leaky_relu(LEAKY_SLOPE))),
            Layer::dropout(DROPOUT_RATE, seed.wrapping_add(1))?,
            Layer::dense((2 * f, f), Some(ActFn::leaky_relu(LEAKY_SLOPE))),
            Layer::dropout(DROPOUT_RATE, seed.wrapping_add(2))?,
            Layer::dense((f, config.class_count), None),
        ]);

        let size = head.size();
        let mut params = vec![0.; size];
        head.init_params(&mut params, &mut StdRng::seed_from_u64(seed))?;

        debug!("built pose net with {size} parameters for {config:?}");

        Ok(Self {
            config,
            head,
            params,
            grad: vec![0.; size],
            device: Device::cpu(),
            training: true,
        })
    }

    pub fn config(&self) -> &PoseNetConfig {
        &self.config
    }

    fn check_input(&self, batch: &PoseBatch) -> Result<()> {
        model::check_residency(&self.device, batch)?;

        let PoseNetConfig {
            frame_l,
            joint_n,
            joint_d,
            feat_d,
            ..
        } = self.config;
        let b = batch.len();

        if batch.features().shape() != [b, frame_l, feat_d] {
            return Err(MlErr::ShapeMismatch {
                what: "pose net features",
                got: batch.features().shape().to_vec(),
                expected: vec![b, frame_l, feat_d],
            });
        }

        if batch.geometry().shape() != [b, frame_l, joint_n, joint_d] {
            return Err(MlErr::ShapeMismatch {
                what: "pose net geometry",
                got: batch.geometry().shape().to_vec(),
                expected: vec![b, frame_l, joint_n, joint_d],
            });
        }

        Ok(())
    }
}

/// Summarizes every sequence of the batch into one row.
fn describe(
    features: ArrayView3<f32>,
    geometry: ArrayView4<f32>,
    width: usize,
    parallel: bool,
) -> Array2<f32> {
    let mut out = Array2::zeros((features.len_of(Axis(0)), width));

    let zip = Zip::from(out.axis_iter_mut(Axis(0)))
        .and(features.axis_iter(Axis(0)))
        .and(geometry.axis_iter(Axis(0)));

    if parallel {
        zip.par_for_each(describe_one);
    } else {
        zip.for_each(describe_one);
    }

    out
}

fn describe_one(mut row: ArrayViewMut1<f32>, features: ArrayView2<f32>, geometry: ArrayView3<f32>) {
    let (t, j, d) = geometry.dim();
    let pose = geometry.to_shape((t, j * d)).map(|p| p.to_owned());
    let Ok(pose) = pose else {
        return;
    };

    let feat_d = features.ncols();
    let jd = j * d;

    let mean_or_zeros = |a: ArrayView2<f32>| -> Array1<f32> {
        a.mean_axis(Axis(0)).unwrap_or_else(|| Array1::zeros(a.ncols()))
    };

    let slow = motion(pose.view());
    let fast = motion(pose.slice(s![..;2, ..]));

    row.slice_mut(s![..feat_d]).assign(&mean_or_zeros(features));
    row.slice_mut(s![feat_d..feat_d + jd]).assign(&mean_or_zeros(pose.view()));
    row.slice_mut(s![feat_d + jd..feat_d + 2 * jd]).assign(&slow);
    row.slice_mut(s![feat_d + 2 * jd..]).assign(&fast);
}

/// Mean absolute frame to frame difference, zeros for sequences shorter than two frames.
fn motion(pose: ArrayView2<f32>) -> Array1<f32> {
    let frames = pose.nrows();
    if frames < 2 {
        return Array1::zeros(pose.ncols());
    }

    let diff = &pose.slice(s![1.., ..]) - &pose.slice(s![..frames - 1, ..]);
    diff.mapv(f32::abs).sum_axis(Axis(0)) / (frames - 1) as f32
}

impl Model for PoseNet {
    fn size(&self) -> usize {
        self.params.len()
    }

    fn class_count(&self) -> usize {
        self.config.class_count
    }

    fn device(&self) -> &Device {
        &self.device
    }

    fn to_device(&mut self, device: Device) {
        if self.device != device {
            debug!("moving pose net from {} to {device}", self.device);
            self.device = device;
        }
    }

    fn is_training(&self) -> bool {
        self.training
    }

    fn set_training(&mut self, training: bool) {
        self.training = training;
    }

    fn forward(&mut self, batch: &PoseBatch) -> Result<Array2<f32>> {
        self.check_input(batch)?;

        let width = self.config.descriptor_len();
        let device = self.device.clone();
        let parallel = device.is_accelerator();
        let Self {
            head,
            params,
            training,
            ..
        } = self;

        device.run(|| {
            let x = describe(batch.features(), batch.geometry(), width, parallel);
            head.forward(params, x.view(), *training)
        })
    }

    fn backward(&mut self, d: ArrayView2<f32>) -> Result<()> {
        if d.ncols() != self.config.class_count {
            return Err(MlErr::ShapeMismatch {
                what: "pose net score derivative",
                got: d.shape().to_vec(),
                expected: vec![d.nrows(), self.config.class_count],
            });
        }

        let device = self.device.clone();
        let Self {
            head, params, grad, ..
        } = self;

        device.run(|| head.backward(params, grad, d.to_owned()).map(drop))
    }

    fn infer(&self, batch: &PoseBatch) -> Result<Array2<f32>> {
        self.check_input(batch)?;

        let width = self.config.descriptor_len();
        let parallel = self.device.is_accelerator();

        self.device.run(|| {
            let x = describe(batch.features(), batch.geometry(), width, parallel);
            self.head.infer(&self.params, x.view())
        })
    }

    fn zero_grad(&mut self) {
        self.grad.fill(0.);
    }

    fn params_and_grad(&mut self) -> (&mut [f32], &[f32]) {
        (&mut self.params, &self.grad)
    }

    fn parameters(&self) -> Vec<ParamView<'_>> {
        model::split_params(&self.params, self.head.param_shapes())
    }

    fn parameters_mut(&mut self) -> Vec<ParamViewMut<'_>> {
        model::split_params_mut(&mut self.params, self.head.param_shapes())
    }
}

#[cfg(test)]
mod tests {
    use ndarray::{Array1, Array3, Array4};

    use super::*;
    use crate::arch::loss::{CrossEntropy, LossFn};

    fn config() -> PoseNetConfig {
        PoseNetConfig {
            frame_l: 4,
            joint_n: 3,
            joint_d: 2,
            feat_d: 3,
            filters: 8,
            class_count: 3,
        }
    }

    fn batch(b: usize) -> PoseBatch {
        PoseBatch::new(
            Array3::from_shape_fn((b, 4, 3), |(i, t, f)| ((i + t + f) % 5) as f32 * 0.1),
            Array4::from_shape_fn((b, 4, 3, 2), |(i, t, j, d)| (i * t + j + d) as f32 * 0.05),
            Array1::from_iter((0..b).map(|i| i % 3)),
        )
        .unwrap()
    }

    #[test]
    fn descriptor_summarizes_motion() {
        // One joint in one dimension moving 0, 1, 3, 6.
        let features = Array3::<f32>::zeros((1, 4, 1));
        let geometry = Array4::from_shape_vec((1, 4, 1, 1), vec![0., 1., 3., 6.]).unwrap();

        let x = describe(features.view(), geometry.view(), 4, false);

        // [mean feature, mean pose, mean |step|, mean |two step|]
        assert_eq!(x.row(0).to_vec(), vec![0., 2.5, 2., 3.]);
        assert_eq!(x, describe(features.view(), geometry.view(), 4, true));
    }

    #[test]
    fn scores_every_class() {
        let mut net = PoseNet::new(config(), 0).unwrap();
        let scores = net.forward(&batch(5)).unwrap();

        assert_eq!(scores.dim(), (5, 3));
        assert_eq!(net.size(), (21 + 1) * 16 + (16 + 1) * 8 + (8 + 1) * 3);
    }

    #[test]
    fn infer_is_deterministic_and_matches_eval_forward() {
        let mut net = PoseNet::new(config(), 0).unwrap();
        net.eval_mode();

        let b = batch(4);
        let inferred = net.infer(&b).unwrap();
        assert_eq!(inferred, net.infer(&b).unwrap());
        assert_eq!(inferred, net.forward(&b).unwrap());
    }

    #[test]
    fn same_seed_same_parameters() {
        let a = PoseNet::new(config(), 9).unwrap();
        let b = PoseNet::new(config(), 9).unwrap();
        let c = PoseNet::new(config(), 10).unwrap();

        assert_eq!(a.params, b.params);
        assert_ne!(a.params, c.params);
    }

    #[test]
    fn rejects_batches_on_another_device() {
        let net = PoseNet::new(config(), 0).unwrap();
        let device = Device::parallel(2).unwrap();

        let err = net.infer(&batch(2).to_device(&device)).unwrap_err();
        assert!(matches!(err, MlErr::DeviceMismatch { .. }));
    }

    #[test]
    fn runs_on_the_parallel_backend() {
        let mut net = PoseNet::new(config(), 0).unwrap();
        net.eval_mode();
        let b = batch(3);
        let on_cpu = net.infer(&b).unwrap();

        let device = Device::parallel(2).unwrap();
        net.to_device(device.clone());
        let on_pool = net.infer(&b.to_device(&device)).unwrap();

        for (x, y) in on_cpu.iter().zip(on_pool.iter()) {
            assert!((x - y).abs() < 1e-5);
        }
    }

    #[test]
    fn rejects_wrong_geometry() {
        let net = PoseNet::new(config(), 0).unwrap();
        let b = PoseBatch::new(
            Array3::zeros((1, 4, 3)),
            Array4::zeros((1, 4, 2, 2)),
            Array1::zeros(1),
        )
        .unwrap();

        match net.infer(&b).unwrap_err() {
            MlErr::ShapeMismatch { got, expected, .. } => {
                assert_eq!(got, vec![1, 4, 2, 2]);
                assert_eq!(expected, vec![1, 4, 3, 2]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn a_few_steps_reduce_the_loss() {
        use crate::optimization::{Adam, Optimizer};

        let mut net = PoseNet::new(config(), 3).unwrap();
        let mut adam = Adam::with_defaults(net.size(), 0.01);
        let loss_fn = CrossEntropy::new();
        let b = batch(6);

        net.eval_mode();
        let before = loss_fn.loss(net.infer(&b).unwrap().view(), b.labels()).unwrap();

        for _ in 0..50 {
            net.zero_grad();
            let scores = net.forward(&b).unwrap();
            let d = loss_fn.loss_prime(scores.view(), b.labels()).unwrap();
            net.backward(d.view()).unwrap();
            let (params, grad) = net.params_and_grad();
            adam.update_params(grad, params).unwrap();
        }

        let after = loss_fn.loss(net.infer(&b).unwrap().view(), b.labels()).unwrap();
        assert!(after < before, "{after} should be lower than {before}");
    }

    #[test]
    fn parameters_are_named_and_cover_the_buffer() {
        let mut net = PoseNet::new(config(), 0).unwrap();
        let total: usize = net.parameters().iter().map(|p| p.values.len()).sum();
        assert_eq!(total, net.size());
        assert_eq!(net.parameters()[0].name, "layers.0.weight");
        assert_eq!(net.parameters()[0].shape, vec![21, 16]);

        for p in net.parameters_mut() {
            p.values.fill(0.);
        }
        assert!(net.params.iter().all(|&p| p == 0.));
    }
}
