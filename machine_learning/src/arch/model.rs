use ndarray::{Array2, ArrayView2};

use crate::{MlErr, Result, device::Device, tensor::PoseBatch};

/// A named parameter tensor borrowed from a model's flat buffer.
#[derive(Debug, Clone)]
pub struct ParamView<'a> {
    pub name: String,
    pub shape: Vec<usize>,
    pub values: &'a [f32],
}

/// A named parameter tensor mutably borrowed from a model's flat buffer.
#[derive(Debug)]
pub struct ParamViewMut<'a> {
    pub name: String,
    pub shape: Vec<usize>,
    pub values: &'a mut [f32],
}

/// A pose sequence classifier.
///
/// Parameters live in one flat buffer owned by the model. Training goes through `forward` and
/// `backward`, which record intermediate state; evaluation and timing go through `infer`, which
/// only reads the model.
pub trait Model: Send {
    /// Returns the amount of parameters in the model.
    fn size(&self) -> usize;

    /// Returns the amount of classes the model scores.
    fn class_count(&self) -> usize;

    fn device(&self) -> &Device;

    /// Binds the model to `device`, following computations run there.
    fn to_device(&mut self, device: Device);

    fn is_training(&self) -> bool;

    fn set_training(&mut self, training: bool);

    fn train_mode(&mut self) {
        self.set_training(true);
    }

    fn eval_mode(&mut self) {
        self.set_training(false);
    }

    /// Scores every example of `batch`, keeping what's needed for the backward pass.
    ///
    /// # Returns
    /// The scores, shaped `(B, class_count)`, or an error if the batch isn't resident on the
    /// model's device or has the wrong shape.
    fn forward(&mut self, batch: &PoseBatch) -> Result<Array2<f32>>;

    /// Accumulates the gradient of the loss into the model's gradient buffer.
    ///
    /// # Arguments
    /// * `d` - The derivative of the loss with respect to the scores of the last `forward`.
    fn backward(&mut self, d: ArrayView2<f32>) -> Result<()>;

    /// Scores every example of `batch` with evaluation semantics and without recording anything.
    fn infer(&self, batch: &PoseBatch) -> Result<Array2<f32>>;

    /// Resets the gradient buffer.
    fn zero_grad(&mut self);

    /// Returns the parameters alongside the gradient, both laid out the same way.
    fn params_and_grad(&mut self) -> (&mut [f32], &[f32]);

    /// Returns every parameter tensor in buffer order.
    fn parameters(&self) -> Vec<ParamView<'_>>;

    fn parameters_mut(&mut self) -> Vec<ParamViewMut<'_>>;
}

/// Fails with `MlErr::DeviceMismatch` unless `batch` is resident on `device`.
pub fn check_residency(device: &Device, batch: &PoseBatch) -> Result<()> {
    if batch.device() != device {
        return Err(MlErr::DeviceMismatch {
            model: device.to_string(),
            input: batch.device().to_string(),
        });
    }

    Ok(())
}

/// Cuts `buf` into named views following `shapes`, in order.
pub(crate) fn split_params<'a>(
    buf: &'a [f32],
    shapes: Vec<(String, Vec<usize>)>,
) -> Vec<ParamView<'a>> {
    let mut rest = buf;

    shapes
        .into_iter()
        .map(|(name, shape)| {
            let len = shape.iter().product::<usize>().min(rest.len());
            let (values, tail) = rest.split_at(len);
            rest = tail;
            ParamView {
                name,
                shape,
                values,
            }
        })
        .collect()
}

pub(crate) fn split_params_mut<'a>(
    buf: &'a mut [f32],
    shapes: Vec<(String, Vec<usize>)>,
) -> Vec<ParamViewMut<'a>> {
    let mut rest = buf;

    shapes
        .into_iter()
        .map(|(name, shape)| {
            let len = shape.iter().product::<usize>().min(rest.len());
            let (values, tail) = std::mem::take(&mut rest).split_at_mut(len);
            rest = tail;
            ParamViewMut {
                name,
                shape,
                values,
            }
        })
        .collect()
}
