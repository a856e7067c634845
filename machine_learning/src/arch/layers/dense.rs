use ndarray::{Array2, ArrayView1, ArrayView2, ArrayViewMut1, ArrayViewMut2, Axis, linalg};
use rand::Rng;
use rand_distr::{Distribution, Uniform};

use crate::{MlErr, Result, arch::activations::ActFn};

/// A fully connected layer, `a = act_fn(x · w + b)`.
///
/// The layer doesn't own its parameters, it views a slice of the model's flat parameter buffer
/// laid out as `[w (n × m, row major) | b (m)]`.
///
/// Optimizations:
///   1. Find a way to not copy `x` in each `Dense::forward` call.
#[derive(Debug, Clone)]
pub struct Dense {
    dim: (usize, usize),
    act_fn: Option<ActFn>,
    size: usize,

    // Forward metadata
    x: Option<Array2<f32>>,
    z: Array2<f32>,
}

impl Dense {
    /// Creates a new `Dense` layer.
    ///
    /// # Arguments
    /// * `dim` - The amount of inputs and outputs of the layer.
    /// * `act_fn` - An optional activation function applied to the output.
    pub fn new(dim: (usize, usize), act_fn: Option<ActFn>) -> Self {
        Self {
            dim,
            size: (dim.0 + 1) * dim.1,
            act_fn,
            x: None,
            z: Array2::zeros((0, dim.1)),
        }
    }

    /// Returns the size of this layer.
    ///
    /// # Returns
    /// The amount of parameters this layer has.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn dim(&self) -> (usize, usize) {
        self.dim
    }

    /// Fills `params` with values drawn from `U(-1/√n, 1/√n)`, `n` being the fan in.
    pub fn init_params<R: Rng>(&self, params: &mut [f32], rng: &mut R) -> Result<()> {
        let bound = 1. / (self.dim.0.max(1) as f32).sqrt();
        let dist = Uniform::new_inclusive(-bound, bound)
            .map_err(|e| MlErr::InvalidConfig(format!("dense init: {e}")))?;

        for p in params.iter_mut() {
            *p = dist.sample(rng);
        }

        Ok(())
    }

    /// Makes a forward pass through the layer, keeping what's needed for the backward pass.
    pub fn forward(&mut self, params: &[f32], x: ArrayView2<f32>) -> Result<Array2<f32>> {
        let z = self.affine(params, x)?;
        let a = self.activate(&z);

        self.x = Some(x.to_owned());
        self.z = z;
        Ok(a)
    }

    /// Makes a forward pass through the layer without recording anything.
    pub fn infer(&self, params: &[f32], x: ArrayView2<f32>) -> Result<Array2<f32>> {
        let z = self.affine(params, x)?;
        Ok(self.activate(&z))
    }

    /// Accumulates this layer's gradient into `grad` and propagates `d` to the previous layer.
    ///
    /// # Arguments
    /// * `params` - This layer's parameters.
    /// * `grad` - This layer's slice of the gradient buffer, added to, never overwritten.
    /// * `d` - The derivative of the loss with respect to this layer's output.
    ///
    /// # Returns
    /// The derivative of the loss with respect to this layer's input.
    pub fn backward(
        &mut self,
        params: &[f32],
        grad: &mut [f32],
        mut d: Array2<f32>,
    ) -> Result<Array2<f32>> {
        let x = self.x.take().ok_or(MlErr::BackwardBeforeForward)?;

        if d.dim() != self.z.dim() {
            return Err(MlErr::ShapeMismatch {
                what: "dense output derivative",
                got: d.shape().to_vec(),
                expected: self.z.shape().to_vec(),
            });
        }

        if let Some(act_fn) = &self.act_fn {
            d.zip_mut_with(&self.z, |d, &z| *d *= act_fn.df(z));
        }

        let (mut dw, mut db) = self.view_grad(grad)?;
        linalg::general_mat_mul(1.0, &x.t(), &d, 1.0, &mut dw);
        db += &d.sum_axis(Axis(0));

        let (w, _) = self.view_params(params)?;
        Ok(d.dot(&w.t()))
    }

    fn affine(&self, params: &[f32], x: ArrayView2<f32>) -> Result<Array2<f32>> {
        if x.ncols() != self.dim.0 {
            return Err(MlErr::ShapeMismatch {
                what: "dense input",
                got: x.shape().to_vec(),
                expected: vec![x.nrows(), self.dim.0],
            });
        }

        let (w, b) = self.view_params(params)?;
        Ok(x.dot(&w) + &b)
    }

    fn activate(&self, z: &Array2<f32>) -> Array2<f32> {
        match &self.act_fn {
            Some(act_fn) => z.mapv(|z| act_fn.f(z)),
            None => z.clone(),
        }
    }

    /// Gives a view of the raw gradient slice as the delta weights and delta biases of this layer.
    ///
    /// # Arguments
    /// * `grad` - A gradient slice.
    ///
    /// # Returns
    /// A tuple containing the delta weights and delta biases.
    fn view_grad<'a>(
        &self,
        grad: &'a mut [f32],
    ) -> Result<(ArrayViewMut2<'a, f32>, ArrayViewMut1<'a, f32>)> {
        self.check_len("dense gradient", grad.len())?;

        let w_size = self.size - self.dim.1;
        let (dw_raw, db_raw) = grad.split_at_mut(w_size);
        let dw = ArrayViewMut2::from_shape(self.dim, dw_raw).map_err(|_| self.bad_view())?;
        let db = ArrayViewMut1::from_shape(self.dim.1, db_raw).map_err(|_| self.bad_view())?;
        Ok((dw, db))
    }

    /// Gives a view of the raw parameter slice as the weights and biases of this layer.
    ///
    /// # Arguments
    /// * `params` - A slice of parameters.
    ///
    /// # Returns
    /// A tuple containing the weights and biases.
    fn view_params<'a>(
        &self,
        params: &'a [f32],
    ) -> Result<(ArrayView2<'a, f32>, ArrayView1<'a, f32>)> {
        self.check_len("dense parameters", params.len())?;

        let w_size = self.size - self.dim.1;
        let weights = ArrayView2::from_shape(self.dim, &params[..w_size]).map_err(|_| self.bad_view())?;
        let biases = ArrayView1::from_shape(self.dim.1, &params[w_size..]).map_err(|_| self.bad_view())?;
        Ok((weights, biases))
    }

    fn check_len(&self, what: &'static str, len: usize) -> Result<()> {
        if len != self.size {
            return Err(MlErr::ShapeMismatch {
                what,
                got: vec![len],
                expected: vec![self.size],
            });
        }

        Ok(())
    }

    fn bad_view(&self) -> MlErr {
        MlErr::ShapeMismatch {
            what: "dense weights",
            got: vec![self.size],
            expected: vec![self.dim.0, self.dim.1],
        }
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    // w = [[1, 2], [3, 4]], b = [0.5, -0.5]
    const PARAMS: [f32; 6] = [1., 2., 3., 4., 0.5, -0.5];

    #[test]
    fn forward_is_affine() {
        let mut layer = Dense::new((2, 2), None);
        let y = layer.forward(&PARAMS, array![[1., 1.]].view()).unwrap();

        assert_eq!(y, array![[4.5, 5.5]]);
        assert_eq!(layer.infer(&PARAMS, array![[1., 1.]].view()).unwrap(), y);
    }

    #[test]
    fn backward_accumulates_gradient() {
        let mut layer = Dense::new((2, 2), None);
        let mut grad = [0.; 6];

        for _ in 0..2 {
            layer.forward(&PARAMS, array![[1., 2.]].view()).unwrap();
            let dx = layer
                .backward(&PARAMS, &mut grad, array![[1., 0.]])
                .unwrap();
            assert_eq!(dx, array![[1., 3.]]);
        }

        // dw = x^T d, db = d, both added twice.
        assert_eq!(grad, [2., 0., 4., 0., 2., 0.]);
    }

    #[test]
    fn activation_gates_the_derivative() {
        let mut layer = Dense::new((1, 1), Some(ActFn::leaky_relu(0.1)));
        let params = [1., 0.];
        let mut grad = [0.; 2];

        let y = layer.forward(&params, array![[-2.]].view()).unwrap();
        assert!((y[[0, 0]] + 0.2).abs() < 1e-6);

        layer.backward(&params, &mut grad, array![[1.]]).unwrap();
        assert!((grad[0] + 0.2).abs() < 1e-6);
        assert!((grad[1] - 0.1).abs() < 1e-6);
    }

    #[test]
    fn rejects_wrong_input_width() {
        let mut layer = Dense::new((2, 2), None);
        let err = layer.forward(&PARAMS, array![[1., 2., 3.]].view()).unwrap_err();

        match err {
            MlErr::ShapeMismatch { got, expected, .. } => {
                assert_eq!(got, vec![1, 3]);
                assert_eq!(expected, vec![1, 2]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn backward_needs_a_forward_pass() {
        let mut layer = Dense::new((2, 2), None);
        let mut grad = [0.; 6];

        let err = layer.backward(&PARAMS, &mut grad, array![[1., 0.]]).unwrap_err();
        assert!(matches!(err, MlErr::BackwardBeforeForward));
    }
}
