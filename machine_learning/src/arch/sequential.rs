use ndarray::{Array2, ArrayView2};
use rand::Rng;

use super::layers::Layer;
use crate::{MlErr, Result};

/// A sequential model: information flows forward when computing an output and backward when
/// computing the *deltas* of its layers.
///
/// The layers don't own parameters, every pass receives the flat buffer and each layer works
/// on its own consecutive slice of it.
#[derive(Debug, Clone)]
pub struct Sequential {
    layers: Vec<Layer>,
}

impl Sequential {
    /// Creates a new `Sequential`.
    ///
    /// # Arguments
    /// * `layers` - The layers the sequential is composed of.
    ///
    /// # Returns
    /// A new `Sequential` instance.
    pub fn new<I>(layers: I) -> Self
    where
        I: IntoIterator<Item = Layer>,
    {
        Self {
            layers: layers.into_iter().collect(),
        }
    }

    /// Returns the amount of parameters in the network.
    pub fn size(&self) -> usize {
        self.layers.iter().map(Layer::size).sum()
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// Returns the name and shape of every parameter tensor, in buffer order.
    pub fn param_shapes(&self) -> Vec<(String, Vec<usize>)> {
        self.layers
            .iter()
            .enumerate()
            .flat_map(|(i, layer)| {
                layer
                    .param_shapes()
                    .into_iter()
                    .map(move |(name, shape)| (format!("layers.{i}.{name}"), shape))
            })
            .collect()
    }

    /// Initializes every layer's slice of `params`.
    pub fn init_params<R: Rng>(&self, params: &mut [f32], rng: &mut R) -> Result<()> {
        self.check_len("parameters", params.len())?;

        let mut rest = params;
        for layer in &self.layers {
            let (own, tail) = std::mem::take(&mut rest).split_at_mut(layer.size());
            if let Layer::Dense(dense) = layer {
                dense.init_params(own, rng)?;
            }
            rest = tail;
        }

        Ok(())
    }

    /// Makes a forward pass through the network.
    ///
    /// # Arguments
    /// * `params` - The network's parameters.
    /// * `x` - The input data.
    /// * `training` - Whether the stochastic layers are active.
    ///
    /// # Returns
    /// The prediction for the given input or an error if occurred.
    pub fn forward(
        &mut self,
        params: &[f32],
        x: ArrayView2<f32>,
        training: bool,
    ) -> Result<Array2<f32>> {
        self.check_len("parameters", params.len())?;

        let mut rest = params;
        let mut a = x.to_owned();

        for layer in self.layers.iter_mut() {
            let (own, tail) = rest.split_at(layer.size());
            a = layer.forward(own, a.view(), training)?;
            rest = tail;
        }

        Ok(a)
    }

    /// Makes a forward pass with evaluation semantics, recording nothing.
    pub fn infer(&self, params: &[f32], x: ArrayView2<f32>) -> Result<Array2<f32>> {
        self.check_len("parameters", params.len())?;

        let mut rest = params;
        let mut a = x.to_owned();

        for layer in &self.layers {
            let (own, tail) = rest.split_at(layer.size());
            a = layer.infer(own, a.view())?;
            rest = tail;
        }

        Ok(a)
    }

    /// Propagates `d` from the last layer to the first one, accumulating into `grad`.
    ///
    /// # Returns
    /// The derivative of the loss with respect to the network's input.
    pub fn backward(
        &mut self,
        params: &[f32],
        grad: &mut [f32],
        mut d: Array2<f32>,
    ) -> Result<Array2<f32>> {
        self.check_len("parameters", params.len())?;
        self.check_len("gradient", grad.len())?;

        let mut end = params.len();
        for layer in self.layers.iter_mut().rev() {
            let start = end - layer.size();
            d = layer.backward(&params[start..end], &mut grad[start..end], d)?;
            end = start;
        }

        Ok(d)
    }

    fn check_len(&self, what: &'static str, len: usize) -> Result<()> {
        let size = self.size();
        if len != size {
            return Err(MlErr::ShapeMismatch {
                what,
                got: vec![len],
                expected: vec![size],
            });
        }

        Ok(())
    }
}
