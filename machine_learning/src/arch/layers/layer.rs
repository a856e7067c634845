use ndarray::{Array2, ArrayView2};

use super::{Dense, Dropout};
use crate::{Result, arch::activations::ActFn};

#[derive(Debug, Clone)]
pub enum Layer {
    Dense(Dense),
    Dropout(Dropout),
}
use Layer::*;

impl Layer {
    pub fn dense(dim: (usize, usize), act_fn: Option<ActFn>) -> Self {
        Dense(Dense::new(dim, act_fn))
    }

    pub fn dropout(rate: f32, seed: u64) -> Result<Self> {
        Ok(Dropout(Dropout::new(rate, seed)?))
    }

    /// Returns the amount of parameters of this layer.
    pub fn size(&self) -> usize {
        match self {
            Dense(l) => l.size(),
            Dropout(_) => 0,
        }
    }

    /// Returns the name and shape of every parameter tensor of this layer, in buffer order.
    pub fn param_shapes(&self) -> Vec<(&'static str, Vec<usize>)> {
        match self {
            Dense(l) => {
                let (n, m) = l.dim();
                vec![("weight", vec![n, m]), ("bias", vec![m])]
            }
            Dropout(_) => Vec::new(),
        }
    }

    pub fn forward(
        &mut self,
        params: &[f32],
        x: ArrayView2<f32>,
        training: bool,
    ) -> Result<Array2<f32>> {
        match self {
            Dense(l) => l.forward(params, x),
            Dropout(l) => Ok(l.forward(x, training)),
        }
    }

    pub fn infer(&self, params: &[f32], x: ArrayView2<f32>) -> Result<Array2<f32>> {
        match self {
            Dense(l) => l.infer(params, x),
            Dropout(l) => Ok(l.infer(x)),
        }
    }

    pub fn backward(
        &mut self,
        params: &[f32],
        grad: &mut [f32],
        d: Array2<f32>,
    ) -> Result<Array2<f32>> {
        match self {
            Dense(l) => l.backward(params, grad, d),
            Dropout(l) => l.backward(d),
        }
    }
}
