use super::LeakyRelu;

/// An element-wise activation function applied after a layer's affine transformation.
#[derive(Debug, Clone, Copy)]
pub enum ActFn {
    LeakyRelu(LeakyRelu),
}
use ActFn::*;

impl ActFn {
    pub fn leaky_relu(slope: f32) -> Self {
        LeakyRelu(LeakyRelu::new(slope))
    }

    pub fn f(&self, x: f32) -> f32 {
        match self {
            LeakyRelu(a) => a.f(x),
        }
    }

    pub fn df(&self, x: f32) -> f32 {
        match self {
            LeakyRelu(a) => a.df(x),
        }
    }
}
