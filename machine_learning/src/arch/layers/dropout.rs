use ndarray::{Array2, ArrayView2};
use rand::{SeedableRng, rngs::StdRng};
use rand_distr::{Bernoulli, Distribution};

use crate::{MlErr, Result};

/// Inverted dropout: while training, zeroes each activation with probability `rate` and scales
/// the survivors by `1 / (1 - rate)`. Outside training it's the identity.
#[derive(Debug, Clone)]
pub struct Dropout {
    rate: f32,
    keep: Bernoulli,
    rng: StdRng,
    mask: Option<Array2<f32>>,
}

impl Dropout {
    /// Creates a new `Dropout` layer.
    ///
    /// # Arguments
    /// * `rate` - The probability of dropping an activation, in `[0, 1)`.
    /// * `seed` - The seed of the rng drawing the masks.
    pub fn new(rate: f32, seed: u64) -> Result<Self> {
        if !(0. ..1.).contains(&rate) {
            return Err(MlErr::InvalidConfig(format!(
                "dropout rate must be in [0, 1), got {rate}"
            )));
        }

        let keep = Bernoulli::new(1. - rate as f64)
            .map_err(|e| MlErr::InvalidConfig(format!("dropout: {e}")))?;

        Ok(Self {
            rate,
            keep,
            rng: StdRng::seed_from_u64(seed),
            mask: None,
        })
    }

    pub fn forward(&mut self, x: ArrayView2<f32>, training: bool) -> Array2<f32> {
        if !training || self.rate == 0. {
            self.mask = None;
            return x.to_owned();
        }

        let scale = 1. / (1. - self.rate);
        let Self { keep, rng, .. } = self;
        let mask = Array2::from_shape_simple_fn(x.raw_dim(), || {
            if keep.sample(&mut *rng) { scale } else { 0. }
        });

        let y = &x * &mask;
        self.mask = Some(mask);
        y
    }

    pub fn infer(&self, x: ArrayView2<f32>) -> Array2<f32> {
        x.to_owned()
    }

    pub fn backward(&mut self, d: Array2<f32>) -> Result<Array2<f32>> {
        let Some(mask) = self.mask.take() else {
            return Ok(d);
        };

        if mask.dim() != d.dim() {
            return Err(MlErr::ShapeMismatch {
                what: "dropout output derivative",
                got: d.shape().to_vec(),
                expected: mask.shape().to_vec(),
            });
        }

        Ok(d * &mask)
    }
}
