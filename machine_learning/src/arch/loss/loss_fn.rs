use ndarray::{Array2, ArrayView1, ArrayView2};

use crate::Result;

/// A classification loss over per-class scores.
pub trait LossFn {
    /// Computes the loss of `scores`, shaped `(B, C)`, against the class `labels`, shaped `(B,)`.
    fn loss(&self, scores: ArrayView2<f32>, labels: ArrayView1<usize>) -> Result<f32>;

    /// Computes the derivative of the loss with respect to every score.
    fn loss_prime(&self, scores: ArrayView2<f32>, labels: ArrayView1<usize>)
    -> Result<Array2<f32>>;
}
