use ndarray::{Array2, ArrayView1, ArrayView2, Axis};

use super::LossFn;
use crate::{MlErr, Result};

/// How the per-example losses of a batch are combined.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Reduction {
    #[default]
    Mean,
    Sum,
}

/// Softmax cross entropy over raw class scores.
#[derive(Debug, Default, Clone, Copy)]
pub struct CrossEntropy {
    reduction: Reduction,
}

impl CrossEntropy {
    /// Returns a new `CrossEntropy` averaging over the batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a new `CrossEntropy` summing over the batch.
    pub fn sum() -> Self {
        Self {
            reduction: Reduction::Sum,
        }
    }

    pub fn reduction(&self) -> Reduction {
        self.reduction
    }

    fn check(&self, scores: &ArrayView2<f32>, labels: &ArrayView1<usize>) -> Result<()> {
        if scores.nrows() != labels.len() {
            return Err(MlErr::ShapeMismatch {
                what: "scores against labels",
                got: scores.shape().to_vec(),
                expected: vec![labels.len(), scores.ncols()],
            });
        }

        let classes = scores.ncols();
        if let Some(&label) = labels.iter().find(|&&label| label >= classes) {
            return Err(MlErr::LabelOutOfRange { label, classes });
        }

        Ok(())
    }

    fn scale(&self, batch: usize) -> f32 {
        match self.reduction {
            Reduction::Mean => 1. / batch.max(1) as f32,
            Reduction::Sum => 1.,
        }
    }
}

/// Computes `log(softmax(row))` for every row in a numerically stable way.
fn log_softmax(scores: ArrayView2<f32>) -> Array2<f32> {
    let mut out = scores.to_owned();

    for mut row in out.axis_iter_mut(Axis(0)) {
        let max = row.fold(f32::NEG_INFINITY, |m, &x| m.max(x));
        let log_sum = row.fold(0., |acc, &x| acc + (x - max).exp()).ln() + max;
        row.mapv_inplace(|x| x - log_sum);
    }

    out
}

impl LossFn for CrossEntropy {
    fn loss(&self, scores: ArrayView2<f32>, labels: ArrayView1<usize>) -> Result<f32> {
        self.check(&scores, &labels)?;

        let log_probs = log_softmax(scores);
        let total: f32 = labels
            .iter()
            .enumerate()
            .map(|(i, &label)| -log_probs[[i, label]])
            .sum();

        Ok(total * self.scale(labels.len()))
    }

    fn loss_prime(
        &self,
        scores: ArrayView2<f32>,
        labels: ArrayView1<usize>,
    ) -> Result<Array2<f32>> {
        self.check(&scores, &labels)?;

        // d/dz of -log(softmax(z)[y]) is softmax(z) - onehot(y).
        let mut d = log_softmax(scores).mapv_into(f32::exp);
        for (i, &label) in labels.iter().enumerate() {
            d[[i, label]] -= 1.;
        }

        d *= self.scale(labels.len());
        Ok(d)
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    #[test]
    fn uniform_scores_cost_log_classes() {
        let scores = array![[0., 0., 0., 0.], [1., 1., 1., 1.]];
        let labels = array![0, 3];

        let mean = CrossEntropy::new().loss(scores.view(), labels.view()).unwrap();
        let sum = CrossEntropy::sum().loss(scores.view(), labels.view()).unwrap();

        assert!((mean - 4f32.ln()).abs() < 1e-6);
        assert!((sum - 2. * 4f32.ln()).abs() < 1e-5);
    }

    #[test]
    fn stable_for_large_scores() {
        let scores = array![[1000., 0.]];
        let loss = CrossEntropy::new().loss(scores.view(), array![0].view()).unwrap();

        assert!(loss.is_finite());
        assert!(loss < 1e-6);
    }

    #[test]
    fn derivative_rows_sum_to_zero() {
        let scores = array![[0.3, -1.2, 2.0], [0.0, 0.5, 0.1]];
        let d = CrossEntropy::new()
            .loss_prime(scores.view(), array![2, 0].view())
            .unwrap();

        for row in d.rows() {
            assert!(row.sum().abs() < 1e-6);
        }
        assert!(d[[0, 2]] < 0. && d[[1, 0]] < 0.);
    }

    #[test]
    fn derivative_matches_finite_differences() {
        let scores = array![[0.3, -1.2, 2.0]];
        let labels = array![1];
        let ce = CrossEntropy::new();
        let d = ce.loss_prime(scores.view(), labels.view()).unwrap();

        let h = 1e-2;
        for j in 0..3 {
            let mut up = scores.clone();
            let mut down = scores.clone();
            up[[0, j]] += h;
            down[[0, j]] -= h;

            let numeric = (ce.loss(up.view(), labels.view()).unwrap()
                - ce.loss(down.view(), labels.view()).unwrap())
                / (2. * h);
            assert!((numeric - d[[0, j]]).abs() < 1e-3);
        }
    }

    #[test]
    fn rejects_labels_out_of_range() {
        let err = CrossEntropy::new()
            .loss(array![[0., 0.]].view(), array![2].view())
            .unwrap_err();

        assert!(matches!(err, MlErr::LabelOutOfRange { label: 2, classes: 2 }));
    }

    #[test]
    fn rejects_mismatched_batch_extents() {
        let err = CrossEntropy::new()
            .loss(array![[0., 0.]].view(), array![0, 1].view())
            .unwrap_err();

        match err {
            MlErr::ShapeMismatch { got, expected, .. } => {
                assert_eq!(got, vec![1, 2]);
                assert_eq!(expected, vec![2, 2]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
