use log::info;
use machine_learning::{
    arch::{
        Model,
        loss::{CrossEntropy, LossFn},
    },
    dataloader::DataLoader,
};
use ndarray::{Array1, Array2, ArrayView2, Axis};

use super::History;
use crate::Result;

/// The outcome of an evaluation pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvalSummary {
    /// The summed loss divided by the dataset size.
    pub loss: f32,
    pub correct: usize,
    pub total: usize,
    /// `correct / total`, in `[0, 1]`.
    pub accuracy: f32,
}

/// Runs a full inference pass over `loader` with the model in evaluation mode.
///
/// The epoch's entry is committed to `history` only if the whole pass succeeds, a failure
/// drops the staged training loss and leaves the committed entries untouched.
pub fn evaluate<M: Model + ?Sized>(
    model: &mut M,
    loader: &mut DataLoader,
    history: &mut History,
) -> Result<EvalSummary> {
    model.eval_mode();

    let summary = match run(&*model, loader) {
        Ok(summary) => summary,
        Err(e) => {
            history.discard_staged();
            return Err(e);
        }
    };

    info!(
        "Test set: Average loss: {:.4}, Accuracy: {}/{} ({:.2}%)",
        summary.loss,
        summary.correct,
        summary.total,
        100. * summary.accuracy
    );

    history.commit_eval(&summary);
    Ok(summary)
}

fn run<M: Model + ?Sized>(model: &M, loader: &mut DataLoader) -> Result<EvalSummary> {
    let loss_fn = CrossEntropy::sum();
    let total = loader.dataset().len();

    let mut loss_sum = 0.0f64;
    let mut correct = 0;

    for batch in loader.iter() {
        let batch = batch.to_device(model.device());
        let scores = model.infer(&batch)?;

        loss_sum += loss_fn.loss(scores.view(), batch.labels())? as f64;
        correct += argmax(scores.view())
            .iter()
            .zip(batch.labels())
            .filter(|(pred, label)| pred == label)
            .count();
    }

    Ok(EvalSummary {
        loss: (loss_sum / total as f64) as f32,
        correct,
        total,
        accuracy: correct as f32 / total as f32,
    })
}

/// Returns the index of the highest score of every row, the first one on ties.
fn argmax(scores: ArrayView2<f32>) -> Array1<usize> {
    scores.map_axis(Axis(1), |row| {
        row.iter()
            .enumerate()
            .fold((0, f32::NEG_INFINITY), |(best, max), (i, &x)| {
                if x > max { (i, x) } else { (best, max) }
            })
            .0
    })
}

/// Counts the predictions of `model` over `loader`.
///
/// # Returns
/// A `(C, C)` matrix where the entry `(i, j)` counts the examples of class `i` predicted as `j`.
pub fn confusion_matrix<M: Model + ?Sized>(
    model: &M,
    loader: &mut DataLoader,
) -> Result<Array2<usize>> {
    let classes = model.class_count();
    let mut matrix = Array2::zeros((classes, classes));

    for batch in loader.iter() {
        let batch = batch.to_device(model.device());
        let scores = model.infer(&batch)?;

        for (pred, &label) in argmax(scores.view()).iter().zip(batch.labels()) {
            if label < classes && *pred < classes {
                matrix[[label, *pred]] += 1;
            }
        }
    }

    Ok(matrix)
}
