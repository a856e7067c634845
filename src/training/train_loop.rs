use std::num::NonZeroUsize;

use log::info;
use machine_learning::{
    arch::{Model, loss::LossFn},
    dataloader::DataLoader,
    optimization::Optimizer,
};

use super::History;
use crate::Result;

/// How a training pass reports progress and when it stops early.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrainOptions {
    /// Batches between two progress records.
    pub log_interval: NonZeroUsize,
    /// Stops the pass right after the first progress record.
    pub dry_run: bool,
}

/// Runs one training pass over `loader`.
///
/// Every batch is moved to the model's device, then the gradient is reset, recomputed and
/// applied by `optimizer`. The epoch's loss is staged in `history` to be committed by the
/// evaluation pass.
///
/// # Arguments
/// * `model` - The model to train.
/// * `loader` - The training batches.
/// * `optimizer` - The optimizer that dictates how to update the parameters on each batch.
/// * `loss_fn` - The loss function, expected to average over the batch.
/// * `epoch` - The 1-based epoch number, used for logging.
/// * `options` - The logging and dry run options.
/// * `history` - Where the epoch's loss is staged.
///
/// # Returns
/// The sum of the per batch losses.
pub fn train_epoch<M, O, L>(
    model: &mut M,
    loader: &mut DataLoader,
    optimizer: &mut O,
    loss_fn: &L,
    epoch: usize,
    options: &TrainOptions,
    history: &mut History,
) -> Result<f32>
where
    M: Model + ?Sized,
    O: Optimizer + ?Sized,
    L: LossFn + ?Sized,
{
    model.train_mode();

    let num_batches = loader.len();
    let total = loader.dataset().len();
    let mut train_loss = 0.0;

    for (batch_idx, batch) in loader.iter().enumerate() {
        let batch = batch.to_device(model.device());

        model.zero_grad();
        let scores = model.forward(&batch)?;
        let loss = loss_fn.loss(scores.view(), batch.labels())?;
        train_loss += loss;

        let d = loss_fn.loss_prime(scores.view(), batch.labels())?;
        model.backward(d.view())?;

        let (params, grad) = model.params_and_grad();
        optimizer.update_params(grad, params)?;

        if batch_idx % options.log_interval.get() == 0 {
            info!(
                "Train Epoch: {epoch} [{}/{total} ({:.0}%)]\tLoss: {loss:.6}",
                batch_idx * batch.len(),
                100. * batch_idx as f32 / num_batches as f32,
            );

            if options.dry_run {
                break;
            }
        }
    }

    history.record_train(epoch, train_loss);
    Ok(train_loss)
}
