use serde::Serialize;

use super::EvalSummary;

/// The scalars recorded for one completed epoch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EpochMetrics {
    pub epoch: usize,
    /// The sum of the per batch training losses.
    pub train_loss_sum: f32,
    pub test_loss_avg: f32,
    pub test_accuracy: f32,
}

/// An append-only record of every completed epoch.
///
/// Only the training and evaluation loops write to it: the training loop stages the epoch's
/// loss and the evaluation loop commits the whole entry once its pass succeeded.
#[derive(Debug, Default, Clone)]
pub struct History {
    entries: Vec<EpochMetrics>,
    staged: Option<(usize, f32)>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[EpochMetrics] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn train_loss(&self) -> Vec<f32> {
        self.entries.iter().map(|e| e.train_loss_sum).collect()
    }

    pub fn test_loss(&self) -> Vec<f32> {
        self.entries.iter().map(|e| e.test_loss_avg).collect()
    }

    pub fn test_acc(&self) -> Vec<f32> {
        self.entries.iter().map(|e| e.test_accuracy).collect()
    }

    /// Returns the position in the series of the highest accuracy and the accuracy itself, the
    /// first one on ties.
    pub fn best_accuracy(&self) -> Option<(usize, f32)> {
        self.entries
            .iter()
            .enumerate()
            .fold(None, |best, (i, e)| match best {
                Some((_, acc)) if acc >= e.test_accuracy => best,
                _ => Some((i, e.test_accuracy)),
            })
    }

    pub(crate) fn record_train(&mut self, epoch: usize, train_loss_sum: f32) {
        self.staged = Some((epoch, train_loss_sum));
    }

    /// Appends the staged epoch completed with `summary`.
    ///
    /// An evaluation without a staged training pass is recorded as the next epoch with a NaN
    /// training loss.
    pub(crate) fn commit_eval(&mut self, summary: &EvalSummary) {
        let (epoch, train_loss_sum) = self
            .staged
            .take()
            .unwrap_or((self.entries.len() + 1, f32::NAN));

        self.entries.push(EpochMetrics {
            epoch,
            train_loss_sum,
            test_loss_avg: summary.loss,
            test_accuracy: summary.accuracy,
        });
    }

    pub(crate) fn discard_staged(&mut self) {
        self.staged = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(loss: f32, accuracy: f32) -> EvalSummary {
        EvalSummary {
            loss,
            correct: 0,
            total: 0,
            accuracy,
        }
    }

    #[test]
    fn commit_joins_the_staged_train_loss() {
        let mut history = History::new();
        history.record_train(1, 12.5);
        history.commit_eval(&summary(0.4, 0.7));

        assert_eq!(
            history.entries(),
            &[EpochMetrics {
                epoch: 1,
                train_loss_sum: 12.5,
                test_loss_avg: 0.4,
                test_accuracy: 0.7,
            }]
        );
    }

    #[test]
    fn discarded_epochs_leave_no_trace() {
        let mut history = History::new();
        history.record_train(1, 3.);
        history.commit_eval(&summary(0.3, 0.5));

        history.record_train(2, 2.);
        history.discard_staged();

        assert_eq!(history.len(), 1);
        assert_eq!(history.train_loss(), vec![3.]);

        history.commit_eval(&summary(0.2, 0.6));
        assert_eq!(history.entries()[1].epoch, 2);
        assert!(history.entries()[1].train_loss_sum.is_nan());
    }

    #[test]
    fn best_accuracy_takes_the_first_maximum() {
        let mut history = History::new();
        for (i, acc) in [0.2, 0.8, 0.5, 0.8].into_iter().enumerate() {
            history.record_train(i + 1, 1.);
            history.commit_eval(&summary(1., acc));
        }

        assert_eq!(history.best_accuracy(), Some((1, 0.8)));
        assert_eq!(History::new().best_accuracy(), None);
    }
}
