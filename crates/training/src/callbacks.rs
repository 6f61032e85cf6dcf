use data_contracts::TrainingRun;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpochMetrics {
    /// Mean training loss over the epoch's batches.
    pub loss: f32,
    /// Mean Huber loss on the held-out split, when there is one.
    pub val_loss: Option<f32>,
    /// Mean squared error on the held-out split, reported only.
    pub val_mse: Option<f32>,
}

/// Hooks invoked by the fit loop, in order: `on_epoch_begin`, `on_batch_end`
/// per step, `on_epoch_end`, then `on_progress`.
pub trait TrainingCallbacks {
    fn on_epoch_begin(&mut self, _epoch: usize, _total_batches: usize, _run: &TrainingRun) {}
    fn on_batch_end(&mut self, _batch: usize, _loss: f32, _run: &TrainingRun) {}
    fn on_epoch_end(&mut self, _epoch: usize, _metrics: &EpochMetrics, _run: &TrainingRun) {}
    /// `percent` is `100 * (epoch + 1) / total_epochs`.
    fn on_progress(&mut self, _percent: f32, _run: &TrainingRun) {}
}

impl TrainingCallbacks for () {}
