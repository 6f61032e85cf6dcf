use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Live bookkeeping for a single training call. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingRun {
    pub epoch: usize,
    pub total_epochs: usize,
    pub batches_complete: usize,
    pub total_batches: usize,
    pub current_loss: f32,
    pub best_loss: Option<f32>,
    pub elapsed: Duration,
    pub estimated_remaining: Option<Duration>,
}

impl TrainingRun {
    pub fn new(total_epochs: usize, total_batches: usize) -> Self {
        Self {
            total_epochs,
            total_batches,
            ..Default::default()
        }
    }

    /// `100 * (epoch + 1) / total_epochs` for the epoch that just finished.
    pub fn percent_complete(&self) -> f32 {
        if self.total_epochs == 0 {
            return 100.0;
        }
        100.0 * (self.epoch + 1) as f32 / self.total_epochs as f32
    }

    pub fn record_loss(&mut self, loss: f32) {
        self.current_loss = loss;
        if loss.is_finite() && self.best_loss.is_none_or(|best| loss < best) {
            self.best_loss = Some(loss);
        }
    }

    /// Update elapsed time and extrapolate the remaining time from finished steps.
    pub fn update_timing(&mut self, elapsed: Duration) {
        self.elapsed = elapsed;
        let done = self.epoch * self.total_batches + self.batches_complete;
        let total = self.total_epochs * self.total_batches;
        self.estimated_remaining = if done == 0 || total == 0 {
            None
        } else {
            let per_step = elapsed.as_secs_f64() / done as f64;
            Some(Duration::from_secs_f64(
                per_step * total.saturating_sub(done) as f64,
            ))
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_best_loss_and_eta() {
        let mut run = TrainingRun::new(2, 4);
        run.record_loss(0.5);
        run.record_loss(0.7);
        assert_eq!(run.best_loss, Some(0.5));
        run.batches_complete = 4;
        run.update_timing(Duration::from_secs(4));
        assert_eq!(run.estimated_remaining, Some(Duration::from_secs(4)));
        assert_eq!(run.percent_complete(), 50.0);
    }
}
