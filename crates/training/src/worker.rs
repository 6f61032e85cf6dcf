//! Background training with a typed event stream.

use crate::callbacks::{EpochMetrics, TrainingCallbacks};
use crate::config::TrainConfig;
use crate::orchestrator::{TrainingOrchestrator, TrainingOutcome};
use crate::{TrainingError, TrainingResult};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use data_contracts::{CancelToken, ModelArtifact, TrainingRun};
use marker_dataset::LoadedSample;
use std::thread::JoinHandle;
use tracing::{debug, error};

const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub enum TrainingEvent {
    EpochBegin { epoch: usize, total_batches: usize },
    BatchEnd { batch: usize, loss: f32, run: TrainingRun },
    EpochEnd { epoch: usize, metrics: EpochMetrics, run: TrainingRun },
    Progress { percent: f32, run: TrainingRun },
    Finished { artifact: ModelArtifact },
    Cancelled,
    Failed { message: String },
}

/// Forwards callbacks into a bounded channel. Per-batch events are dropped
/// when the consumer lags; epoch-level events always block until delivered.
struct ChannelCallbacks {
    tx: Sender<TrainingEvent>,
    dropped: usize,
}

impl ChannelCallbacks {
    fn send(&self, event: TrainingEvent) {
        // A disconnected receiver just means nobody is listening.
        let _ = self.tx.send(event);
    }
}

impl TrainingCallbacks for ChannelCallbacks {
    fn on_epoch_begin(&mut self, epoch: usize, total_batches: usize, _run: &TrainingRun) {
        self.send(TrainingEvent::EpochBegin { epoch, total_batches });
    }

    fn on_batch_end(&mut self, batch: usize, loss: f32, run: &TrainingRun) {
        let event = TrainingEvent::BatchEnd {
            batch,
            loss,
            run: run.clone(),
        };
        if let Err(TrySendError::Full(_)) = self.tx.try_send(event) {
            self.dropped += 1;
        }
    }

    fn on_epoch_end(&mut self, epoch: usize, metrics: &EpochMetrics, run: &TrainingRun) {
        self.send(TrainingEvent::EpochEnd {
            epoch,
            metrics: *metrics,
            run: run.clone(),
        });
    }

    fn on_progress(&mut self, percent: f32, run: &TrainingRun) {
        self.send(TrainingEvent::Progress {
            percent,
            run: run.clone(),
        });
    }
}

pub struct TrainingHandle {
    events: Receiver<TrainingEvent>,
    cancel: CancelToken,
    join: JoinHandle<TrainingResult<TrainingOutcome>>,
}

impl TrainingHandle {
    pub fn events(&self) -> &Receiver<TrainingEvent> {
        &self.events
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Wait for the worker and return its outcome.
    pub fn join(self) -> TrainingResult<TrainingOutcome> {
        self.join
            .join()
            .map_err(|_| TrainingError::Worker("training thread panicked".to_string()))?
    }
}

/// Run `orchestrator.train` on a worker thread.
pub fn spawn_training(
    orchestrator: TrainingOrchestrator,
    dataset: Vec<LoadedSample>,
    config: TrainConfig,
) -> TrainingResult<TrainingHandle> {
    let (tx, rx) = bounded(EVENT_CAPACITY);
    let cancel = CancelToken::new();
    let worker_cancel = cancel.clone();
    let join = std::thread::Builder::new()
        .name("training".to_string())
        .spawn(move || {
            let mut callbacks = ChannelCallbacks { tx, dropped: 0 };
            let result = orchestrator.train(dataset, &config, &mut callbacks, &worker_cancel);
            let terminal = match &result {
                Ok(outcome) => TrainingEvent::Finished {
                    artifact: outcome.artifact.clone(),
                },
                Err(TrainingError::Cancelled) => TrainingEvent::Cancelled,
                Err(e) => {
                    error!(error = %e, "training failed");
                    TrainingEvent::Failed {
                        message: e.to_string(),
                    }
                }
            };
            if callbacks.dropped > 0 {
                debug!(dropped = callbacks.dropped, "batch events dropped by slow consumer");
            }
            callbacks.send(terminal);
            result
        })
        .map_err(|e| TrainingError::Worker(e.to_string()))?;
    Ok(TrainingHandle {
        events: rx,
        cancel,
        join,
    })
}
