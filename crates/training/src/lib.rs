//! Training orchestration for the marker regressor.
//!
//! [`TrainingOrchestrator::train`] splits a loaded dataset 80/20, runs the
//! configured epochs of Adam on the Huber loss, reports through
//! [`TrainingCallbacks`] and registers the result as a trained artifact.
//! [`spawn_training`] runs the same loop on a worker thread and turns the
//! callbacks into a bounded stream of [`TrainingEvent`]s.
//!
//! Every step's tensors are registered in a [`TensorScope`] that is released
//! when the step returns, so the ledger reads zero between steps.

#![recursion_limit = "256"]

pub mod callbacks;
pub mod config;
pub mod orchestrator;
pub mod worker;

pub use callbacks::{EpochMetrics, TrainingCallbacks};
pub use config::TrainConfig;
pub use data_contracts::CancelToken;
pub use models::{MemoryLedger, TensorScope};
pub use orchestrator::{TrainingOrchestrator, TrainingOutcome};
pub use worker::{spawn_training, TrainingEvent, TrainingHandle};

use thiserror::Error;

/// Backend used for training and for models the registry hands out.
pub type TrainBackend = burn::backend::NdArray<f32>;
pub type ADBackend = burn::backend::Autodiff<TrainBackend>;

pub type TrainingResult<T> = Result<T, TrainingError>;

#[derive(Debug, Error)]
pub enum TrainingError {
    #[error("dataset is empty")]
    EmptyDataset,
    #[error("training was cancelled")]
    Cancelled,
    #[error(transparent)]
    Dataset(#[from] marker_dataset::DatasetError),
    #[error(transparent)]
    Model(#[from] models::ModelError),
    #[error(transparent)]
    Registry(#[from] model_registry::RegistryError),
    #[error("training worker failed: {0}")]
    Worker(String),
}
