//! Burn models for marker localization.
//!
//! - [`MarkerRegressor`]: three conv blocks and a dense head ending in a
//!   sigmoid, so every output is already a normalized coordinate.
//! - [`huber_loss`] / [`mse_metric`]: training objective and reporting metric.
//! - [`MemoryLedger`] / [`TensorScope`]: scoped accounting of live tensors.
//! - [`ArchitectureDescriptor`]: the JSON half of a persisted model; weights
//!   travel separately as Burn record bytes.
//!
//! These are plain Burn modules. The `inference` crate wraps them into
//! detectors and the `training` crate fits them.

pub mod descriptor;
pub mod loss;
pub mod memory;
pub mod regressor;

pub use descriptor::{model_from_bytes, model_to_bytes, ArchitectureDescriptor, DESCRIPTOR_FORMAT};
pub use loss::{huber_loss, mse_metric, DEFAULT_HUBER_DELTA};
pub use memory::{LedgerSnapshot, MemoryLedger, TensorScope};
pub use regressor::{MarkerRegressor, MarkerRegressorConfig, MarkerRegressorRecord};

use thiserror::Error;

pub type ModelResult<T> = Result<T, ModelError>;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("shape mismatch: expected {expected}, found {found}")]
    ShapeMismatch { expected: String, found: String },
    #[error("model weights are missing: {0}")]
    MissingWeights(String),
    #[error("model has not been initialized")]
    Uninitialized,
    #[error("weight record error: {0}")]
    Record(String),
    #[error("architecture descriptor error: {0}")]
    Descriptor(#[from] serde_json::Error),
}

pub mod prelude {
    pub use super::{
        huber_loss, mse_metric, ArchitectureDescriptor, MarkerRegressor, MarkerRegressorConfig, ModelError,
    };
}
