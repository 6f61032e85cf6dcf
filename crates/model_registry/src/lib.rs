//! Model registry: persisted artifacts plus one explicitly owned active model.
//!
//! The registry is an ordinary value ([`ModelStore`]) over an injected
//! key-value backend ([`ArtifactStore`]). Each artifact lives under its own
//! key prefix as `model.json` (architecture descriptor) and `weights.bin`
//! (Burn record bytes); the artifact list itself is a small JSON index.

pub mod envelope;
pub mod kv;
pub mod store;

pub use envelope::CombinedModelFile;
pub use kv::{ArtifactStore, FsArtifactStore, MemoryArtifactStore};
pub use store::{ActiveModel, LoadedModel, ModelStore, RegistryIndex, INDEX_KEY};

use std::path::PathBuf;
use thiserror::Error;

pub type RegistryResult<T> = Result<T, RegistryError>;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("storage io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("registry json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("no model artifact with id {id}")]
    NotFound { id: u64 },
    #[error("invalid storage key `{0}`")]
    InvalidKey(String),
    #[error(transparent)]
    Model(#[from] models::ModelError),
}

impl RegistryError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        RegistryError::Io {
            path: path.into(),
            source,
        }
    }
}
