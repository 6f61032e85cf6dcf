//! Single-file model format: descriptor and base64 weights in one JSON object.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use models::{ArchitectureDescriptor, ModelError};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinedModelFile {
    pub descriptor: ArchitectureDescriptor,
    /// Base64 of the Burn record bytes.
    pub weights: String,
}

impl CombinedModelFile {
    pub fn new(descriptor: ArchitectureDescriptor, weights: &[u8]) -> Self {
        Self {
            descriptor,
            weights: STANDARD.encode(weights),
        }
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self, ModelError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    pub fn to_json(&self) -> Result<Vec<u8>, ModelError> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn weight_bytes(&self) -> Result<Vec<u8>, ModelError> {
        STANDARD
            .decode(self.weights.trim())
            .map_err(|e| ModelError::MissingWeights(format!("weights are not valid base64: {e}")))
    }
}
