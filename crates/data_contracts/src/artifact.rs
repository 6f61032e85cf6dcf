use serde::{Deserialize, Serialize};

/// Bumped when the persisted artifact layout changes.
pub const ARTIFACT_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Trained,
    Uploaded,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArtifactMetrics {
    pub final_loss: f32,
    pub final_val_loss: Option<f32>,
    pub best_loss: Option<f32>,
    pub mse: Option<f32>,
    pub epochs: usize,
    pub samples: usize,
}

/// Registry entry for a persisted model (architecture descriptor + weights).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub id: u64,
    pub name: String,
    pub description: String,
    pub created_at_ms: u64,
    /// Key prefix inside the artifact store.
    pub storage_path: String,
    pub kind: ArtifactKind,
    pub version: u32,
    pub framework_version: String,
    #[serde(default)]
    pub metrics: Option<ArtifactMetrics>,
}

impl ModelArtifact {
    pub fn descriptor_key(&self) -> String {
        format!("{}/model.json", self.storage_path)
    }

    pub fn weights_key(&self) -> String {
        format!("{}/weights.bin", self.storage_path)
    }
}
