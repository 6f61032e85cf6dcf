//! Shared data contracts for labels, dataset validation, model artifacts and tracking output.

pub mod artifact;
pub mod cancel;
pub mod dataset;
pub mod detection;
pub mod label;
pub mod manifest;
pub mod training;

pub use artifact::{ArtifactKind, ArtifactMetrics, ModelArtifact, ARTIFACT_SCHEMA_VERSION};
pub use cancel::CancelToken;
pub use dataset::{
    DatasetFiles, DatasetRecord, DatasetStats, IssueKind, ValidationCode, ValidationIssue,
    ValidationResult, ValidationStatus,
};
pub use detection::{ColorThreshold, DetectionResult, Keypoint, StickEndpoint, TrackingFrame};
pub use label::{BoxLabel, LabelError, LabelLayout, LabelVector};
pub use manifest::DatasetManifest;
pub use training::TrainingRun;
