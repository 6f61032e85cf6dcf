//! Detector backends for per-frame inference.
//!
//! Every backend implements [`Detector`]: `init` once, then `detect` per
//! frame. "Nothing found" is an empty vector, never an error. Backends are
//! chosen through [`DetectorFactory`] by [`BackendKind`].

#![recursion_limit = "256"]

pub mod custom;
pub mod factory;
pub mod general;
pub mod pose;

#[cfg(feature = "onnx")]
pub mod onnx;

pub use custom::CustomRegressorDetector;
pub use factory::{DetectorFactory, DetectorSettings};
pub use general::{class_names_or_coco, nms, GeneralObjectDetector, ObjectEngine, RawDetection, COCO_CLASSES};
pub use pose::{keypoints_from_detections, PoseEngine, PoseLandmarkDetector, COCO_KEYPOINTS};

use data_contracts::DetectionResult;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use vision_core::interfaces::Frame;

/// Backend used for in-process Burn inference.
pub type InferenceBackend = burn::backend::NdArray<f32>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// The registry's active trained/uploaded regressor.
    Custom,
    /// A pretrained multi-class object detector.
    GeneralDetector,
    /// A pretrained body-pose landmark model.
    PoseLandmark,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Custom => "custom",
            BackendKind::GeneralDetector => "general_detector",
            BackendKind::PoseLandmark => "pose_landmark",
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum DetectionError {
    #[error("{backend} detector used before init()")]
    NotInitialized { backend: BackendKind },
    #[error(transparent)]
    Model(#[from] models::ModelError),
    #[error("inference engine error: {0}")]
    Engine(String),
    #[error("frame {id} is malformed: {reason}")]
    InvalidFrame { id: u64, reason: String },
}

pub trait Detector: Send {
    fn kind(&self) -> BackendKind;
    fn init(&mut self) -> Result<(), DetectionError>;
    fn is_initialized(&self) -> bool;
    /// Detections in normalized coordinates; empty when nothing was found.
    fn detect(&mut self, frame: &Frame) -> Result<Vec<DetectionResult>, DetectionError>;
}

pub(crate) fn frame_rgb(frame: &Frame) -> Result<image::RgbImage, DetectionError> {
    frame.to_rgb_image().ok_or_else(|| DetectionError::InvalidFrame {
        id: frame.id,
        reason: format!("{} bytes for {}x{}", frame.rgba.len(), frame.size.0, frame.size.1),
    })
}

pub mod prelude {
    pub use crate::{
        BackendKind, CustomRegressorDetector, DetectionError, Detector, DetectorFactory, DetectorSettings,
        GeneralObjectDetector, ObjectEngine, PoseEngine, PoseLandmarkDetector,
    };
}
