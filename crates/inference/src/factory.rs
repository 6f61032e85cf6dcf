use crate::custom::CustomRegressorDetector;
use crate::general::{GeneralObjectDetector, ObjectEngine};
use crate::pose::{PoseEngine, PoseLandmarkDetector};
use crate::{BackendKind, DetectionError, Detector, InferenceBackend};
use model_registry::ActiveModel;
use models::MemoryLedger;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectorSettings {
    pub min_confidence: f32,
    pub iou_thresh: f32,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            min_confidence: 0.5,
            iou_thresh: 0.5,
        }
    }
}

type ObjectEngineCtor = Box<dyn Fn() -> Result<Box<dyn ObjectEngine>, DetectionError> + Send + Sync>;
type PoseEngineCtor = Box<dyn Fn() -> Result<Box<dyn PoseEngine>, DetectionError> + Send + Sync>;

/// Builds detectors by [`BackendKind`].
///
/// Pretrained engines are injected as constructors so the factory stays
/// independent of any particular runtime.
pub struct DetectorFactory {
    active: ActiveModel<InferenceBackend>,
    ledger: Arc<MemoryLedger>,
    settings: DetectorSettings,
    object_engine: Option<ObjectEngineCtor>,
    pose_engine: Option<PoseEngineCtor>,
}

impl DetectorFactory {
    pub fn new(active: ActiveModel<InferenceBackend>, ledger: Arc<MemoryLedger>) -> Self {
        Self {
            active,
            ledger,
            settings: DetectorSettings::default(),
            object_engine: None,
            pose_engine: None,
        }
    }

    pub fn with_settings(mut self, settings: DetectorSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_object_engine<F>(mut self, ctor: F) -> Self
    where
        F: Fn() -> Result<Box<dyn ObjectEngine>, DetectionError> + Send + Sync + 'static,
    {
        self.object_engine = Some(Box::new(ctor));
        self
    }

    pub fn with_pose_engine<F>(mut self, ctor: F) -> Self
    where
        F: Fn() -> Result<Box<dyn PoseEngine>, DetectionError> + Send + Sync + 'static,
    {
        self.pose_engine = Some(Box::new(ctor));
        self
    }

    /// An uninitialized detector for `kind`; call [`Detector::init`] before use.
    pub fn build(&self, kind: BackendKind) -> Result<Box<dyn Detector>, DetectionError> {
        match kind {
            BackendKind::Custom => Ok(Box::new(CustomRegressorDetector::new(
                self.active.clone(),
                Default::default(),
                Arc::clone(&self.ledger),
            ))),
            BackendKind::GeneralDetector => {
                let ctor = self.object_engine.as_ref().ok_or_else(|| missing_engine(kind))?;
                let engine = ctor()?;
                Ok(Box::new(
                    GeneralObjectDetector::new(engine, self.settings.min_confidence)
                        .with_iou_thresh(self.settings.iou_thresh),
                ))
            }
            BackendKind::PoseLandmark => Ok(Box::new(self.build_pose()?)),
        }
    }

    /// The concrete pose detector, for callers that need whole keypoint sets.
    pub fn build_pose(&self) -> Result<PoseLandmarkDetector, DetectionError> {
        let ctor = self
            .pose_engine
            .as_ref()
            .ok_or_else(|| missing_engine(BackendKind::PoseLandmark))?;
        Ok(PoseLandmarkDetector::new(ctor()?))
    }
}

fn missing_engine(kind: BackendKind) -> DetectionError {
    DetectionError::Engine(format!("no engine configured for the {kind} backend"))
}
