use crate::{frame_rgb, BackendKind, DetectionError, Detector};
use data_contracts::{DetectionResult, Keypoint};
use image::RgbImage;
use tracing::{debug, info};
use vision_core::interfaces::Frame;

/// COCO body landmarks, in model output order.
pub const COCO_KEYPOINTS: [&str; 17] = [
    "nose",
    "left_eye",
    "right_eye",
    "left_ear",
    "right_ear",
    "left_shoulder",
    "right_shoulder",
    "left_elbow",
    "right_elbow",
    "left_wrist",
    "right_wrist",
    "left_hip",
    "right_hip",
    "left_knee",
    "right_knee",
    "left_ankle",
    "right_ankle",
];

/// Pretrained single-person pose model behind [`PoseLandmarkDetector`].
pub trait PoseEngine: Send {
    fn name(&self) -> &str;
    fn load(&mut self) -> Result<(), DetectionError>;
    /// One `[x, y, score]` per entry of [`COCO_KEYPOINTS`], normalized to the image.
    fn infer(&mut self, image: &RgbImage) -> Result<Vec<[f32; 3]>, DetectionError>;
}

pub struct PoseLandmarkDetector {
    engine: Box<dyn PoseEngine>,
    initialized: bool,
}

impl PoseLandmarkDetector {
    pub fn new(engine: Box<dyn PoseEngine>) -> Self {
        Self {
            engine,
            initialized: false,
        }
    }

    /// The full keypoint set for one frame, always [`COCO_KEYPOINTS`]`.len()` long.
    pub fn detect_keypoints(&mut self, frame: &Frame) -> Result<Vec<Keypoint>, DetectionError> {
        if !self.initialized {
            return Err(DetectionError::NotInitialized {
                backend: BackendKind::PoseLandmark,
            });
        }
        let rgb = frame_rgb(frame)?;
        let raw = self.engine.infer(&rgb)?;
        if raw.len() != COCO_KEYPOINTS.len() {
            return Err(DetectionError::Engine(format!(
                "{} returned {} keypoints, expected {}",
                self.engine.name(),
                raw.len(),
                COCO_KEYPOINTS.len()
            )));
        }
        Ok(raw
            .into_iter()
            .zip(COCO_KEYPOINTS)
            .map(|([x, y, score], name)| Keypoint {
                name: name.to_string(),
                x: x.clamp(0.0, 1.0),
                y: y.clamp(0.0, 1.0),
                score: score.clamp(0.0, 1.0),
            })
            .collect())
    }
}

impl Detector for PoseLandmarkDetector {
    fn kind(&self) -> BackendKind {
        BackendKind::PoseLandmark
    }

    fn init(&mut self) -> Result<(), DetectionError> {
        self.engine.load()?;
        info!(engine = self.engine.name(), "pose landmark detector ready");
        self.initialized = true;
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// One zero-area result per keypoint, labelled with the landmark name.
    fn detect(&mut self, frame: &Frame) -> Result<Vec<DetectionResult>, DetectionError> {
        let keypoints = self.detect_keypoints(frame)?;
        debug!(frame = frame.id, "pose keypoints");
        Ok(keypoints
            .into_iter()
            .map(|k| DetectionResult::from_bbox([k.x, k.y, k.x, k.y], k.score, k.name, frame.timestamp))
            .collect())
    }
}

/// Recover keypoints from pose detections, in order.
pub fn keypoints_from_detections(detections: &[DetectionResult]) -> Vec<Keypoint> {
    detections
        .iter()
        .map(|d| Keypoint {
            name: d.class_label.clone(),
            x: d.x,
            y: d.y,
            score: d.confidence,
        })
        .collect()
}
