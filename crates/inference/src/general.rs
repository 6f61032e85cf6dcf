use crate::{frame_rgb, BackendKind, DetectionError, Detector};
use data_contracts::DetectionResult;
use image::RgbImage;
use tracing::{debug, info};
use vision_core::interfaces::Frame;

/// One candidate from a pretrained detector, in source-image pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDetection {
    /// `[x0, y0, x1, y1]` in pixels.
    pub bbox_px: [f32; 4],
    pub score: f32,
    pub class_label: String,
}

/// Pretrained multi-class detector behind [`GeneralObjectDetector`].
pub trait ObjectEngine: Send {
    fn name(&self) -> &str;
    fn load(&mut self) -> Result<(), DetectionError>;
    /// Candidates in the pixel space of `image`.
    fn infer(&mut self, image: &RgbImage) -> Result<Vec<RawDetection>, DetectionError>;
}

pub struct GeneralObjectDetector {
    engine: Box<dyn ObjectEngine>,
    min_confidence: f32,
    iou_thresh: f32,
    initialized: bool,
}

impl GeneralObjectDetector {
    pub fn new(engine: Box<dyn ObjectEngine>, min_confidence: f32) -> Self {
        Self {
            engine,
            min_confidence,
            iou_thresh: 0.5,
            initialized: false,
        }
    }

    pub fn with_iou_thresh(mut self, iou_thresh: f32) -> Self {
        self.iou_thresh = iou_thresh;
        self
    }

    pub fn min_confidence(&self) -> f32 {
        self.min_confidence
    }
}

impl Detector for GeneralObjectDetector {
    fn kind(&self) -> BackendKind {
        BackendKind::GeneralDetector
    }

    fn init(&mut self) -> Result<(), DetectionError> {
        self.engine.load()?;
        info!(engine = self.engine.name(), min_confidence = self.min_confidence, "object detector ready");
        self.initialized = true;
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn detect(&mut self, frame: &Frame) -> Result<Vec<DetectionResult>, DetectionError> {
        if !self.initialized {
            return Err(DetectionError::NotInitialized {
                backend: BackendKind::GeneralDetector,
            });
        }
        let rgb = frame_rgb(frame)?;
        let raw: Vec<RawDetection> = self
            .engine
            .infer(&rgb)?
            .into_iter()
            .filter(|d| d.score >= self.min_confidence)
            .collect();
        let boxes: Vec<[f32; 4]> = raw.iter().map(|d| d.bbox_px).collect();
        let scores: Vec<f32> = raw.iter().map(|d| d.score).collect();
        let keep = nms(&boxes, &scores, self.iou_thresh);

        let (w, h) = (frame.width().max(1) as f32, frame.height().max(1) as f32);
        let results: Vec<DetectionResult> = keep
            .into_iter()
            .map(|i| {
                let d = &raw[i];
                let [x0, y0, x1, y1] = d.bbox_px;
                DetectionResult::from_bbox([x0 / w, y0 / h, x1 / w, y1 / h], d.score, d.class_label.clone(), frame.timestamp)
            })
            .collect();
        debug!(frame = frame.id, count = results.len(), "object detections");
        Ok(results)
    }
}

/// Greedy NMS over `[x0,y0,x1,y1]` boxes; returns kept indices, best score first.
pub fn nms(boxes: &[[f32; 4]], scores: &[f32], iou_thresh: f32) -> Vec<usize> {
    let mut idxs: Vec<usize> = (0..boxes.len().min(scores.len())).collect();
    // Ascending, so `pop` yields the highest score.
    idxs.sort_by(|a, b| scores[*a].partial_cmp(&scores[*b]).unwrap_or(std::cmp::Ordering::Equal));

    let mut keep = Vec::new();
    while let Some(i) = idxs.pop() {
        keep.push(i);
        idxs.retain(|&j| iou(&boxes[i], &boxes[j]) <= iou_thresh);
    }
    keep
}

pub fn iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
    let x0 = a[0].max(b[0]);
    let y0 = a[1].max(b[1]);
    let x1 = a[2].min(b[2]);
    let y1 = a[3].min(b[3]);
    let inter = (x1 - x0).max(0.0) * (y1 - y0).max(0.0);
    let area_a = (a[2] - a[0]).max(0.0) * (a[3] - a[1]).max(0.0);
    let area_b = (b[2] - b[0]).max(0.0) * (b[3] - b[1]).max(0.0);
    let union = area_a + area_b - inter + 1e-6;
    inter / union
}

/// Label set of COCO-trained detectors, indexed by class id.
pub const COCO_CLASSES: [&str; 80] = [
    "person", "bicycle", "car", "motorcycle", "airplane", "bus", "train", "truck", "boat",
    "traffic light", "fire hydrant", "stop sign", "parking meter", "bench", "bird", "cat", "dog",
    "horse", "sheep", "cow", "elephant", "bear", "zebra", "giraffe", "backpack", "umbrella",
    "handbag", "tie", "suitcase", "frisbee", "skis", "snowboard", "sports ball", "kite",
    "baseball bat", "baseball glove", "skateboard", "surfboard", "tennis racket", "bottle",
    "wine glass", "cup", "fork", "knife", "spoon", "bowl", "banana", "apple", "sandwich", "orange",
    "broccoli", "carrot", "hot dog", "pizza", "donut", "cake", "chair", "couch", "potted plant",
    "bed", "dining table", "toilet", "tv", "laptop", "mouse", "remote", "keyboard", "cell phone",
    "microwave", "oven", "toaster", "sink", "refrigerator", "book", "clock", "vase", "scissors",
    "teddy bear", "hair drier", "toothbrush",
];

/// `names`, or [`COCO_CLASSES`] when none are configured.
pub fn class_names_or_coco(names: Vec<String>) -> Vec<String> {
    if names.is_empty() {
        COCO_CLASSES.iter().map(|s| s.to_string()).collect()
    } else {
        names
    }
}
