//! ONNX Runtime engines for the pretrained backends.

use crate::general::{class_names_or_coco, ObjectEngine, RawDetection, COCO_CLASSES};
use crate::pose::{PoseEngine, COCO_KEYPOINTS};
use crate::DetectionError;
use image::imageops::{self, FilterType};
use image::RgbImage;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;
use std::path::{Path, PathBuf};
use tracing::info;

fn engine_err(e: impl std::fmt::Display) -> DetectionError {
    DetectionError::Engine(e.to_string())
}

fn open_session(path: &Path) -> Result<Session, DetectionError> {
    let session = Session::builder()
        .map_err(engine_err)?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(engine_err)?
        .commit_from_file(path)
        .map_err(engine_err)?;
    info!(model = %path.display(), "onnx session loaded");
    Ok(session)
}

/// MoveNet single-pose: `[1, 192, 192, 3]` in, `[1, 1, 17, 3]` (y, x, score) out.
pub struct MoveNetEngine {
    model_path: PathBuf,
    session: Option<Session>,
}

const MOVENET_SIZE: u32 = 192;

impl MoveNetEngine {
    pub fn new(model_path: impl Into<PathBuf>) -> Self {
        Self {
            model_path: model_path.into(),
            session: None,
        }
    }
}

impl PoseEngine for MoveNetEngine {
    fn name(&self) -> &str {
        "movenet"
    }

    fn load(&mut self) -> Result<(), DetectionError> {
        self.session = Some(open_session(&self.model_path)?);
        Ok(())
    }

    fn infer(&mut self, image: &RgbImage) -> Result<Vec<[f32; 3]>, DetectionError> {
        let session = self
            .session
            .as_mut()
            .ok_or_else(|| DetectionError::Engine("movenet session not loaded".into()))?;
        let resized = imageops::resize(image, MOVENET_SIZE, MOVENET_SIZE, FilterType::Triangle);
        let data: Vec<f32> = resized.into_raw().into_iter().map(f32::from).collect();
        let side = MOVENET_SIZE as usize;
        let input = Tensor::from_array((vec![1, side, side, 3], data)).map_err(engine_err)?;
        let outputs = session.run(ort::inputs![input]).map_err(engine_err)?;
        let (_, values) = outputs[0].try_extract_tensor::<f32>().map_err(engine_err)?;
        if values.len() < COCO_KEYPOINTS.len() * 3 {
            return Err(DetectionError::Engine(format!("movenet output has {} values", values.len())));
        }
        Ok(values
            .chunks_exact(3)
            .take(COCO_KEYPOINTS.len())
            .map(|kp| [kp[1], kp[0], kp[2]])
            .collect())
    }
}

/// YOLOv8 export: `[1, 3, S, S]` in, `[1, 4 + classes, anchors]` out.
pub struct YoloV8Engine {
    model_path: PathBuf,
    input_size: u32,
    class_names: Vec<String>,
    session: Option<Session>,
}

impl YoloV8Engine {
    /// An empty `class_names` labels detections with [`COCO_CLASSES`].
    pub fn new(model_path: impl Into<PathBuf>, class_names: Vec<String>) -> Self {
        Self {
            model_path: model_path.into(),
            input_size: 640,
            class_names: class_names_or_coco(class_names),
            session: None,
        }
    }

    pub fn with_input_size(mut self, size: u32) -> Self {
        self.input_size = size;
        self
    }

    fn label(&self, class: usize) -> String {
        self.class_names
            .get(class)
            .cloned()
            .unwrap_or_else(|| format!("class_{class}"))
    }
}

impl ObjectEngine for YoloV8Engine {
    fn name(&self) -> &str {
        "yolov8"
    }

    fn load(&mut self) -> Result<(), DetectionError> {
        self.session = Some(open_session(&self.model_path)?);
        Ok(())
    }

    fn infer(&mut self, image: &RgbImage) -> Result<Vec<RawDetection>, DetectionError> {
        let size = self.input_size;
        let session = self
            .session
            .as_mut()
            .ok_or_else(|| DetectionError::Engine("yolov8 session not loaded".into()))?;
        let resized = imageops::resize(image, size, size, FilterType::Triangle);
        let side = size as usize;
        let plane = side * side;
        let mut data = vec![0f32; plane * 3];
        for (x, y, px) in resized.enumerate_pixels() {
            let idx = y as usize * side + x as usize;
            for c in 0..3 {
                data[c * plane + idx] = px[c] as f32 / 255.0;
            }
        }
        let input = Tensor::from_array((vec![1, 3, side, side], data)).map_err(engine_err)?;
        let outputs = session.run(ort::inputs![input]).map_err(engine_err)?;
        let (shape, values) = outputs[0].try_extract_tensor::<f32>().map_err(engine_err)?;
        if shape.len() != 3 || shape[1] < 5 {
            return Err(DetectionError::Engine(format!("unexpected yolov8 output shape {shape:?}")));
        }
        let (rows, anchors) = (shape[1] as usize, shape[2] as usize);
        let sx = image.width() as f32 / size as f32;
        let sy = image.height() as f32 / size as f32;

        let mut candidates = Vec::new();
        for a in 0..anchors {
            let at = |row: usize| values[row * anchors + a];
            let (class, score) = (4..rows)
                .map(|r| (r - 4, at(r)))
                .fold((0, f32::MIN), |best, cur| if cur.1 > best.1 { cur } else { best });
            // The detector applies its own minimum later.
            if score < 0.05 {
                continue;
            }
            let (cx, cy, w, h) = (at(0), at(1), at(2), at(3));
            candidates.push((
                [(cx - w * 0.5) * sx, (cy - h * 0.5) * sy, (cx + w * 0.5) * sx, (cy + h * 0.5) * sy],
                score,
                class,
            ));
        }
        drop(outputs);
        Ok(candidates
            .into_iter()
            .map(|(bbox_px, score, class)| RawDetection {
                bbox_px,
                score,
                class_label: self.label(class),
            })
            .collect())
    }
}
