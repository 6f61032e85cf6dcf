use crate::{frame_rgb, BackendKind, DetectionError, Detector, InferenceBackend};
use burn::tensor::backend::Backend;
use burn::tensor::{Tensor, TensorData};
use data_contracts::DetectionResult;
use image::imageops::{self, FilterType};
use image::RgbImage;
use model_registry::ActiveModel;
use models::{MemoryLedger, ModelError};
use std::sync::Arc;
use tracing::{debug, info};
use vision_core::interfaces::Frame;

/// Runs the registry's active regressor on each frame.
///
/// The active slot is locked for the whole forward pass, so a concurrent
/// switch or delete waits for the frame to finish.
pub struct CustomRegressorDetector<B: Backend = InferenceBackend> {
    active: ActiveModel<B>,
    device: B::Device,
    ledger: Arc<MemoryLedger>,
    class_label: String,
    initialized: bool,
}

impl<B: Backend> CustomRegressorDetector<B> {
    pub fn new(active: ActiveModel<B>, device: B::Device, ledger: Arc<MemoryLedger>) -> Self {
        Self {
            active,
            device,
            ledger,
            class_label: "marker".to_string(),
            initialized: false,
        }
    }

    pub fn with_class_label(mut self, label: impl Into<String>) -> Self {
        self.class_label = label.into();
        self
    }

    fn frame_tensor(&self, rgb: &RgbImage, (w, h): (usize, usize)) -> Tensor<B, 4> {
        let resized = if rgb.dimensions() == (w as u32, h as u32) {
            rgb.clone()
        } else {
            imageops::resize(rgb, w as u32, h as u32, FilterType::Triangle)
        };
        let plane = w * h;
        let mut data = vec![0f32; plane * 3];
        for (x, y, px) in resized.enumerate_pixels() {
            let idx = y as usize * w + x as usize;
            data[idx] = px[0] as f32 / 255.0;
            data[plane + idx] = px[1] as f32 / 255.0;
            data[2 * plane + idx] = px[2] as f32 / 255.0;
        }
        Tensor::from_data(TensorData::new(data, [1, 3, h, w]), &self.device)
    }

    fn to_results(&self, outputs: &[f32], timestamp: f64) -> Vec<DetectionResult> {
        match outputs.len() {
            4 => vec![box_result(&outputs[..4], stability(outputs), &self.class_label, timestamp)],
            10 => outputs
                .chunks_exact(5)
                .enumerate()
                .filter(|(_, chunk)| chunk[4] >= 0.5)
                .map(|(i, chunk)| {
                    let label = format!("{}_end_{i}", self.class_label);
                    box_result(&chunk[..4], stability(chunk), &label, timestamp)
                })
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// Mean distance of the sigmoid outputs from 0.5, scaled to 0..1.
pub fn stability(outputs: &[f32]) -> f32 {
    if outputs.is_empty() {
        return 0.0;
    }
    let sum: f32 = outputs.iter().map(|o| (o - 0.5).abs()).sum();
    (sum / outputs.len() as f32 * 2.0).clamp(0.0, 1.0)
}

fn box_result(b: &[f32], confidence: f32, label: &str, timestamp: f64) -> DetectionResult {
    let (x, y, w, h) = (b[0], b[1], b[2], b[3]);
    let mut result = DetectionResult::from_bbox(
        [x - w * 0.5, y - h * 0.5, x + w * 0.5, y + h * 0.5],
        confidence,
        label,
        timestamp,
    );
    // The regressed centre is authoritative even when the box gets clamped.
    result.x = x.clamp(0.0, 1.0);
    result.y = y.clamp(0.0, 1.0);
    result
}

impl<B: Backend> Detector for CustomRegressorDetector<B> {
    fn kind(&self) -> BackendKind {
        BackendKind::Custom
    }

    fn init(&mut self) -> Result<(), DetectionError> {
        let artifact = self.active.artifact().ok_or(ModelError::Uninitialized)?;
        info!(id = artifact.id, name = %artifact.name, "custom regressor detector ready");
        self.initialized = true;
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn detect(&mut self, frame: &Frame) -> Result<Vec<DetectionResult>, DetectionError> {
        if !self.initialized {
            return Err(DetectionError::NotInitialized {
                backend: BackendKind::Custom,
            });
        }
        let rgb = frame_rgb(frame)?;
        let guard = self.active.lock();
        let loaded = guard.as_ref().ok_or(ModelError::Uninitialized)?;

        let mut scope = self.ledger.scope("frame");
        let input = self.frame_tensor(&rgb, loaded.model.input_size());
        scope.track(&input);
        let output = loaded.model.try_forward(input)?;
        scope.track(&output);
        let values = output
            .into_data()
            .to_vec::<f32>()
            .map_err(|e| DetectionError::Engine(format!("{e:?}")))?;
        drop(guard);

        let results = self.to_results(&values, frame.timestamp);
        debug!(frame = frame.id, count = results.len(), "custom regressor detections");
        Ok(results)
    }
}
