//! Decode validated image/label pairs into memory.
//!
//! Loading is fail-fast: the first bad pair aborts the whole load with one
//! consolidated message rather than returning a partial dataset.

use crate::types::{is_image_file, list_files, DatasetError, DatasetLayout, DatasetResult};
use data_contracts::{DatasetRecord, LabelLayout, LabelVector, ValidationResult, ValidationStatus};
use image::imageops::FilterType;
use image::RgbImage;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// One decoded training pair.
#[derive(Debug, Clone)]
pub struct LoadedSample {
    pub record: DatasetRecord,
    pub image: RgbImage,
    pub label: LabelVector,
}

impl LoadedSample {
    /// Channel-first pixels scaled to [0, 1], the layout the regressor consumes.
    pub fn pixels_chw(&self) -> Vec<f32> {
        image_to_chw(&self.image)
    }

    pub fn target(&self) -> Vec<f32> {
        self.label.to_target()
    }
}

/// Flatten an RGB image into `[3, h, w]` order with values in [0, 1].
pub fn image_to_chw(img: &RgbImage) -> Vec<f32> {
    let (w, h) = img.dimensions();
    let plane = (w * h) as usize;
    let mut out = vec![0f32; plane * 3];
    for (x, y, px) in img.enumerate_pixels() {
        let idx = (y * w + x) as usize;
        out[idx] = px[0] as f32 / 255.0;
        out[plane + idx] = px[1] as f32 / 255.0;
        out[2 * plane + idx] = px[2] as f32 / 255.0;
    }
    out
}

#[derive(Debug, Clone, Default)]
pub struct DatasetLoader {
    pub layout: DatasetLayout,
    pub label_layout: LabelLayout,
    /// Resize every image to `(width, height)` when set.
    pub input_size: Option<(u32, u32)>,
}

impl DatasetLoader {
    pub fn new(layout: DatasetLayout, label_layout: LabelLayout, input_size: Option<(u32, u32)>) -> Self {
        Self {
            layout,
            label_layout,
            input_size,
        }
    }

    /// Load every pair under `root`. `validation` must come from a clean scan of the same root.
    pub fn load(&self, root: &Path, validation: &ValidationResult) -> DatasetResult<Vec<LoadedSample>> {
        if !validation.is_valid {
            let first = validation
                .errors
                .first()
                .map(|e| format!("{}: {}", e.code, e.message))
                .unwrap_or_else(|| "validation did not pass".to_string());
            return Err(self.fail(root, None, &first));
        }
        info!(root = %root.display(), "loading dataset");

        let images_dir = self.layout.images_dir(root);
        let images = list_files(&images_dir, is_image_file)?;
        let mut samples = Vec::with_capacity(images.len());
        for image_path in images {
            samples.push(self.load_pair(root, image_path)?);
        }
        info!(samples = samples.len(), "dataset loaded");
        Ok(samples)
    }

    fn load_pair(&self, root: &Path, image_path: PathBuf) -> DatasetResult<LoadedSample> {
        let label_path = self
            .layout
            .label_for_image(root, &image_path)
            .ok_or_else(|| self.fail(root, Some(&image_path), "file has no usable base name"))?;

        let img = image::open(&image_path)
            .map_err(|e| self.fail(root, Some(&image_path), &format!("image could not be decoded: {e}")))?
            .to_rgb8();
        if img.width() == 0 || img.height() == 0 {
            return Err(self.fail(root, Some(&image_path), "image has zero size"));
        }
        let img = match self.input_size {
            Some((w, h)) if (w, h) != img.dimensions() => {
                image::imageops::resize(&img, w, h, FilterType::Triangle)
            }
            _ => img,
        };

        let text = fs::read_to_string(&label_path)
            .map_err(|e| self.fail(root, Some(&label_path), &format!("label could not be read: {e}")))?;
        let label = LabelVector::parse(&text, self.label_layout)
            .map_err(|e| self.fail(root, Some(&label_path), &e.to_string()))?;

        let mut record = DatasetRecord::pending(image_path, label_path);
        record.validation_status = ValidationStatus::Valid;
        Ok(LoadedSample {
            record,
            image: img,
            label,
        })
    }

    fn fail(&self, root: &Path, file: Option<&Path>, reason: &str) -> DatasetError {
        let location = file
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| root.display().to_string());
        let lines = match self.label_layout {
            LabelLayout::SingleBox => "exactly one line",
            LabelLayout::StickEndpoints => "exactly two lines (one per stick end)",
        };
        let message = format!(
            "failed to load dataset at {location}: {reason}\n\
             check that:\n\
             \x20 - {root}/{images}/ holds .jpg/.jpeg/.png images and {root}/{labels}/ holds .txt labels\n\
             \x20 - every image has a label with the same base name (frame_001.jpg -> frame_001.txt)\n\
             \x20 - each label has {lines} of 5 numbers `class_id x y w h` with x, y, w, h in [0, 1]",
            root = root.display(),
            images = self.layout.images_subdir,
            labels = self.layout.labels_subdir,
        );
        DatasetError::Load { message }
    }
}
