//! Capture-time dataset building: persist a freshly captured frame plus
//! geometric/photometric variants as new records.

use crate::aug::shift_brightness;
use crate::types::{DatasetError, DatasetLayout, DatasetResult};
use data_contracts::{BoxLabel, LabelVector};
use image::{Rgb, RgbImage};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CaptureVariant {
    /// Rotate about the image centre by this many degrees.
    Rotate(f32),
    /// Centre zoom; values above 1 crop in.
    Zoom(f32),
    /// Additive brightness in the 0-1 range.
    Brightness(f32),
}

impl CaptureVariant {
    pub fn tag(&self) -> &'static str {
        match self {
            CaptureVariant::Rotate(_) => "rot",
            CaptureVariant::Zoom(_) => "zoom",
            CaptureVariant::Brightness(_) => "bright",
        }
    }
}

#[derive(Debug, Clone)]
pub struct CaptureAugmentor {
    pub variants: Vec<CaptureVariant>,
}

impl Default for CaptureAugmentor {
    fn default() -> Self {
        Self {
            variants: vec![
                CaptureVariant::Rotate(5.0),
                CaptureVariant::Rotate(-5.0),
                CaptureVariant::Zoom(1.1),
                CaptureVariant::Brightness(0.15),
                CaptureVariant::Brightness(-0.15),
            ],
        }
    }
}

impl CaptureAugmentor {
    /// Apply one variant. `None` when the transformed label leaves [0, 1].
    pub fn apply(&self, variant: CaptureVariant, img: &RgbImage, label: &LabelVector) -> Option<(RgbImage, LabelVector)> {
        let (w, h) = img.dimensions();
        let (out_img, out_label) = match variant {
            CaptureVariant::Rotate(deg) => {
                let rad = deg.to_radians();
                let out = rotate_about_center(img, rad);
                let label = label.map_boxes(|b| rotate_box(b, rad, w as f32, h as f32));
                (out, label)
            }
            CaptureVariant::Zoom(factor) => {
                let out = zoom_center(img, factor);
                let label = label.map_boxes(|b| zoom_box(b, factor));
                (out, label)
            }
            CaptureVariant::Brightness(delta) => {
                let mut out = img.clone();
                shift_brightness(&mut out, delta);
                (out, label.clone())
            }
        };
        out_label.is_in_range().then_some((out_img, out_label))
    }

    /// All variants that keep their label in range.
    pub fn variants_for(&self, img: &RgbImage, label: &LabelVector) -> Vec<(CaptureVariant, RgbImage, LabelVector)> {
        self.variants
            .iter()
            .filter_map(|v| match self.apply(*v, img, label) {
                Some((i, l)) => Some((*v, i, l)),
                None => {
                    warn!(variant = ?v, "skipping capture variant: label left the frame");
                    None
                }
            })
            .collect()
    }
}

/// Inverse-mapped nearest-neighbour rotation; uncovered corners are black.
fn rotate_about_center(img: &RgbImage, rad: f32) -> RgbImage {
    let (w, h) = img.dimensions();
    let (cx, cy) = (w as f32 / 2.0, h as f32 / 2.0);
    let (sin, cos) = rad.sin_cos();
    let mut out = RgbImage::from_pixel(w, h, Rgb([0, 0, 0]));
    for (x, y, px) in out.enumerate_pixels_mut() {
        let dx = x as f32 + 0.5 - cx;
        let dy = y as f32 + 0.5 - cy;
        let sx = cos * dx + sin * dy + cx;
        let sy = -sin * dx + cos * dy + cy;
        if sx >= 0.0 && sy >= 0.0 && (sx as u32) < w && (sy as u32) < h {
            *px = *img.get_pixel(sx as u32, sy as u32);
        }
    }
    out
}

fn rotate_box(b: &BoxLabel, rad: f32, w: f32, h: f32) -> BoxLabel {
    let (sin, cos) = rad.sin_cos();
    let dx = (b.x - 0.5) * w;
    let dy = (b.y - 0.5) * h;
    BoxLabel {
        x: (cos * dx - sin * dy) / w + 0.5,
        y: (sin * dx + cos * dy) / h + 0.5,
        ..*b
    }
}

fn zoom_center(img: &RgbImage, factor: f32) -> RgbImage {
    let (w, h) = img.dimensions();
    let factor = factor.max(1e-3);
    let mut out = RgbImage::new(w, h);
    for (x, y, px) in out.enumerate_pixels_mut() {
        let sx = ((x as f32 + 0.5 - w as f32 / 2.0) / factor + w as f32 / 2.0).floor();
        let sy = ((y as f32 + 0.5 - h as f32 / 2.0) / factor + h as f32 / 2.0).floor();
        let sx = sx.clamp(0.0, (w - 1) as f32) as u32;
        let sy = sy.clamp(0.0, (h - 1) as f32) as u32;
        *px = *img.get_pixel(sx, sy);
    }
    out
}

fn zoom_box(b: &BoxLabel, factor: f32) -> BoxLabel {
    BoxLabel {
        x: (b.x - 0.5) * factor + 0.5,
        y: (b.y - 0.5) * factor + 0.5,
        w: b.w * factor,
        h: b.h * factor,
        ..*b
    }
}

/// Writes captured frames into `images/` + `labels/` under a dataset root.
#[derive(Debug, Clone)]
pub struct DatasetWriter {
    root: PathBuf,
    layout: DatasetLayout,
    augmentor: CaptureAugmentor,
}

impl DatasetWriter {
    pub fn new(root: impl Into<PathBuf>, layout: DatasetLayout) -> Self {
        Self {
            root: root.into(),
            layout,
            augmentor: CaptureAugmentor::default(),
        }
    }

    pub fn with_augmentor(mut self, augmentor: CaptureAugmentor) -> Self {
        self.augmentor = augmentor;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Save one capture; returns the stems written (original first).
    pub fn save_capture(&self, image: &RgbImage, label: &LabelVector, augment: bool) -> DatasetResult<Vec<String>> {
        let images_dir = self.layout.images_dir(&self.root);
        let labels_dir = self.layout.labels_dir(&self.root);
        fs::create_dir_all(&images_dir).map_err(|e| DatasetError::io(&images_dir, e))?;
        fs::create_dir_all(&labels_dir).map_err(|e| DatasetError::io(&labels_dir, e))?;

        let base = format!("capture_{}", Uuid::new_v4().simple());
        let mut stems = vec![base.clone()];
        self.write_record(&base, image, label)?;

        if augment {
            for (variant, img, lbl) in self.augmentor.variants_for(image, label) {
                let stem = format!("{base}_{}{}", variant.tag(), stems.len());
                self.write_record(&stem, &img, &lbl)?;
                stems.push(stem);
            }
        }
        info!(base = %base, records = stems.len(), "capture saved");
        Ok(stems)
    }

    fn write_record(&self, stem: &str, image: &RgbImage, label: &LabelVector) -> DatasetResult<()> {
        let image_path = self.layout.images_dir(&self.root).join(format!("{stem}.jpg"));
        let label_path = self.layout.labels_dir(&self.root).join(format!("{stem}.txt"));
        image.save(&image_path).map_err(|source| DatasetError::Image {
            path: image_path.clone(),
            source,
        })?;
        fs::write(&label_path, label.to_text()).map_err(|e| DatasetError::io(&label_path, e))?;
        debug!(image = %image_path.display(), "record written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use data_contracts::LabelLayout;

    #[test]
    fn rotation_moves_label_centre() {
        let label = LabelVector::parse("0 0.7 0.5 0.1 0.1", LabelLayout::SingleBox).unwrap();
        let img = RgbImage::new(32, 32);
        let (_, out) = CaptureAugmentor::default()
            .apply(CaptureVariant::Rotate(90.0), &img, &label)
            .unwrap();
        let b = out.boxes()[0];
        assert!((b.x - 0.5).abs() < 1e-4);
        assert!((b.y - 0.7).abs() < 1e-4);
    }

    #[test]
    fn zoom_out_of_frame_is_skipped() {
        let label = LabelVector::parse("0 0.98 0.5 0.1 0.1", LabelLayout::SingleBox).unwrap();
        let img = RgbImage::new(16, 16);
        let aug = CaptureAugmentor::default();
        assert!(aug.apply(CaptureVariant::Zoom(1.1), &img, &label).is_none());
        let kept = aug.variants_for(&img, &label);
        assert!(kept.iter().all(|(v, _, _)| !matches!(v, CaptureVariant::Zoom(_))));
    }

    #[test]
    fn brightness_keeps_label() {
        let label = LabelVector::parse("0 0.3 0.3 0.2 0.2", LabelLayout::SingleBox).unwrap();
        let img = RgbImage::from_pixel(8, 8, Rgb([100, 100, 100]));
        let (out_img, out) = CaptureAugmentor::default()
            .apply(CaptureVariant::Brightness(0.1), &img, &label)
            .unwrap();
        assert_eq!(out, label);
        assert!(out_img.get_pixel(0, 0).0[0] > 100);
    }
}
