//! Structural validation of an `images/` + `labels/` dataset tree.
//!
//! Validation is read-only. Every defect found after the directory check is
//! collected into the result instead of aborting the scan.

use crate::types::{file_name, is_image_file, is_label_file, list_files, DatasetLayout};
use data_contracts::label::BoxLabel;
use data_contracts::{
    DatasetFiles, DatasetStats, ValidationCode, ValidationIssue, ValidationResult,
};
use serde_json::json;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, Clone, Default)]
pub struct DatasetValidator {
    layout: DatasetLayout,
}

impl DatasetValidator {
    pub fn new(layout: DatasetLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &DatasetLayout {
        &self.layout
    }

    pub fn validate(&self, root: &Path) -> ValidationResult {
        let mut result = ValidationResult::default();
        let images_dir = self.layout.images_dir(root);
        let labels_dir = self.layout.labels_dir(root);

        for dir in [&images_dir, &labels_dir] {
            if !dir.is_dir() {
                result.errors.push(
                    ValidationIssue::new(
                        ValidationCode::DirNotFound,
                        format!("required directory {} does not exist", dir.display()),
                    )
                    .with_details(json!({ "path": dir.display().to_string() })),
                );
            }
        }
        if !result.errors.is_empty() {
            return finish(root, result);
        }

        let images = match list_files(&images_dir, is_image_file) {
            Ok(v) => v,
            Err(e) => return finish(root, internal_error(result, e)),
        };
        let labels = match list_files(&labels_dir, is_label_file) {
            Ok(v) => v,
            Err(e) => return finish(root, internal_error(result, e)),
        };

        result.files = DatasetFiles {
            images: images.iter().map(|p| file_name(p)).collect(),
            labels: labels.iter().map(|p| file_name(p)).collect(),
        };
        result.stats.total_images = images.len();
        result.stats.total_labels = labels.len();

        if images.len() != labels.len() {
            result.errors.push(
                ValidationIssue::new(
                    ValidationCode::CountMismatch,
                    format!(
                        "found {} images but {} label files",
                        images.len(),
                        labels.len()
                    ),
                )
                .with_details(json!({ "images": images.len(), "labels": labels.len() })),
            );
        } else {
            // With equal counts any unpaired image means a naming mismatch.
            let label_stems: BTreeSet<String> = labels.iter().filter_map(|p| stem(p)).collect();
            for image in &images {
                let Some(image_stem) = stem(image) else { continue };
                if !label_stems.contains(&image_stem) {
                    result.errors.push(ValidationIssue::new(
                        ValidationCode::MissingLabel,
                        format!(
                            "image {} has no matching {image_stem}.txt label",
                            file_name(image)
                        ),
                    ));
                }
            }
        }

        let mut total_bytes = 0u64;
        let mut counted = 0usize;
        for image in &images {
            total_bytes += fs::metadata(image).map(|m| m.len()).unwrap_or(0);
            counted += 1;
            match check_image(image) {
                Ok(dims) => result.stats.image_resolutions.push(dims),
                Err(msg) => result.errors.push(
                    ValidationIssue::new(ValidationCode::InvalidImage, msg)
                        .with_details(json!({ "file": file_name(image) })),
                ),
            }
        }
        for label in &labels {
            total_bytes += fs::metadata(label).map(|m| m.len()).unwrap_or(0);
            counted += 1;
            result.errors.extend(check_label(label));
        }
        if counted > 0 {
            result.stats.average_file_size = total_bytes as f64 / counted as f64;
        }

        finish(root, result)
    }
}

fn finish(root: &Path, mut result: ValidationResult) -> ValidationResult {
    result.is_valid = result.errors.is_empty();
    info!(
        root = %root.display(),
        images = result.stats.total_images,
        labels = result.stats.total_labels,
        errors = result.errors.len(),
        "dataset validated"
    );
    result
}

fn internal_error(mut result: ValidationResult, err: crate::DatasetError) -> ValidationResult {
    result.errors.push(ValidationIssue::new(
        ValidationCode::ValidationError,
        err.to_string(),
    ));
    result
}

fn stem(path: &Path) -> Option<String> {
    path.file_stem().map(|s| s.to_string_lossy().into_owned())
}

fn check_image(path: &PathBuf) -> Result<(u32, u32), String> {
    let img = image::ImageReader::open(path)
        .map_err(|e| format!("{}: {e}", file_name(path)))?
        .with_guessed_format()
        .map_err(|e| format!("{}: {e}", file_name(path)))?
        .decode()
        .map_err(|e| format!("{} could not be decoded: {e}", file_name(path)))?;
    let (w, h) = (img.width(), img.height());
    if w == 0 || h == 0 {
        return Err(format!("{} has zero size ({w}x{h})", file_name(path)));
    }
    debug!(file = %file_name(path), w, h, "image ok");
    Ok((w, h))
}

/// One issue per offending line; an empty file is a single issue.
fn check_label(path: &Path) -> Vec<ValidationIssue> {
    let name = file_name(path);
    let text = match fs::read_to_string(path) {
        Ok(t) => t,
        Err(e) => {
            return vec![ValidationIssue::new(
                ValidationCode::InvalidLabel,
                format!("{name} is not readable UTF-8 text: {e}"),
            )]
        }
    };
    let mut issues = Vec::new();
    let mut lines = 0usize;
    for (idx, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        lines += 1;
        if let Err(e) = BoxLabel::parse_line(line, idx + 1) {
            issues.push(
                ValidationIssue::new(ValidationCode::InvalidLabel, format!("{name}: {e}"))
                    .with_details(json!({ "file": name, "line": idx + 1 })),
            );
        }
    }
    if lines == 0 {
        issues.push(ValidationIssue::new(
            ValidationCode::InvalidLabel,
            format!("{name}: label file is empty"),
        ));
    }
    issues
}
