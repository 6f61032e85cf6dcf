//! Core types, error definitions, and directory layout for marker datasets.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub type DatasetResult<T> = Result<T, DatasetError>;

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("image error at {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("label error at {path}: {source}")]
    Label {
        path: PathBuf,
        #[source]
        source: data_contracts::LabelError,
    },
    #[error("json error at {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    /// Consolidated fail-fast diagnostic raised by the loader.
    #[error("{message}")]
    Load { message: String },
}

impl DatasetError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        DatasetError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Extensions accepted as dataset images.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];
/// Extension of label files.
pub const LABEL_EXTENSION: &str = "txt";

/// Where images and labels live under a dataset root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetLayout {
    pub images_subdir: String,
    pub labels_subdir: String,
}

impl Default for DatasetLayout {
    fn default() -> Self {
        Self {
            images_subdir: "images".to_string(),
            labels_subdir: "labels".to_string(),
        }
    }
}

impl DatasetLayout {
    pub fn images_dir(&self, root: &Path) -> PathBuf {
        root.join(&self.images_subdir)
    }

    pub fn labels_dir(&self, root: &Path) -> PathBuf {
        root.join(&self.labels_subdir)
    }

    /// Companion label path for an image (same base name, `.txt`).
    pub fn label_for_image(&self, root: &Path, image: &Path) -> Option<PathBuf> {
        let stem = image.file_stem()?;
        let mut name = stem.to_os_string();
        name.push(".");
        name.push(LABEL_EXTENSION);
        Some(self.labels_dir(root).join(name))
    }
}

pub(crate) fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

pub(crate) fn is_label_file(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some(LABEL_EXTENSION)
}

/// Sorted regular files in `dir` accepted by `keep`.
pub(crate) fn list_files(dir: &Path, keep: fn(&Path) -> bool) -> DatasetResult<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .map_err(|e| DatasetError::io(dir, e))?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|p| p.is_file() && keep(p))
        .collect();
    files.sort();
    Ok(files)
}

pub(crate) fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}
