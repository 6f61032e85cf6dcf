//! Marker dataset tooling: validation, loading, augmentation and capture.
//!
//! A dataset is a root directory holding `images/` (`.jpg`/`.jpeg`/`.png`)
//! and `labels/` (`.txt`, one `class_id x y w h` line per entity) with
//! matching base names.
//!
//! - [`DatasetValidator`] scans a tree and aggregates every structural defect
//! - [`DatasetLoader`] decodes a validated tree, failing fast on the first bad pair
//! - [`Augmentor`] applies label-consistent training-time augmentation
//! - [`DatasetWriter`] stores captured frames (and [`CaptureAugmentor`] variants)

pub mod aug;
pub mod capture;
pub mod loader;
pub mod manifest;
pub mod splits;
pub mod types;
pub mod validation;

pub use aug::{AugmentConfig, Augmentation, Augmentor};
pub use capture::{CaptureAugmentor, CaptureVariant, DatasetWriter};
pub use loader::{image_to_chw, DatasetLoader, LoadedSample};
pub use manifest::export_manifest;
pub use splits::split_train_val;
pub use types::*;
pub use validation::DatasetValidator;
