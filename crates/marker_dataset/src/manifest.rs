use crate::types::{file_name, is_image_file, is_label_file, list_files, DatasetLayout, DatasetResult};
use data_contracts::DatasetManifest;
use std::path::Path;
use tracing::info;

/// Enumerate the current images and labels of a dataset, sorted by file name.
pub fn export_manifest(root: &Path, layout: &DatasetLayout) -> DatasetResult<DatasetManifest> {
    let images = list_files(&layout.images_dir(root), is_image_file)?;
    let labels = list_files(&layout.labels_dir(root), is_label_file)?;
    let manifest = DatasetManifest {
        images: images.iter().map(|p| file_name(p)).collect(),
        labels: labels.iter().map(|p| file_name(p)).collect(),
    };
    info!(
        images = manifest.images.len(),
        labels = manifest.labels.len(),
        "manifest exported"
    );
    Ok(manifest)
}
