//! End-to-end dataset workflows: validate → load → augment, capture → validate,
//! and manifest export.

use data_contracts::{LabelLayout, ValidationCode};
use marker_dataset::{
    export_manifest, split_train_val, DatasetLayout, DatasetLoader, DatasetValidator, DatasetWriter,
};
use image::{Rgb, RgbImage};
use std::fs;
use std::path::Path;

/// Write `n` valid 16x12 jpg/txt pairs named `frame_000..`.
fn synthetic_dataset(root: &Path, n: usize) -> anyhow::Result<()> {
    let images = root.join("images");
    let labels = root.join("labels");
    fs::create_dir_all(&images)?;
    fs::create_dir_all(&labels)?;
    for i in 0..n {
        let img = RgbImage::from_pixel(16, 12, Rgb([(i * 20) as u8, 120, 200]));
        img.save(images.join(format!("frame_{i:03}.jpg")))?;
        fs::write(
            labels.join(format!("frame_{i:03}.txt")),
            format!("0 {:.2} 0.5 0.1 0.1\n", 0.1 + i as f32 * 0.05),
        )?;
    }
    Ok(())
}

#[test]
fn valid_dataset_has_no_errors() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    synthetic_dataset(tmp.path(), 4)?;
    let result = DatasetValidator::default().validate(tmp.path());
    assert!(result.is_valid, "{:?}", result.errors);
    assert!(result.errors.is_empty());
    assert_eq!(result.stats.total_images, 4);
    assert_eq!(result.stats.total_labels, 4);
    assert_eq!(result.stats.image_resolutions, vec![(16, 12); 4]);
    assert!(result.stats.average_file_size > 0.0);
    assert_eq!(result.files.images[0], "frame_000.jpg");
    Ok(())
}

#[test]
fn three_images_two_labels_is_one_count_mismatch() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    synthetic_dataset(tmp.path(), 3)?;
    fs::remove_file(tmp.path().join("labels/frame_002.txt"))?;
    let result = DatasetValidator::default().validate(tmp.path());
    assert!(!result.is_valid);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].code, ValidationCode::CountMismatch);
    Ok(())
}

#[test]
fn out_of_range_coordinate_is_invalid_label() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    synthetic_dataset(tmp.path(), 2)?;
    fs::write(tmp.path().join("labels/frame_001.txt"), "0 1.5 0.5 0.1 0.1\n")?;
    let result = DatasetValidator::default().validate(tmp.path());
    assert!(!result.is_valid);
    assert_eq!(result.count(ValidationCode::InvalidLabel), 1);
    Ok(())
}

#[test]
fn errors_are_aggregated_across_files() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    synthetic_dataset(tmp.path(), 3)?;
    fs::rename(
        tmp.path().join("labels/frame_000.txt"),
        tmp.path().join("labels/other.txt"),
    )?;
    fs::write(tmp.path().join("images/frame_001.jpg"), b"not a jpeg")?;
    fs::write(tmp.path().join("labels/frame_002.txt"), "0 0.5 0.5\n0 x 0.5 0.1 0.1\n")?;
    let result = DatasetValidator::default().validate(tmp.path());
    assert!(result.has(ValidationCode::MissingLabel));
    assert!(result.has(ValidationCode::InvalidImage));
    assert_eq!(result.count(ValidationCode::InvalidLabel), 2);
    Ok(())
}

#[test]
fn load_returns_every_pair_resized() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    synthetic_dataset(tmp.path(), 5)?;
    let validation = DatasetValidator::default().validate(tmp.path());
    let loader = DatasetLoader::new(DatasetLayout::default(), LabelLayout::SingleBox, Some((8, 8)));
    let samples = loader.load(tmp.path(), &validation)?;
    assert_eq!(samples.len(), 5);
    assert_eq!(samples[0].image.dimensions(), (8, 8));
    assert_eq!(samples[0].pixels_chw().len(), 3 * 8 * 8);
    assert_eq!(samples[1].target().len(), 4);

    let (train, val) = split_train_val(samples, 0.2, None);
    assert_eq!(train.len(), 4);
    assert_eq!(val.len(), 1);
    assert!(val[0].record.image_path.ends_with("frame_004.jpg"));
    Ok(())
}

#[test]
fn load_fails_fast_with_checklist() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    synthetic_dataset(tmp.path(), 3)?;
    let validation = DatasetValidator::default().validate(tmp.path());
    // Corrupt after validation: the loader must still refuse the whole set.
    fs::write(tmp.path().join("labels/frame_001.txt"), "0 0.5 0.5 0.1\n")?;
    let err = DatasetLoader::default()
        .load(tmp.path(), &validation)
        .unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("frame_001.txt"), "{msg}");
    assert!(msg.contains("class_id x y w h"));
    Ok(())
}

#[test]
fn stick_layout_needs_two_lines() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    synthetic_dataset(tmp.path(), 2)?;
    fs::write(
        tmp.path().join("labels/frame_000.txt"),
        "0 0.2 0.3 0.05 0.05\n1 0.7 0.6 0.05 0.05\n",
    )?;
    let validation = DatasetValidator::default().validate(tmp.path());
    assert!(validation.is_valid);
    let loader = DatasetLoader::new(DatasetLayout::default(), LabelLayout::StickEndpoints, None);
    assert!(loader.load(tmp.path(), &validation).is_err());

    fs::write(
        tmp.path().join("labels/frame_001.txt"),
        "0 0.1 0.3 0.05 0.05\n1 0.8 0.6 0.05 0.05\n",
    )?;
    let samples = loader.load(tmp.path(), &validation)?;
    assert_eq!(samples[0].target().len(), 10);
    Ok(())
}

#[test]
fn captured_records_validate() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let writer = DatasetWriter::new(tmp.path(), DatasetLayout::default());
    let img = RgbImage::from_pixel(24, 24, Rgb([200, 80, 20]));
    let label = data_contracts::LabelVector::parse("0 0.5 0.5 0.2 0.2", LabelLayout::SingleBox)?;
    let stems = writer.save_capture(&img, &label, true)?;
    assert_eq!(stems.len(), 6);
    assert!(stems.iter().all(|s| s.starts_with("capture_")));

    let result = DatasetValidator::default().validate(tmp.path());
    assert!(result.is_valid, "{:?}", result.errors);
    assert_eq!(result.stats.total_images, 6);

    let manifest = export_manifest(tmp.path(), &DatasetLayout::default())?;
    assert_eq!(manifest.images.len(), 6);
    let out = tmp.path().join("manifest.json");
    manifest.save(&out)?;
    assert_eq!(data_contracts::DatasetManifest::load(&out)?, manifest);
    Ok(())
}
