use crate::cli::ModelsAction;
use crate::engines;
use anyhow::{bail, Context};
use cli_support::{DatasetArgs, PoseBackend, RegistryArgs, TrackerConfig};
use data_contracts::{LabelLayout, LabelVector};
use inference::{BackendKind, InferenceBackend};
use marker_dataset::{AugmentConfig, CaptureAugmentor, DatasetLayout, DatasetLoader, DatasetValidator, DatasetWriter};
use model_registry::{FsArtifactStore, ModelStore};
use models::{MarkerRegressorConfig, MemoryLedger};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use training::{spawn_training, TrainConfig, TrainingEvent, TrainingOrchestrator};
use vision_core::interfaces::FrameSource;
use vision_core::source::ImageSequenceSource;
use vision_runtime::{process_source, FrameProcessingLoop, LoopConfig, PngSequenceRecorder};

fn layout(cfg: &TrackerConfig) -> DatasetLayout {
    DatasetLayout {
        images_subdir: cfg.dataset.images_subdir.clone(),
        labels_subdir: cfg.dataset.labels_subdir.clone(),
    }
}

fn label_layout(args: &DatasetArgs) -> LabelLayout {
    if args.stick {
        LabelLayout::StickEndpoints
    } else {
        LabelLayout::SingleBox
    }
}

fn open_registry(cfg: &TrackerConfig, args: &RegistryArgs) -> anyhow::Result<ModelStore<InferenceBackend>> {
    let root = args.root(cfg);
    ModelStore::open(Arc::new(FsArtifactStore::new(&root)), Default::default(), MemoryLedger::new())
        .with_context(|| format!("opening model registry at {}", root.display()))
}

pub fn validate(cfg: &TrackerConfig, args: &DatasetArgs, json: bool) -> anyhow::Result<()> {
    let root = args.root(cfg);
    let result = DatasetValidator::new(layout(cfg)).validate(&root);
    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!(
            "{}: {} images, {} labels, {} error(s)",
            root.display(),
            result.stats.total_images,
            result.stats.total_labels,
            result.errors.len()
        );
        for issue in &result.errors {
            println!("  [{}] {}", issue.code.as_str(), issue.message);
        }
    }
    if !result.is_valid {
        bail!("dataset at {} is not valid", root.display());
    }
    Ok(())
}

pub fn export_manifest(cfg: &TrackerConfig, args: &DatasetArgs, out: Option<PathBuf>) -> anyhow::Result<()> {
    let root = args.root(cfg);
    let manifest = marker_dataset::export_manifest(&root, &layout(cfg))
        .with_context(|| format!("listing dataset at {}", root.display()))?;
    let out = out.unwrap_or_else(|| root.join("manifest.json"));
    manifest
        .save(&out)
        .with_context(|| format!("writing manifest to {}", out.display()))?;
    println!("{} images, {} labels -> {}", manifest.images.len(), manifest.labels.len(), out.display());
    Ok(())
}

pub fn capture(cfg: &TrackerConfig, args: &DatasetArgs, image: &Path, label: &Path, augment: bool) -> anyhow::Result<()> {
    let img = image::open(image)
        .with_context(|| format!("decoding {}", image.display()))?
        .to_rgb8();
    let text = std::fs::read_to_string(label).with_context(|| format!("reading {}", label.display()))?;
    let label = LabelVector::parse(&text, label_layout(args)).context("parsing label")?;
    let writer = DatasetWriter::new(args.root(cfg), layout(cfg)).with_augmentor(CaptureAugmentor::default());
    let stems = writer.save_capture(&img, &label, augment)?;
    for stem in &stems {
        println!("{stem}");
    }
    Ok(())
}

pub fn train(
    cfg: &TrackerConfig,
    args: &DatasetArgs,
    registry: &RegistryArgs,
    name: String,
    description: String,
) -> anyhow::Result<()> {
    let root = args.root(cfg);
    let label_layout = label_layout(args);
    let validation = DatasetValidator::new(layout(cfg)).validate(&root);
    if !validation.is_valid {
        for issue in &validation.errors {
            warn!(code = issue.code.as_str(), "{}", issue.message);
        }
        bail!("dataset at {} failed validation; run `validate` for details", root.display());
    }

    let t = &cfg.training;
    let [w, h] = t.input_size;
    if t.output_dim != label_layout.output_dim() {
        warn!(
            configured = t.output_dim,
            layout = label_layout.output_dim(),
            "output_dim follows the label layout"
        );
    }
    let loader = DatasetLoader::new(layout(cfg), label_layout, Some((w as u32, h as u32)));
    let samples = loader.load(&root, &validation)?;

    let config = TrainConfig {
        epochs: t.epochs,
        batch_size: t.batch_size,
        learning_rate: t.learning_rate,
        val_fraction: t.val_fraction,
        shuffle_seed: t.shuffle_seed,
        augment: t.augment.then(|| AugmentConfig {
            brightness_delta: t.brightness_delta,
            seed: t.shuffle_seed,
            ..AugmentConfig::default()
        }),
        model: MarkerRegressorConfig::for_layout(w, h, label_layout),
        artifact_name: name,
        artifact_description: description,
        ..TrainConfig::default()
    };
    info!(samples = samples.len(), config = %config.describe(), "training");

    let store = Arc::new(open_registry(cfg, registry)?);
    let handle = spawn_training(TrainingOrchestrator::new(store), samples, config)?;
    for event in handle.events().iter() {
        match event {
            TrainingEvent::EpochEnd { epoch, metrics, run } => {
                println!(
                    "epoch {}/{}  loss {:.5}  val_loss {}  eta {}s",
                    epoch + 1,
                    run.total_epochs,
                    metrics.loss,
                    metrics.val_loss.map(|v| format!("{v:.5}")).unwrap_or_else(|| "-".into()),
                    run.estimated_remaining.map(|d| d.as_secs()).unwrap_or(0)
                );
            }
            TrainingEvent::Finished { .. } | TrainingEvent::Cancelled | TrainingEvent::Failed { .. } => break,
            _ => {}
        }
    }
    let outcome = handle.join()?;
    println!("registered model {} ({})", outcome.artifact.id, outcome.artifact.name);
    Ok(())
}

pub fn models(cfg: &TrackerConfig, args: &RegistryArgs, action: ModelsAction) -> anyhow::Result<()> {
    let store = open_registry(cfg, args)?;
    match action {
        ModelsAction::List => {
            let active = store.persisted_active_id();
            for a in store.list() {
                let marker = if Some(a.id) == active { "*" } else { " " };
                println!(
                    "{marker} {:>4}  {:<24} {:?}  v{}  {}",
                    a.id, a.name, a.kind, a.version, a.description
                );
            }
        }
        ModelsAction::Switch { id } => {
            let a = store.switch(id)?;
            println!("active model is now {} ({})", a.id, a.name);
        }
        ModelsAction::Delete { id } => {
            store.delete(id)?;
            println!("deleted model {id}");
        }
        ModelsAction::Upload {
            architecture,
            weights,
            name,
        } => {
            let a = store.upload(&architecture, weights.as_deref(), &name)?;
            println!("uploaded model {} ({})", a.id, a.name);
        }
        ModelsAction::Export { id, out } => {
            let (desc, weights) = store.export(id, &out)?;
            println!("{}\n{}", desc.display(), weights.display());
        }
    }
    Ok(())
}

pub fn detect(cfg: &TrackerConfig, registry: &RegistryArgs, kind: BackendKind, frames: &Path, fps: f64) -> anyhow::Result<()> {
    let store = open_registry(cfg, registry)?;
    if kind == BackendKind::Custom && store.restore_active()?.is_none() {
        bail!("no active model; train one or run `models switch <id>`");
    }
    let mut detector = engines::factory(&store, cfg)?.build(kind)?;
    detector.init().with_context(|| format!("initialising the {kind} detector"))?;

    let mut source =
        ImageSequenceSource::open(frames, fps).with_context(|| format!("reading frames from {}", frames.display()))?;
    while let Some(frame) = source.next_frame() {
        let detections = match detector.detect(&frame) {
            Ok(d) => d,
            Err(err) => {
                tracing::error!(frame = frame.id, error = %err, "detection failed; stopping");
                bail!("detection stopped at frame {}: {err}", frame.id);
            }
        };
        let line = serde_json::json!({ "frame": frame.id, "timestamp": frame.timestamp, "detections": detections });
        println!("{line}");
    }
    Ok(())
}

pub fn track(cfg: &TrackerConfig, frames: &Path, fps: f64, record: Option<PathBuf>) -> anyhow::Result<()> {
    let t = &cfg.tracking;
    let loop_config = LoopConfig {
        stick_ends: t.stick_ends,
        color_stride: t.color_stride,
        fps_window: t.fps_window,
        overlay: t.overlay.then(Default::default),
    };
    let mut pipeline = FrameProcessingLoop::new(loop_config);
    if t.pose_backend != PoseBackend::None {
        let store = open_registry(cfg, &RegistryArgs::default())?;
        pipeline = pipeline.with_pose(engines::factory(&store, cfg)?.build_pose()?);
    }
    if let Some(dir) = &record {
        let recorder =
            PngSequenceRecorder::create(dir).with_context(|| format!("creating recording dir {}", dir.display()))?;
        pipeline.start_recording(Box::new(recorder));
    }

    let mut source =
        ImageSequenceSource::open(frames, fps).with_context(|| format!("reading frames from {}", frames.display()))?;
    let report = process_source(&mut source, &mut pipeline)?;
    println!(
        "{} frames, {} processed, {} with both endpoints, {} with pose, {} recorded",
        report.frames, report.processed, report.with_both_endpoints, report.with_pose, report.recorded
    );
    if let Some(message) = &report.halted {
        println!("tracking stopped early: {message}");
    }
    Ok(())
}
