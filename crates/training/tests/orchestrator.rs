use data_contracts::{ArtifactKind, CancelToken, DatasetRecord, LabelLayout, LabelVector, TrainingRun};
use image::{Rgb, RgbImage};
use marker_dataset::LoadedSample;
use model_registry::{MemoryArtifactStore, ModelStore};
use models::{MarkerRegressorConfig, MemoryLedger};
use std::sync::Arc;
use training::{
    spawn_training, EpochMetrics, TrainBackend, TrainConfig, TrainingCallbacks, TrainingError, TrainingEvent,
    TrainingOrchestrator,
};

/// A bright square on a dark 16x16 frame, labelled at its centre.
fn sample(i: usize) -> LoadedSample {
    let cx = 3 + (i % 10) as u32;
    let mut img = RgbImage::from_pixel(16, 16, Rgb([10, 10, 10]));
    for y in 6..10 {
        for x in cx - 2..cx + 2 {
            img.put_pixel(x, y, Rgb([250, 120, 20]));
        }
    }
    let text = format!("0 {:.4} 0.5 0.25 0.25", cx as f32 / 16.0);
    LoadedSample {
        record: DatasetRecord::pending(format!("images/{i}.jpg").into(), format!("labels/{i}.txt").into()),
        image: img,
        label: LabelVector::parse(&text, LabelLayout::SingleBox).unwrap(),
    }
}

fn dataset(n: usize) -> Vec<LoadedSample> {
    (0..n).map(sample).collect()
}

fn config(epochs: usize) -> TrainConfig {
    TrainConfig {
        epochs,
        batch_size: 4,
        model: MarkerRegressorConfig::new(16, 16, 4),
        artifact_name: "test-run".to_string(),
        ..TrainConfig::default()
    }
}

fn orchestrator() -> (TrainingOrchestrator, Arc<ModelStore<TrainBackend>>, Arc<MemoryLedger>) {
    let ledger = MemoryLedger::new();
    let store = Arc::new(
        ModelStore::<TrainBackend>::open(Arc::new(MemoryArtifactStore::new()), Default::default(), ledger.clone())
            .unwrap(),
    );
    (TrainingOrchestrator::new(store.clone()), store, ledger)
}

#[derive(Default)]
struct Recording {
    order: Vec<&'static str>,
    epoch_ends: Vec<EpochMetrics>,
    progress: Vec<f32>,
    batches: usize,
    cancel_after: Option<(usize, CancelToken)>,
}

impl TrainingCallbacks for Recording {
    fn on_epoch_begin(&mut self, _epoch: usize, total_batches: usize, _run: &TrainingRun) {
        assert!(total_batches > 0);
        self.order.push("begin");
    }

    fn on_batch_end(&mut self, _batch: usize, loss: f32, _run: &TrainingRun) {
        assert!(loss.is_finite());
        self.batches += 1;
        self.order.push("batch");
        if let Some((n, token)) = &self.cancel_after {
            if self.batches >= *n {
                token.cancel();
            }
        }
    }

    fn on_epoch_end(&mut self, _epoch: usize, metrics: &EpochMetrics, _run: &TrainingRun) {
        self.epoch_ends.push(*metrics);
        self.order.push("end");
    }

    fn on_progress(&mut self, percent: f32, _run: &TrainingRun) {
        self.progress.push(percent);
    }
}

#[test]
fn epoch_callbacks_and_progress() -> anyhow::Result<()> {
    let (orch, store, _) = orchestrator();
    let mut cb = Recording::default();
    let outcome = orch.train(dataset(10), &config(3), &mut cb, &CancelToken::new())?;

    assert_eq!(cb.epoch_ends.len(), 3);
    // 8 training samples at batch 4.
    assert_eq!(cb.batches, 3 * 2);
    assert_eq!(&cb.order[..4], &["begin", "batch", "batch", "end"]);
    assert!(cb.progress[0] > 0.0);
    assert!(cb.progress.windows(2).all(|w| w[1] > w[0]));
    assert_eq!(*cb.progress.last().unwrap(), 100.0);
    assert!(cb.epoch_ends.iter().all(|m| m.val_loss.is_some()));

    assert_eq!(outcome.artifact.kind, ArtifactKind::Trained);
    assert_eq!(outcome.metrics.epochs, 3);
    assert_eq!(outcome.metrics.samples, 10);
    assert_eq!(store.list().len(), 1);
    assert_eq!(outcome.run.total_batches, 2);
    Ok(())
}

#[test]
fn step_tensors_are_released() -> anyhow::Result<()> {
    let (orch, _, ledger) = orchestrator();
    orch.train(dataset(6), &config(2), &mut (), &CancelToken::new())?;
    assert_eq!(ledger.snapshot().tensors, 0);
    assert_eq!(ledger.snapshot().bytes, 0);
    assert!(ledger.peak_bytes() > 0);
    Ok(())
}

#[test]
fn cancellation_stops_between_batches_and_registers_nothing() {
    let (orch, store, ledger) = orchestrator();
    let token = CancelToken::new();
    let mut cb = Recording {
        cancel_after: Some((1, token.clone())),
        ..Recording::default()
    };
    let err = orch.train(dataset(10), &config(5), &mut cb, &token).unwrap_err();
    assert!(matches!(err, TrainingError::Cancelled));
    assert_eq!(cb.batches, 1);
    assert!(cb.epoch_ends.is_empty());
    assert!(store.list().is_empty());
    assert_eq!(ledger.snapshot().tensors, 0);
}

#[test]
fn empty_and_misshaped_datasets_are_rejected() {
    let (orch, _, _) = orchestrator();
    assert!(matches!(
        orch.train(Vec::new(), &config(1), &mut (), &CancelToken::new()),
        Err(TrainingError::EmptyDataset)
    ));
    let mut cfg = config(1);
    cfg.model = MarkerRegressorConfig::new(32, 32, 4);
    assert!(matches!(
        orch.train(dataset(4), &cfg, &mut (), &CancelToken::new()),
        Err(TrainingError::Model(_))
    ));
}

#[test]
fn background_worker_streams_events() -> anyhow::Result<()> {
    let (orch, store, _) = orchestrator();
    let handle = spawn_training(orch, dataset(5), config(2))?;
    let events: Vec<TrainingEvent> = handle.events().iter().take_while(|e| {
        !matches!(e, TrainingEvent::Finished { .. } | TrainingEvent::Failed { .. } | TrainingEvent::Cancelled)
    }).collect();
    let outcome = handle.join()?;

    let epoch_ends = events
        .iter()
        .filter(|e| matches!(e, TrainingEvent::EpochEnd { .. }))
        .count();
    assert_eq!(epoch_ends, 2);
    assert!(events.iter().any(|e| matches!(e, TrainingEvent::Progress { percent, .. } if *percent == 100.0)));
    assert_eq!(store.list()[0].id, outcome.artifact.id);
    Ok(())
}
