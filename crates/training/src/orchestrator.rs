use crate::callbacks::{EpochMetrics, TrainingCallbacks};
use crate::config::TrainConfig;
use crate::{ADBackend, TrainBackend, TrainingError, TrainingResult};
use burn::module::AutodiffModule;
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::tensor::backend::Backend;
use burn::tensor::{Tensor, TensorData};
use data_contracts::{ArtifactMetrics, CancelToken, ModelArtifact, TrainingRun};
use marker_dataset::{image_to_chw, split_train_val, Augmentor, LoadedSample};
use model_registry::ModelStore;
use models::{huber_loss, mse_metric, MarkerRegressor, MemoryLedger, ModelError};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub artifact: ModelArtifact,
    pub run: TrainingRun,
    pub metrics: ArtifactMetrics,
}

pub struct TrainingOrchestrator {
    registry: Arc<ModelStore<TrainBackend>>,
    ledger: Arc<MemoryLedger>,
}

impl TrainingOrchestrator {
    pub fn new(registry: Arc<ModelStore<TrainBackend>>) -> Self {
        let ledger = Arc::clone(registry.ledger());
        Self { registry, ledger }
    }

    pub fn ledger(&self) -> &Arc<MemoryLedger> {
        &self.ledger
    }

    /// Fit a fresh regressor on `dataset` and register it.
    ///
    /// `cancel` is checked before every batch; a cancelled run registers nothing.
    pub fn train(
        &self,
        dataset: Vec<LoadedSample>,
        config: &TrainConfig,
        callbacks: &mut dyn TrainingCallbacks,
        cancel: &CancelToken,
    ) -> TrainingResult<TrainingOutcome> {
        if dataset.is_empty() {
            return Err(TrainingError::EmptyDataset);
        }
        check_shapes(&dataset, config)?;
        let samples = dataset.len();
        let (train, val) = split_train_val(dataset, config.val_fraction, config.shuffle_seed);
        let batch_size = config.batch_size.max(1);
        let total_batches = train.len().div_ceil(batch_size);
        info!(
            train = train.len(),
            val = val.len(),
            total_batches,
            config = %config.describe(),
            "training started"
        );

        let device = <ADBackend as Backend>::Device::default();
        let mut model = MarkerRegressor::<ADBackend>::new(config.model, &device)?;
        let mut optim = AdamConfig::new().init();
        let mut augmentor = config.augment.clone().map(Augmentor::new);
        let mut run = TrainingRun::new(config.epochs, total_batches);
        let mut last = EpochMetrics {
            loss: f32::NAN,
            val_loss: None,
            val_mse: None,
        };
        let started = Instant::now();

        for epoch in 0..config.epochs {
            run.epoch = epoch;
            run.batches_complete = 0;
            callbacks.on_epoch_begin(epoch, total_batches, &run);

            let mut loss_sum = 0.0f32;
            for (batch_idx, chunk) in train.chunks(batch_size).enumerate() {
                if cancel.is_cancelled() {
                    info!(epoch, batch = batch_idx, "training cancelled");
                    return Err(TrainingError::Cancelled);
                }
                let loss = {
                    let mut scope = self.ledger.scope("train-step");
                    let (input, target) = batch_tensors::<ADBackend>(chunk, augmentor.as_mut(), &device);
                    scope.track(&input);
                    scope.track(&target);
                    let pred = model.forward(input);
                    scope.track(&pred);
                    let loss = huber_loss(pred, target, config.huber_delta);
                    let value = scalar(loss.clone().detach());
                    let grads = GradientsParams::from_grads(loss.backward(), &model);
                    model = optim.step(config.learning_rate, model, grads);
                    value
                };
                loss_sum += loss;
                run.batches_complete = batch_idx + 1;
                run.current_loss = loss;
                run.update_timing(started.elapsed());
                callbacks.on_batch_end(batch_idx, loss, &run);
            }

            let epoch_loss = loss_sum / total_batches.max(1) as f32;
            run.record_loss(epoch_loss);
            let (val_loss, val_mse) = match self.evaluate(&model.valid(), &val, config) {
                Some((l, m)) => (Some(l), Some(m)),
                None => (None, None),
            };
            last = EpochMetrics {
                loss: epoch_loss,
                val_loss,
                val_mse,
            };
            info!(
                epoch,
                loss = epoch_loss,
                val_loss = ?val_loss,
                "epoch finished"
            );
            callbacks.on_epoch_end(epoch, &last, &run);
            callbacks.on_progress(run.percent_complete(), &run);
        }

        let trained = model.valid();
        let metrics = ArtifactMetrics {
            final_loss: last.loss,
            final_val_loss: last.val_loss,
            best_loss: run.best_loss,
            mse: last.val_mse,
            epochs: config.epochs,
            samples,
        };
        let artifact = self.registry.save_trained(
            &trained,
            &config.artifact_name,
            &config.artifact_description,
            Some(metrics.clone()),
        )?;
        info!(id = artifact.id, elapsed = ?started.elapsed(), "training finished");
        Ok(TrainingOutcome {
            artifact,
            run,
            metrics,
        })
    }

    /// Mean Huber loss and MSE over the validation split.
    fn evaluate(
        &self,
        model: &MarkerRegressor<TrainBackend>,
        val: &[LoadedSample],
        config: &TrainConfig,
    ) -> Option<(f32, f32)> {
        if val.is_empty() {
            return None;
        }
        let device = <TrainBackend as Backend>::Device::default();
        let mut loss_sum = 0.0;
        let mut mse_sum = 0.0;
        for chunk in val.chunks(config.batch_size.max(1)) {
            let mut scope = self.ledger.scope("val-step");
            let (input, target) = batch_tensors::<TrainBackend>(chunk, None, &device);
            scope.track(&input);
            let pred = model.forward(input);
            scope.track(&pred);
            let n = chunk.len() as f32;
            loss_sum += scalar(huber_loss(pred.clone(), target.clone(), config.huber_delta)) * n;
            mse_sum += scalar(mse_metric(pred, target)) * n;
        }
        let n = val.len() as f32;
        Some((loss_sum / n, mse_sum / n))
    }
}

fn check_shapes(dataset: &[LoadedSample], config: &TrainConfig) -> TrainingResult<()> {
    let want = (config.model.input_width as u32, config.model.input_height as u32);
    for sample in dataset {
        if sample.image.dimensions() != want {
            return Err(ModelError::ShapeMismatch {
                expected: format!("{}x{} images", want.0, want.1),
                found: format!(
                    "{}x{} ({})",
                    sample.image.width(),
                    sample.image.height(),
                    sample.record.image_path.display()
                ),
            }
            .into());
        }
        let dim = sample.label.to_target().len();
        if dim != config.model.output_dim {
            return Err(ModelError::ShapeMismatch {
                expected: format!("{} label values", config.model.output_dim),
                found: dim.to_string(),
            }
            .into());
        }
    }
    Ok(())
}

/// Stack samples into `[N, 3, H, W]` inputs and `[N, D]` targets.
fn batch_tensors<B: Backend>(
    chunk: &[LoadedSample],
    mut augmentor: Option<&mut Augmentor>,
    device: &B::Device,
) -> (Tensor<B, 4>, Tensor<B, 2>) {
    let (w, h) = chunk[0].image.dimensions();
    let dim = chunk[0].label.to_target().len();
    let mut pixels = Vec::with_capacity(chunk.len() * 3 * (w * h) as usize);
    let mut targets = Vec::with_capacity(chunk.len() * dim);
    for sample in chunk {
        match augmentor.as_deref_mut() {
            Some(aug) => {
                let (img, label, _) = aug.augment(&sample.image, &sample.label);
                pixels.extend(image_to_chw(&img));
                targets.extend(label.to_target());
            }
            None => {
                pixels.extend(sample.pixels_chw());
                targets.extend(sample.target());
            }
        }
    }
    let n = chunk.len();
    let input = Tensor::from_data(TensorData::new(pixels, [n, 3, h as usize, w as usize]), device);
    let target = Tensor::from_data(TensorData::new(targets, [n, dim]), device);
    (input, target)
}

fn scalar<B: Backend>(t: Tensor<B, 1>) -> f32 {
    t.into_data()
        .to_vec::<f32>()
        .unwrap_or_default()
        .into_iter()
        .next()
        .unwrap_or(f32::NAN)
}
