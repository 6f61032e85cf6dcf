use marker_dataset::AugmentConfig;
use models::{MarkerRegressorConfig, DEFAULT_HUBER_DELTA};

#[derive(Debug, Clone)]
pub struct TrainConfig {
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    /// Fraction held out for validation (index cut from the end).
    pub val_fraction: f32,
    /// Shuffle deterministically before the split; on-disk order when `None`.
    pub shuffle_seed: Option<u64>,
    /// Training-time augmentation; disabled when `None`.
    pub augment: Option<AugmentConfig>,
    pub huber_delta: f32,
    pub model: MarkerRegressorConfig,
    pub artifact_name: String,
    pub artifact_description: String,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            epochs: 50,
            batch_size: 16,
            learning_rate: 1e-3,
            val_fraction: 0.2,
            shuffle_seed: None,
            augment: Some(AugmentConfig::default()),
            huber_delta: DEFAULT_HUBER_DELTA,
            model: MarkerRegressorConfig::default(),
            artifact_name: "marker-regressor".to_string(),
            artifact_description: String::new(),
        }
    }
}

impl TrainConfig {
    pub fn describe(&self) -> String {
        format!(
            "epochs={} batch={} lr={} val={:.2} shuffle_seed={} augment={} input={}x{} output_dim={}",
            self.epochs,
            self.batch_size,
            self.learning_rate,
            self.val_fraction,
            self.shuffle_seed
                .map(|s| s.to_string())
                .unwrap_or_else(|| "none".to_string()),
            self.augment.is_some(),
            self.model.input_width,
            self.model.input_height,
            self.model.output_dim,
        )
    }
}
