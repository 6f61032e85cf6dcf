use crate::config::TrackerConfig;
use clap::Args;
use std::path::PathBuf;

/// Dataset location; falls back to `[dataset]` in the config.
#[derive(Debug, Clone, Default, Args)]
pub struct DatasetArgs {
    /// Dataset root containing the image and label subdirectories.
    #[arg(long)]
    pub dataset: Option<PathBuf>,
    /// Expect two-endpoint stick labels instead of a single box.
    #[arg(long, default_value_t = false)]
    pub stick: bool,
}

impl DatasetArgs {
    pub fn root(&self, cfg: &TrackerConfig) -> PathBuf {
        self.dataset.clone().unwrap_or_else(|| cfg.dataset.root.clone())
    }
}

/// Registry location; falls back to `[registry]` in the config.
#[derive(Debug, Clone, Default, Args)]
pub struct RegistryArgs {
    #[arg(long)]
    pub registry: Option<PathBuf>,
}

impl RegistryArgs {
    pub fn root(&self, cfg: &TrackerConfig) -> PathBuf {
        self.registry.clone().unwrap_or_else(|| cfg.registry.root.clone())
    }
}

/// Training overrides; anything unset keeps the `[training]` value.
#[derive(Debug, Clone, Default, Args)]
pub struct TrainArgs {
    #[arg(long)]
    pub epochs: Option<usize>,
    #[arg(long)]
    pub batch_size: Option<usize>,
    #[arg(long)]
    pub learning_rate: Option<f64>,
    #[arg(long)]
    pub shuffle_seed: Option<u64>,
    /// Disable training-time augmentation.
    #[arg(long, default_value_t = false)]
    pub no_augment: bool,
}

impl TrainArgs {
    /// Fold the flags into `cfg.training`.
    pub fn apply(&self, cfg: &mut TrackerConfig) {
        let t = &mut cfg.training;
        if let Some(v) = self.epochs {
            t.epochs = v;
        }
        if let Some(v) = self.batch_size {
            t.batch_size = v;
        }
        if let Some(v) = self.learning_rate {
            t.learning_rate = v;
        }
        if self.shuffle_seed.is_some() {
            t.shuffle_seed = self.shuffle_seed;
        }
        if self.no_augment {
            t.augment = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_config_values() {
        let mut cfg = TrackerConfig::default();
        TrainArgs {
            epochs: Some(3),
            no_augment: true,
            ..TrainArgs::default()
        }
        .apply(&mut cfg);
        assert_eq!(cfg.training.epochs, 3);
        assert_eq!(cfg.training.batch_size, 16);
        assert!(!cfg.training.augment);

        let args = DatasetArgs::default();
        assert_eq!(args.root(&cfg), cfg.dataset.root);
    }
}
