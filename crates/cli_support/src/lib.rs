//! Shared plumbing for the command-line tools: TOML configuration, tracing
//! setup and reusable clap argument groups.

pub mod args;
pub mod config;
pub mod logging;

pub use args::{DatasetArgs, RegistryArgs, TrainArgs};
pub use config::{
    expand_path, ConfigSource, DatasetSection, LoggingConfig, PoseBackend, RegistrySection, TrackerConfig,
    TrackingSection, TrainingSection, CONFIG_ENV, DEFAULT_CONFIG_NAME,
};
