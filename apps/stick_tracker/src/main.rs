mod cli;
mod commands;
mod engines;

use anyhow::Context;
use clap::Parser;
use cli::{Cli, Command};
use cli_support::{ConfigSource, TrackerConfig};

fn main() -> anyhow::Result<()> {
    let args = Cli::parse();
    let (mut cfg, source) = match &args.config {
        Some(path) => TrackerConfig::load_from(path),
        None => TrackerConfig::load(),
    };
    cli_support::logging::init(&cfg.logging).context("initialising logging")?;
    match &source {
        ConfigSource::Defaults => tracing::debug!("no config file found; using defaults"),
        ConfigSource::File(path) => tracing::debug!(path = %path.display(), "config loaded"),
        ConfigSource::Fallback { path, reason } => {
            tracing::warn!(path = %path.display(), %reason, "config unusable; using defaults")
        }
    }

    match args.command {
        Command::Validate { dataset, json } => commands::validate(&cfg, &dataset, json),
        Command::ExportManifest { dataset, out } => commands::export_manifest(&cfg, &dataset, out),
        Command::Capture {
            dataset,
            image,
            label,
            augment,
        } => commands::capture(&cfg, &dataset, &image, &label, augment),
        Command::Train {
            dataset,
            registry,
            train,
            name,
            description,
        } => {
            train.apply(&mut cfg);
            commands::train(&cfg, &dataset, &registry, name, description)
        }
        Command::Models { registry, action } => commands::models(&cfg, &registry, action),
        Command::Detect {
            registry,
            backend,
            frames,
            fps,
        } => commands::detect(&cfg, &registry, backend.into(), &frames, fps),
        Command::Track {
            frames,
            fps,
            record,
            no_overlay,
        } => {
            if no_overlay {
                cfg.tracking.overlay = false;
            }
            commands::track(&cfg, &frames, fps, record)
        }
    }
}
