use crate::config::LoggingConfig;
use std::path::PathBuf;
use std::sync::OnceLock;
use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter, Registry};

const LOG_FILE_PREFIX: &str = "stick-tracker.log";

static INIT: OnceLock<Option<WorkerGuard>> = OnceLock::new();

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("failed to prepare log directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid log filter `{filter}`: {source}")]
    Filter {
        filter: String,
        #[source]
        source: tracing_subscriber::filter::ParseError,
    },
    #[error("failed to install global tracing subscriber: {0}")]
    SetGlobal(#[from] tracing::subscriber::SetGlobalDefaultError),
}

fn build_env_filter(default: &str) -> Result<EnvFilter, LoggingError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(default).map_err(|source| LoggingError::Filter {
        filter: default.to_string(),
        source,
    })
}

/// Install the global subscriber: stderr always, plus a daily file when
/// `log_dir` is set. Later calls are no-ops.
pub fn init(config: &LoggingConfig) -> Result<(), LoggingError> {
    if INIT.get().is_some() {
        return Ok(());
    }
    let env_filter = build_env_filter(&config.filter)?;
    let stderr_layer = fmt::layer().with_writer(std::io::stderr).with_target(false);

    let (file_layer, guard) = match &config.log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir).map_err(|source| LoggingError::CreateDir {
                path: dir.clone(),
                source,
            })?;
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().with_ansi(false).with_writer(writer)), Some(guard))
        }
        None => (None, None),
    };

    let subscriber = Registry::default().with(env_filter).with(stderr_layer).with(file_layer);
    tracing::subscriber::set_global_default(subscriber)?;
    let _ = INIT.set(guard);
    tracing::debug!(log_dir = ?config.log_dir, "logging initialised");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_filter_is_reported() {
        if std::env::var("RUST_LOG").is_ok() {
            return;
        }
        let err = build_env_filter("marker=notalevel").unwrap_err();
        assert!(matches!(err, LoggingError::Filter { .. }));
    }
}
