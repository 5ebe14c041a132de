use std::path::Path;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt, layer::SubscriberExt};

/// Install the global subscriber: human-readable output on stderr, plus JSON
/// lines in `log_file` when one is configured.
///
/// `RUST_LOG` wins over the default level. Keep the returned guards alive
/// for the life of the process so buffered lines are flushed.
pub fn init(verbose: bool, log_file: Option<&str>) -> Result<Vec<WorkerGuard>> {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let mut guards = Vec::new();

    let (stderr_writer, guard) = tracing_appender::non_blocking(std::io::stderr());
    guards.push(guard);
    let stderr_layer = fmt::layer()
        .with_target(false)
        .with_writer(BoxMakeWriter::new(move || stderr_writer.clone()))
        .boxed();

    let file_layer = match log_file {
        Some(path) => {
            let path = Path::new(path);
            let directory = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let file_name = path
                .file_name()
                .with_context(|| format!("Invalid log file path: {}", path.display()))?;

            let file_appender = tracing_appender::rolling::never(directory, file_name);
            let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
            guards.push(guard);
            Some(
                fmt::layer()
                    .json()
                    .with_writer(BoxMakeWriter::new(move || file_writer.clone()))
                    .boxed(),
            )
        }
        None => None,
    };

    let subscriber = Registry::default()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer);

    tracing::subscriber::set_global_default(subscriber)
        .context("Unable to set global subscriber")?;

    Ok(guards)
}
