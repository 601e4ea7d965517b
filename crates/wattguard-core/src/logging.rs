//! Tracing subscriber setup

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

use crate::config::LoggingConfig;
use crate::error::{Error, Result};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Install the global subscriber
///
/// `RUST_LOG` takes precedence over `logging.level` unless `verbose` is set,
/// which forces debug output. When `logging.file` is set the returned guard
/// must be held until exit so buffered lines are flushed.
pub fn init(config: &LoggingConfig, verbose: bool) -> Result<Option<WorkerGuard>> {
    let filter = filter(config, verbose)?;
    let json = is_json(&config.format)?;

    let mut layers: Vec<BoxedLayer> = vec![console_layer(json)];
    let guard = match config.file.as_deref() {
        Some(path) => {
            let (layer, guard) = file_layer(Path::new(path), json)?;
            layers.push(layer);
            Some(guard)
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()
        .map_err(|e| Error::config(format!("failed to install log subscriber: {e}")))?;

    Ok(guard)
}

fn filter(config: &LoggingConfig, verbose: bool) -> Result<EnvFilter> {
    if verbose {
        return Ok(EnvFilter::new("debug"));
    }
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(&config.level)
        .map_err(|e| Error::config(format!("invalid logging.level '{}': {e}", config.level)))
}

fn is_json(format: &str) -> Result<bool> {
    match format.to_ascii_lowercase().as_str() {
        "pretty" | "text" => Ok(false),
        "json" => Ok(true),
        other => Err(Error::config(format!(
            "invalid logging.format '{other}' (expected 'pretty' or 'json')"
        ))),
    }
}

fn console_layer(json: bool) -> BoxedLayer {
    if json {
        fmt::layer().json().with_current_span(false).boxed()
    } else {
        fmt::layer().with_target(false).boxed()
    }
}

fn file_layer(path: &Path, json: bool) -> Result<(BoxedLayer, WorkerGuard)> {
    let file_name = path
        .file_name()
        .ok_or_else(|| Error::config(format!("logging.file '{}' has no file name", path.display())))?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, file_name));
    let layer = if json {
        fmt::layer().json().with_writer(writer).boxed()
    } else {
        fmt::layer().with_ansi(false).with_writer(writer).boxed()
    };
    Ok((layer, guard))
}
