use crate::config::LoggingConfig;
use anyhow::{Context, Result};
use std::path::Path;
use std::str::FromStr;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Initialize the process-wide logger.
///
/// Console output always goes to stderr so stdout stays clean for
/// `queue export`. The returned guard must be held until exit when a
/// log file is configured.
pub fn init_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let Some(log_file) = &config.file else {
        let console = console_layer(config.json, env_filter(&config.level));
        tracing_subscriber::registry()
            .with(console)
            .try_init()
            .context("Logger already initialized")?;
        return Ok(None);
    };

    let (writer, guard) = if config.rotation {
        let path = Path::new(log_file);
        let appender = tracing_appender::rolling::daily(
            path.parent().unwrap_or_else(|| Path::new(".")),
            path.file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("resilient-call.log"),
        );
        tracing_appender::non_blocking(appender)
    } else {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_file)
            .with_context(|| format!("Failed to open log file: {}", log_file))?;
        tracing_appender::non_blocking(file)
    };

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true)
        .with_timer(ChronoUtc::rfc_3339());
    let file_layer: BoxedLayer = if config.json {
        file_layer.json().with_filter(env_filter(&config.level)).boxed()
    } else {
        file_layer.with_filter(env_filter(&config.level)).boxed()
    };

    tracing_subscriber::registry()
        .with(vec![file_layer, console_layer(false, env_filter(&config.level))])
        .try_init()
        .context("Logger already initialized")?;

    Ok(Some(guard))
}

/// `RUST_LOG` wins over the configured level
fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::from_str(level).unwrap_or_else(|_| EnvFilter::new("info")))
}

fn console_layer(json: bool, filter: EnvFilter) -> BoxedLayer {
    let layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_timer(ChronoUtc::rfc_3339());
    if json {
        layer.json().with_filter(filter).boxed()
    } else {
        layer.with_filter(filter).boxed()
    }
}
