//! Wires `tracing-subscriber` up with the scrubbing layer, JSON/pretty
//! formatting, and optional rotating file output.

use super::config::{LogConfig, LogFormat, RotationPolicy};
use super::secret_scrubbing::SecretScrubbingLayer;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Guard that must be kept alive for the duration of the process when file
/// logging is enabled, or the non-blocking writer stops flushing.
pub struct LoggingGuard {
    _appender_guard: Option<tracing_appender::non_blocking::WorkerGuard>,
}

pub fn init(config: &LogConfig) -> LoggingGuard {
    let env_filter = EnvFilter::try_new(&config.level).unwrap_or_else(|_| EnvFilter::new("info"));
    let scrubbing = SecretScrubbingLayer::new();

    let (appender_guard, file_layer) = match &config.log_dir {
        Some(dir) => {
            let rotation = match config.rotation {
                RotationPolicy::Daily => tracing_appender::rolling::Rotation::DAILY,
                RotationPolicy::Hourly => tracing_appender::rolling::Rotation::HOURLY,
                RotationPolicy::Never => tracing_appender::rolling::Rotation::NEVER,
            };
            let appender = tracing_appender::rolling::RollingFileAppender::new(rotation, dir, "fulcrum.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().json().with_writer(non_blocking).boxed();
            (Some(guard), Some(layer))
        }
        None => (None, None),
    };

    let stdout_layer = config.enable_stdout.then(|| match config.format {
        LogFormat::Json => fmt::layer().json().boxed(),
        LogFormat::Pretty => fmt::layer().pretty().boxed(),
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(scrubbing)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    LoggingGuard { _appender_guard: appender_guard }
}
