pub mod audio;
pub mod config;
pub mod controller;
pub mod daemon;
pub mod dictation;
pub mod engine;
pub mod environment;
pub mod inject;
pub mod models;
pub mod process;
pub mod transcribe;

#[cfg(test)]
mod test_support;

use anyhow::Context;
use config::LogLevel;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Application-specific environment variable for log filtering (overrides config).
pub const LOG_ENV_VAR: &str = "LINVOC_LOG";

/// Send logs of the long-running instance to the state-directory log file.
///
/// Keep the returned guard alive until exit or buffered lines are lost.
pub fn init_file_logging(level: LogLevel) -> anyhow::Result<WorkerGuard> {
    let log_path = linvoc_common::dirs::log_path().context("Failed to determine log path")?;
    let log_dir = log_path
        .parent()
        .context("Log path has no parent directory")?;
    let log_filename = log_path.file_name().context("Log path has no file name")?;

    let file_appender = tracing_appender::rolling::never(log_dir, log_filename);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .with(env_filter(level)?)
        .try_init()
        .context("Failed to install log subscriber")?;

    route_native_logs();
    Ok(guard)
}

/// `LINVOC_LOG` overrides the configured level.
pub fn env_filter(level: LogLevel) -> anyhow::Result<EnvFilter> {
    Ok(EnvFilter::builder()
        .with_env_var(LOG_ENV_VAR)
        .with_default_directive(level.as_directive().parse()?)
        .from_env()?)
}

/// Route whisper.cpp and GGML logs through tracing.
pub fn route_native_logs() {
    #[cfg(feature = "whisper")]
    whisper_rs::install_logging_hooks();
}
