use std::path::Path;

use anyhow::{Context, Result};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    fmt::{self, time::SystemTime},
    prelude::*,
    EnvFilter,
};

pub const LOG_FILE_NAME: &str = "scout.log";

/// Console logging (warn, or debug with `--debug`; `RUST_LOG` wins) plus a plain
/// file log in `log_dir` (info, or debug with `--debug`).
///
/// When the log directory can't be used, only the console layer is installed.
pub fn setup_logging(log_dir: &Path, debug: bool) -> Result<()> {
    let console_level = if debug { "debug" } else { "warn" };
    let console_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(console_level));
    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(console_filter);

    let file_level = if debug { "debug" } else { "info" };
    let file_layer = match file_appender(log_dir) {
        Ok(appender) => Some(
            fmt::layer()
                .with_file(true)
                .with_line_number(true)
                .with_thread_ids(true)
                .with_target(true)
                .with_level(true)
                .with_timer(SystemTime)
                .with_ansi(false)
                .with_writer(appender)
                .with_filter(EnvFilter::new(file_level)),
        ),
        Err(e) => {
            eprintln!("file logging disabled: {e:#}");
            None
        }
    };

    let subscriber = tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer);

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    tracing::debug!(
        "Logging system initialized. Writing to {}",
        log_dir.join(LOG_FILE_NAME).display()
    );
    Ok(())
}

fn file_appender(log_dir: &Path) -> Result<RollingFileAppender> {
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("can't create log directory {}", log_dir.display()))?;
    RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(LOG_FILE_NAME)
        .build(log_dir)
        .with_context(|| format!("can't open log file in {}", log_dir.display()))
}
