use std::fs;
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::domain::config::LogLevel;
use crate::domain::DomainError;

/// Log target of this crate.
const LOG_TARGET: &str = "talk_desktop_lib";

/// Initialize the logging system with console output and file rotation.
///
/// `RUST_LOG` takes precedence over `level` for the console. The file only
/// records this crate, at `level`. Returns the file writer's guard, which
/// must be kept alive for the duration of the application.
pub fn init_logging(
    logs_dir: &Path,
    level: LogLevel,
    file_logging: bool,
) -> Result<Option<WorkerGuard>, DomainError> {
    let level = level.as_str();

    // Ensure logs directory exists
    if file_logging {
        fs::create_dir_all(logs_dir)?;
    }

    // Environment filter with default from config
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(level)));

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(FmtSpan::NONE)
        .with_filter(env_filter);

    if file_logging {
        // File appender with daily rotation
        let file_appender = RollingFileAppender::new(Rotation::DAILY, logs_dir, "talk-desktop.log");

        // Non-blocking writer for the file appender
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        let file_layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .json()
            .with_span_events(FmtSpan::CLOSE)
            .with_filter(EnvFilter::new(file_directives(level)));

        // try_init: a second call keeps the first subscriber
        if tracing_subscriber::registry()
            .with(console_layer)
            .with(file_layer)
            .try_init()
            .is_ok()
        {
            tracing::info!(
                logs_dir = ?logs_dir,
                level = level,
                "Logging initialized with file output"
            );
        }

        Ok(Some(guard))
    } else {
        let _ = tracing_subscriber::registry()
            .with(console_layer)
            .try_init();

        tracing::info!(level = level, "Logging initialized (console only)");

        Ok(None)
    }
}

fn default_directives(level: &str) -> String {
    format!("{}={},warn", LOG_TARGET, level)
}

fn file_directives(level: &str) -> String {
    format!("{}={}", LOG_TARGET, level)
}
